//! File-backed allocator benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use filemem::memory::{AllocationParams, FileMemAllocator, FileMemConfig, MapMode};

fn allocator(dir: &tempfile::TempDir, capacity: u64) -> std::sync::Arc<FileMemAllocator> {
    FileMemAllocator::new(FileMemConfig::in_dir(dir.path()).capacity(capacity))
        .expect("backing file")
}

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free");
    let dir = tempfile::tempdir().expect("temp dir");

    for size in [64u64, 4096, 65_536] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            // bump allocation never reuses space, so refill the file as needed
            let mut allocator = allocator(&dir, 1 << 30);
            b.iter(|| {
                let mem = match allocator.alloc(size, &AllocationParams::default()) {
                    Ok(mem) => mem,
                    Err(_) => {
                        allocator = self::allocator(&dir, 1 << 30);
                        allocator
                            .alloc(size, &AllocationParams::default())
                            .expect("fresh allocator")
                    }
                };
                allocator.free(mem);
            });
        });
    }

    group.finish();
}

fn bench_map_unmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_unmap");
    let dir = tempfile::tempdir().expect("temp dir");
    let allocator = allocator(&dir, 16 << 20);

    for size in [4096u64, 1 << 20] {
        let mem = allocator
            .alloc(size, &AllocationParams::default())
            .expect("alloc");

        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::new("write_fill", size), &mem, |b, mem| {
            b.iter(|| {
                let mut view = mem.map_writable().expect("map");
                view.as_mut_slice().fill(0x5A);
                view.unmap().expect("unmap");
            });
        });
        group.bench_with_input(BenchmarkId::new("read_only", size), &mem, |b, mem| {
            b.iter(|| {
                let ptr = mem.map(MapMode::Read).expect("map");
                std::hint::black_box(ptr);
                mem.unmap().expect("unmap");
            });
        });
    }

    group.finish();
}

fn bench_share(c: &mut Criterion) {
    let mut group = c.benchmark_group("share");
    let dir = tempfile::tempdir().expect("temp dir");
    let allocator = allocator(&dir, 1 << 20);
    let mem = allocator
        .alloc(4096, &AllocationParams::default())
        .expect("alloc");

    group.throughput(Throughput::Elements(1));
    group.bench_function("share_and_drop", |b| {
        b.iter(|| {
            let sub = mem.share(128, Some(1024)).expect("share");
            std::hint::black_box(sub.size());
        });
    });

    let a = mem.share(0, Some(2048)).expect("share");
    let b = mem.share(2048, Some(2048)).expect("share");
    group.bench_function("is_span", |bench| {
        bench.iter(|| std::hint::black_box(a.is_span(&b)));
    });

    group.finish();
}

criterion_group!(benches, bench_alloc_free, bench_map_unmap, bench_share);
criterion_main!(benches);
