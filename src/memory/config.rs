//! Construction-time configuration for [`FileMemAllocator`](super::FileMemAllocator).

use super::defaults;
use std::path::{Path, PathBuf};

/// Configuration for a file-backed allocator.
///
/// All fields are fixed once the config is handed to
/// [`FileMemAllocator::new`](super::FileMemAllocator::new); there is no way to
/// change capacity or backing file afterwards.
///
/// # Example
///
/// ```rust,ignore
/// let config = FileMemConfig::new("/var/cache/ring-XXXXXX")
///     .capacity(16 << 20)
///     .name("ring");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMemConfig {
    /// Total size of the backing file in bytes.
    pub capacity: u64,
    /// mkstemp-style template for the backing file.
    pub temp_path_template: PathBuf,
    /// Name the allocator is registered under.
    pub name: String,
    /// Reserve disk blocks with `fallocate` before handing out a block.
    pub reserve_space: bool,
    /// Punch a hole over a root block's range when it is freed.
    pub release_on_free: bool,
}

impl FileMemConfig {
    /// Create a config for the given backing-file template.
    ///
    /// The template is mandatory; everything else starts at its default.
    pub fn new(temp_path_template: impl Into<PathBuf>) -> Self {
        Self {
            capacity: defaults::DEFAULT_CAPACITY,
            temp_path_template: temp_path_template.into(),
            name: defaults::DEFAULT_ALLOCATOR_NAME.to_string(),
            reserve_space: true,
            release_on_free: true,
        }
    }

    /// Config with a template inside `dir`, using the default file prefix.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("filemem-XXXXXX"))
    }

    /// Set the backing-file capacity.
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the registration name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable disk-space reservation on allocation.
    pub fn reserve_space(mut self, enabled: bool) -> Self {
        self.reserve_space = enabled;
        self
    }

    /// Enable or disable hole punching when root blocks are freed.
    pub fn release_on_free(mut self, enabled: bool) -> Self {
        self.release_on_free = enabled;
        self
    }
}

impl Default for FileMemConfig {
    fn default() -> Self {
        Self::new(defaults::DEFAULT_TEMP_TEMPLATE)
    }
}
