//! Tracing spans for allocator activity.

use tracing::{Level, Span, span};

/// Create a span covering work done by one allocator.
///
/// # Example
///
/// ```rust,ignore
/// use filemem::observability::span_allocator;
///
/// let span = span_allocator("ring");
/// let _guard = span.enter();
/// // allocate, map, share...
/// ```
#[inline]
pub fn span_allocator(name: &str) -> Span {
    span!(Level::DEBUG, "allocator", name = %name)
}

/// Enter an allocator span and return the guard.
pub fn instrument_allocator(name: &str) -> tracing::span::EnteredSpan {
    span_allocator(name).entered()
}

/// Log an allocation.
#[inline]
pub fn trace_alloc(allocator: &str, file_offset: u64, size: u64, maxsize: u64) {
    tracing::debug!(
        allocator = %allocator,
        file_offset,
        size,
        maxsize,
        "block allocated"
    );
}

/// Log a refused allocation.
#[inline]
pub fn trace_alloc_failure(allocator: &str, size: u64, error: &dyn std::error::Error) {
    tracing::error!(
        allocator = %allocator,
        size,
        error = %error,
        "cannot allocate"
    );
}
