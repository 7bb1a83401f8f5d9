//! Tracing/logging setup shared by the binaries.

/// Initialize process-wide tracing.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
