//! Utility modules shared across cmtkit.

pub mod fs;

pub use fs::{copy_dir, ensure_dir, normalize_path, relative_path, remove_path};

/// Number of logical CPUs, falling back to 2 when it cannot be determined.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(2)
}
