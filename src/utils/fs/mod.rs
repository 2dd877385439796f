//! File system utilities
//!
//! The build state machine and the CMT probe both create, copy and remove
//! trees; the primitives they share live here:
//!
//! - [`ensure_dir`] is the one "create if absent" operation
//! - [`remove_path`] deletes files, links and trees, tolerating absent paths
//! - [`relative_path`] computes the minimal relative path used by relocation

pub mod dirs;
pub mod paths;

pub use dirs::{copy_dir, ensure_dir, remove_path, symlink};
pub use paths::{normalize_path, relative_path};
