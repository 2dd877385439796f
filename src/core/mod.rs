//! Core types shared by every cmtkit module
//!
//! Currently this is the error layer: the [`CmtError`] enum raised by the
//! library and the [`ErrorContext`] presentation used by the binary.

pub mod error;

pub use error::{CmtError, ErrorContext, user_friendly_error};
