//! Configuration for cmtkit
//!
//! Only user-wide settings exist ([`GlobalConfig`]); per-package build
//! recipes are handled by [`crate::pkgbuild::recipe`].

pub mod global;

pub use global::{CONFIG_PATH_ENV, GlobalConfig};
