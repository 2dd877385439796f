//! Unit tests exercising public cmtkit APIs in isolation.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod config;
mod local_shell;
