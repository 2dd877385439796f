//! cmtkit - CMT dependency inspector and generic package builder
//!
//! Tools for software releases managed with the CMT configuration
//! management tool. CMT is driven as an external process and its text
//! output is turned into typed graphs:
//!
//! - the package dependency tree of a `cmt show uses` dump
//! - the project graph of `cmt show projects`
//! - the clients of a package ("who uses X?")
//! - tag differences between two releases
//!
//! A second half builds external packages (autotools or Python distutils)
//! through an idempotent state machine that stages the install and exposes
//! it in a shared install area through relative symlinks.
//!
//! # Core Modules
//!
//! - [`cmt`] - CMT wrapper, dump parsers, project graph, client queries, tag diffs
//! - [`pkgbuild`] - build environment, flavors, recipes and the build state machine
//! - [`shell`] - the [`shell::Shell`] abstraction every process runs through
//!
//! # Supporting Modules
//!
//! - [`cli`] - the `cmtkit` command line
//! - [`config`] - global configuration (`~/.cmtkit/config.toml`)
//! - [`constants`] - CMT conventions and defaults
//! - [`core`] - error types and user-facing error formatting
//! - [`utils`] - filesystem primitives
//!
//! # Example
//!
//! ```rust,no_run
//! use cmtkit::cmt::{DependencyGraph, PackageDb};
//!
//! let dump = "# use Foo 1-0-0 Group ()\n#   use Bar 2-0-0 Tools ()\n";
//! let graph = DependencyGraph::parse(dump, &PackageDb::new())?;
//! assert!(graph.get("Foo").unwrap().depends_on("Bar"));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod cmt;
pub mod config;
pub mod constants;
pub mod core;
pub mod pkgbuild;
pub mod shell;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
