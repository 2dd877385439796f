//! Integration test suite for cmtkit
//!
//! End-to-end tests against the public API and the `cmtkit` binary. CMT,
//! svn and make are never run: library tests drive a
//! [`cmtkit::test_utils::ScriptedShell`], binary tests stick to commands
//! that need no CMT environment.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `cmtkit` binary (uses, tag-diff, projects, error exit codes)
//! - **dependency_graph**: `show uses` dumps into dependency graphs
//! - **project_graph**: `show projects` listings and the connect checks
//! - **queries**: macro, version, tag, checkout and package lookups
//! - **clients**: client queries through the probe package
//! - **package_build**: recipe-driven builds, idempotence and relocation
//! - **tag_diff**: comparing release trees

mod common;

mod cli;
mod clients;
mod dependency_graph;
mod package_build;
mod project_graph;
mod tag_diff;
