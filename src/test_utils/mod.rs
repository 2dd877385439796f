//! Test utilities for cmtkit
//!
//! - [`init_test_logging`] installs a tracing subscriber once per test binary
//! - [`ScriptedShell`] answers commands from a rule table instead of running
//!   CMT, svn or make, and records what it was asked to run
//!
//! # Example
//!
//! ```rust,no_run
//! use cmtkit::shell::{Shell, ShellCommand};
//! use cmtkit::test_utils::ScriptedShell;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let shell = ScriptedShell::new("/tmp").on("show macro_value tag", 0, "x86_64-slc5-gcc43-opt\n");
//! let out = shell.run(ShellCommand::new("cmt.exe").args(["show", "macro_value", "tag"])).await?;
//! assert_eq!(out.stdout.trim(), "x86_64-slc5-gcc43-opt");
//! assert_eq!(shell.recorded().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod scripted_shell;

pub use scripted_shell::{RecordedCommand, ScriptedShell};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; without either logging
/// stays off.
///
/// ```bash
/// RUST_LOG=cmt=trace cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
