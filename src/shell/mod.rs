//! Shell abstraction used by the CMT wrapper and the package builder
//!
//! All process execution and the handful of filesystem mutations the build
//! state machine performs go through the [`Shell`] trait so a caller can swap
//! the local implementation for a logging or scripted one.
//!
//! [`LocalShell`] keeps its own working directory: [`Shell::chdir`] never
//! touches the process-wide current directory, it only changes where later
//! commands of that shell run and how relative paths are resolved.
//!
//! Directory creation has a single contract, [`Shell::makedirs`]: an existing
//! directory is success, an existing non-directory is an error. Removal has
//! the mirror contract: [`Shell::remove`] on an absent path is success.

pub mod command_builder;

pub use command_builder::{CommandOutput, OutputMode, ShellCommand};

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Operations the CMT wrapper and the package builder need from a shell.
pub trait Shell: Send + Sync {
    /// Runs a command and returns its status and captured output.
    ///
    /// Commands without an explicit working directory run in [`Shell::getcwd`].
    fn run(&self, command: ShellCommand) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Changes the working directory of this shell.
    fn chdir(&self, dir: &Path) -> Result<()>;

    /// Current working directory of this shell.
    fn getcwd(&self) -> PathBuf;

    /// Creates `dir` and its parents if absent.
    fn makedirs(&self, dir: &Path) -> Result<()>;

    /// Removes a file, symlink or directory tree; absent paths are ignored.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Creates a symbolic link at `link` pointing to `target`.
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Resolves `path` against the shell working directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.getcwd().join(path)
        }
    }
}

/// Shell that spawns real local processes.
#[derive(Debug)]
pub struct LocalShell {
    cwd: Mutex<PathBuf>,
}

impl LocalShell {
    /// Creates a shell rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read the current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Creates a shell rooted at `cwd`.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Mutex::new(cwd.into()),
        }
    }
}

impl Shell for LocalShell {
    fn run(&self, command: ShellCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        let command = command.default_dir(&self.getcwd());
        command.execute()
    }

    fn chdir(&self, dir: &Path) -> Result<()> {
        let target = self.resolve(dir);
        if !target.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such directory: {}", target.display()),
            ))
            .with_context(|| format!("Failed to change directory to {}", target.display()));
        }
        tracing::trace!(target: "shell", "chdir [{}]", target.display());
        *self.cwd.lock().unwrap_or_else(PoisonError::into_inner) = target;
        Ok(())
    }

    fn getcwd(&self) -> PathBuf {
        self.cwd.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn makedirs(&self, dir: &Path) -> Result<()> {
        let target = self.resolve(dir);
        crate::utils::fs::ensure_dir(&target)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let target = self.resolve(path);
        tracing::trace!(target: "shell", "removing [{}]...", target.display());
        crate::utils::fs::remove_path(&target)
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let link = self.resolve(link);
        crate::utils::fs::symlink(target, &link)
    }
}
