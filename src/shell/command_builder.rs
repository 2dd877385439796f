//! Fluent builder for external process invocations
//!
//! Every process cmtkit spawns (the CMT binary, `svn`, build steps) is
//! described by a [`ShellCommand`] and executed through a [`Shell`](super::Shell).
//! The builder records the program, arguments, working directory, extra
//! environment, output routing and an optional timeout; [`ShellCommand::execute`]
//! runs it with `tokio::process`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use cmtkit::shell::ShellCommand;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let output = ShellCommand::new("cmt.exe")
//!     .args(["show", "projects"])
//!     .with_timeout(Some(Duration::from_secs(60)))
//!     .with_context("listing projects")
//!     .execute()
//!     .await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::CmtError;

/// Where the standard output and error of a command go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture both streams and return them in [`CommandOutput`]
    Capture,
    /// Capture stdout only; stderr goes to `/dev/null`
    CaptureStdout,
    /// Stream both to the terminal
    Inherit,
    /// Discard both streams
    Discard,
    /// Append both streams to the given file, creating it if needed
    AppendTo(PathBuf),
    /// Write stdout to the given file (truncating it); stderr is captured
    WriteTo(PathBuf),
}

/// Builder for one external process invocation.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Executable name or path
    program: String,

    /// Command arguments
    args: Vec<String>,

    /// Working directory (None = the executing shell's directory)
    current_dir: Option<PathBuf>,

    /// Environment variables set on top of the inherited environment
    env_vars: Vec<(String, String)>,

    /// Output routing
    output: OutputMode,

    /// Maximum duration to wait for completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional context string for log and error messages
    context: Option<String>,
}

impl ShellCommand {
    /// Creates a builder for `program` with captured output and no timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            output: OutputMode::Capture,
            timeout_duration: None,
            context: None,
        }
    }

    /// Splits a whitespace-separated command line into program and arguments.
    ///
    /// Returns `None` for a blank line.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets the working directory only when none was chosen yet.
    pub(crate) fn default_dir(mut self, dir: &Path) -> Self {
        if self.current_dir.is_none() {
            self.current_dir = Some(dir.to_path_buf());
        }
        self
    }

    /// Sets one environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Sets several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Captures stdout only and discards stderr.
    pub fn capture_stdout(mut self) -> Self {
        self.output = OutputMode::CaptureStdout;
        self
    }

    /// Streams output to the terminal.
    pub fn inherit_stdio(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Discards all output.
    pub fn discard_output(mut self) -> Self {
        self.output = OutputMode::Discard;
        self
    }

    /// Appends stdout and stderr to `path`.
    pub fn append_to(mut self, path: impl AsRef<Path>) -> Self {
        self.output = OutputMode::AppendTo(path.as_ref().to_path_buf());
        self
    }

    /// Writes stdout to `path`, replacing its content.
    pub fn write_to(mut self, path: impl AsRef<Path>) -> Self {
        self.output = OutputMode::WriteTo(path.as_ref().to_path_buf());
        self
    }

    /// Sets a custom timeout for the command (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Adds a context string used in log and error messages.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument list.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The working directory, if one was set.
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Extra environment variables.
    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env_vars
    }

    /// The output routing.
    pub const fn output_mode(&self) -> &OutputMode {
        &self.output
    }

    /// The timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout_duration
    }

    /// Program and arguments joined by spaces.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Output file location; relative paths are taken from the working directory.
    fn output_path(&self, path: &Path) -> PathBuf {
        match &self.current_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Spawns the process and waits for it.
    ///
    /// A nonzero exit status is not an error here; callers decide with
    /// [`CommandOutput::success`] or [`CommandOutput::into_success`].
    /// Failure to spawn and an expired timeout are errors.
    pub async fn execute(self) -> Result<CommandOutput> {
        let start = std::time::Instant::now();
        let command_line = self.command_line();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            tracing::trace!(target: "shell", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        match &self.output {
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::piped());
            }
            OutputMode::CaptureStdout => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::null());
            }
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
            OutputMode::Discard => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
            OutputMode::AppendTo(path) => {
                let path = &self.output_path(path);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                let err_file = file.try_clone().context("Failed to duplicate log file handle")?;
                cmd.stdout(file);
                cmd.stderr(err_file);
            }
            OutputMode::WriteTo(path) => {
                let path = &self.output_path(path);
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                cmd.stdout(file);
                cmd.stderr(Stdio::piped());
            }
        }

        if let Some(ref ctx) = self.context {
            tracing::debug!(target: "shell", "({}) ==> [{}]", ctx, command_line);
        } else {
            tracing::debug!(target: "shell", "==> [{}]", command_line);
        }

        // Only the streams configured as piped are collected.
        let child = cmd.spawn().with_context(|| format!("Failed to execute {command_line}"))?;
        let output_future = child.wait_with_output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute {command_line}"))?
            } else {
                tracing::warn!(
                    target: "shell",
                    "Command timed out after {} seconds: {}",
                    duration.as_secs(),
                    command_line
                );
                return Err(CmtError::CommandTimedOut {
                    command: command_line,
                    seconds: duration.as_secs(),
                }
                .into());
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute {command_line}"))?
        };

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if status != 0 {
            tracing::debug!(target: "shell", "Command failed with exit code: {}", status);
            if !stderr.is_empty() {
                tracing::debug!(target: "shell", "Error: {}", stderr.trim());
            }
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::debug!(
                target: "shell::perf",
                "{} took {:.2}s",
                self.program,
                elapsed.as_secs_f64()
            );
        }

        Ok(CommandOutput {
            command: command_line,
            status,
            stdout,
            stderr,
        })
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command line that produced this output
    pub command: String,
    /// Exit status (-1 when terminated by a signal)
    pub status: i32,
    /// Captured standard output (empty unless captured)
    pub stdout: String,
    /// Captured standard error (empty unless captured)
    pub stderr: String,
}

impl CommandOutput {
    /// Builds an output record directly, used by non-process shells.
    pub fn new(
        command: impl Into<String>,
        status: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status zero.
    pub const fn success(&self) -> bool {
        self.status == 0
    }

    /// Turns a nonzero exit status into [`CmtError::CommandFailed`].
    pub fn into_success(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(CmtError::CommandFailed {
                command: self.command,
                status: self.status,
                stderr: self.stderr,
            }
            .into())
        }
    }
}
