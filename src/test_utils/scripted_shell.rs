//! A [`Shell`] that answers from a script.
//!
//! Rules match a substring of the command line and are tried in the order
//! they were added; commands no rule matches succeed with empty output.
//! Output is routed the way the command asks for (`write_to`, `append_to`,
//! discard), so code reading dump files or build logs sees the scripted text.
//! Filesystem operations are real and resolve against the shell's own
//! working directory.

use anyhow::{Context, Result};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::shell::{CommandOutput, OutputMode, Shell, ShellCommand};
use crate::utils::fs::{ensure_dir, remove_path, symlink};

type Handler = Arc<dyn Fn(&ShellCommand) -> CommandOutput + Send + Sync>;

enum Response {
    Canned {
        status: i32,
        stdout: String,
    },
    Handler(Handler),
}

struct Rule {
    pattern: String,
    response: Response,
}

/// A command the scripted shell was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Program and arguments
    pub command_line: String,
    /// Directory the command would have run in
    pub cwd: PathBuf,
    /// Extra environment of the command
    pub env: Vec<(String, String)>,
    /// Requested output routing
    pub output: OutputMode,
}

/// Scripted test double for [`Shell`].
pub struct ScriptedShell {
    cwd: Mutex<PathBuf>,
    rules: Vec<Rule>,
    recorded: Mutex<Vec<RecordedCommand>>,
}

impl ScriptedShell {
    /// Creates a shell in `cwd` with no rules.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Mutex::new(cwd.into()),
            rules: Vec::new(),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Answers commands containing `pattern` with `status` and `stdout`.
    #[must_use]
    pub fn on(mut self, pattern: &str, status: i32, stdout: &str) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Canned {
                status,
                stdout: stdout.to_string(),
            },
        });
        self
    }

    /// Answers commands containing `pattern` by calling `handler`.
    #[must_use]
    pub fn on_run<F>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&ShellCommand) -> CommandOutput + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Handler(Arc::new(handler)),
        });
        self
    }

    /// Every command run so far, in order.
    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Command lines run so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.recorded().into_iter().map(|c| c.command_line).collect()
    }

    fn respond(&self, command: &ShellCommand) -> Result<CommandOutput> {
        let line = command.command_line();
        let cwd = command.working_dir().map_or_else(|| self.getcwd(), |dir| self.resolve(dir));
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedCommand {
            command_line: line.clone(),
            cwd: cwd.clone(),
            env: command.env_vars().to_vec(),
            output: command.output_mode().clone(),
        });

        let rule = self.rules.iter().find(|rule| line.contains(&rule.pattern));
        let mut output = match rule.map(|r| &r.response) {
            Some(Response::Canned {
                status,
                stdout,
            }) => CommandOutput::new(&line, *status, stdout.as_str(), ""),
            Some(Response::Handler(handler)) => handler(command),
            None => CommandOutput::new(&line, 0, "", ""),
        };

        match command.output_mode() {
            OutputMode::Capture => {}
            OutputMode::CaptureStdout => output.stderr.clear(),
            OutputMode::Inherit | OutputMode::Discard => {
                output.stdout.clear();
                output.stderr.clear();
            }
            OutputMode::AppendTo(path) => {
                let path = cwd.join(path);
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                file.write_all(output.stdout.as_bytes())?;
                file.write_all(output.stderr.as_bytes())?;
                output.stdout.clear();
                output.stderr.clear();
            }
            OutputMode::WriteTo(path) => {
                let path = cwd.join(path);
                std::fs::write(&path, &output.stdout)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                output.stdout.clear();
            }
        }
        Ok(output)
    }
}

impl Shell for ScriptedShell {
    fn run(&self, command: ShellCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        let result = self.respond(&command);
        async move { result }
    }

    fn chdir(&self, dir: &Path) -> Result<()> {
        let target = self.resolve(dir);
        if !target.is_dir() {
            anyhow::bail!("no such directory: {}", target.display());
        }
        *self.cwd.lock().unwrap_or_else(PoisonError::into_inner) = target;
        Ok(())
    }

    fn getcwd(&self) -> PathBuf {
        self.cwd.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn makedirs(&self, dir: &Path) -> Result<()> {
        ensure_dir(&self.resolve(dir))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        remove_path(&self.resolve(path))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        symlink(target, &self.resolve(link))
    }
}
