//! Error handling for cmtkit
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`CmtError`]) for the failures callers match on
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for CLI users
//!
//! Library functions return [`anyhow::Result`] and attach context with
//! `.context(...)`; leaf failures are raised as [`CmtError`] values so the CLI
//! can downcast them in [`user_friendly_error`].
//!
//! # Error Categories
//!
//! - **Environment inconsistency**: [`CmtError::NoProjects`], [`CmtError::ProjectRootInconsistency`]
//! - **Format drift**: [`CmtError::UndecodableLine`]
//! - **Invalid input**: [`CmtError::InvalidPackageName`], [`CmtError::RecipeInvalid`]
//! - **External tools**: [`CmtError::ToolNotFound`], [`CmtError::CommandFailed`], [`CmtError::CommandTimedOut`]
//! - **Repository**: [`CmtError::CheckoutFailed`], [`CmtError::NoTagFound`]
//! - **Builds**: [`CmtError::UnsupportedArchive`], [`CmtError::SourceNotFound`],
//!   [`CmtError::TemplateKeyMissing`], [`CmtError::TemplateCycle`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use cmtkit::core::{CmtError, user_friendly_error};
//!
//! let err = anyhow::Error::from(CmtError::NoProjects);
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for cmtkit operations.
#[derive(Error, Debug)]
pub enum CmtError {
    /// `cmt show projects` produced no usable project
    #[error("no projects found: corrupted CMT environment?")]
    NoProjects,

    /// The project graph does not have exactly one root
    #[error("project tree inconsistency (found [{found}] root(s))")]
    ProjectRootInconsistency {
        /// Number of projects without parents
        found: usize,
    },

    /// A project name was referenced that the project graph does not know
    #[error("unknown project [{name}]")]
    UnknownProject {
        /// The missing project name
        name: String,
    },

    /// A project graph with a cycle along its child edges
    #[error("project cycle detected through [{name}]")]
    ProjectCycle {
        /// A project taking part in the cycle
        name: String,
    },

    /// A `show uses` line looks like a dependency line but cannot be decoded
    #[error("no decoding for dependency line [{line}]")]
    UndecodableLine {
        /// The offending line, already stripped
        line: String,
    },

    /// A leaf package name was required but a path was given
    #[error("package name [{name}] contains a path separator")]
    InvalidPackageName {
        /// The rejected name
        name: String,
    },

    /// A required executable could not be located
    #[error("could not find [{tool}] in PATH")]
    ToolNotFound {
        /// Executable name
        tool: String,
    },

    /// An external command exited with a nonzero status where success is required
    #[error("command [{command}] failed with status {status}")]
    CommandFailed {
        /// The command line as executed
        command: String,
        /// The exit status (-1 when killed by a signal)
        status: i32,
        /// Captured standard error, possibly empty
        stderr: String,
    },

    /// An external command exceeded its timeout
    #[error("command [{command}] timed out after {seconds} seconds")]
    CommandTimedOut {
        /// The command line as executed
        command: String,
        /// The timeout that expired
        seconds: u64,
    },

    /// `cmt co` reported a failure
    #[error("checkout of [{package}] failed")]
    CheckoutFailed {
        /// Full package name
        package: String,
    },

    /// The repository has no tag for a package
    #[error("no tag found for [{package}]")]
    NoTagFound {
        /// Full package name
        package: String,
    },

    /// The source archive has an extension the extractor does not handle
    #[error("extension [{extension}] not handled for [{path}]")]
    UnsupportedArchive {
        /// Archive path
        path: String,
        /// The extension, without the dot
        extension: String,
    },

    /// The configured package source is neither a file nor a directory
    #[error("package source [{path}] does not exist")]
    SourceNotFound {
        /// The configured source location
        path: String,
    },

    /// A template references a key the build environment does not define
    #[error("unknown key [{key}] in template [{template}]")]
    TemplateKeyMissing {
        /// The key that could not be resolved
        key: String,
        /// The template that referenced it
        template: String,
    },

    /// Template expansion came back to a key it was already expanding
    #[error("template cycle detected while expanding [{key}]")]
    TemplateCycle {
        /// The key that re-entered itself
        key: String,
    },

    /// A build recipe is syntactically valid TOML but semantically unusable
    #[error("invalid recipe [{path}]: {reason}")]
    RecipeInvalid {
        /// Recipe file path
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid global configuration
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML deserialization failure
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Error wrapper carrying a user-facing suggestion and details.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: CmtError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: CmtError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add explanatory details, displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for the terminal.
///
/// The anyhow chain is walked for a [`CmtError`]; when none is found the
/// outermost message is kept and the rest of the chain becomes the details.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(cmt_error) = cause.downcast_ref::<CmtError>() {
            let ctx = create_error_context(cmt_error);
            let outer = error.to_string();
            if outer != cmt_error.to_string() && ctx.details.is_none() {
                return ctx.with_details(outer);
            }
            return ctx;
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(CmtError::IoError(std::io::Error::new(
                io_error.kind(),
                io_error.to_string(),
            )))
            .with_suggestion("Check the ownership and permissions of the build area");
        }
    }

    let details: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let ctx = ErrorContext::new(CmtError::ConfigError {
        message: error.to_string(),
    });
    if details.is_empty() {
        ctx
    } else {
        ctx.with_details(details.join(": "))
    }
}

fn create_error_context(error: &CmtError) -> ErrorContext {
    match error {
        CmtError::NoProjects => ErrorContext::new(CmtError::NoProjects)
            .with_suggestion("Source the CMT setup script (e.g. asetup) before running cmtkit")
            .with_details("'cmt show projects' did not report any project"),
        CmtError::ProjectRootInconsistency {
            found,
        } => ErrorContext::new(CmtError::ProjectRootInconsistency {
            found: *found,
        })
        .with_suggestion("Inspect 'cmt show projects' for missing P=/C= markers")
        .with_details("Exactly one project without parents is expected"),
        CmtError::UnknownProject {
            name,
        } => ErrorContext::new(CmtError::UnknownProject {
            name: name.clone(),
        })
        .with_suggestion("Run 'cmtkit projects' to list the projects of the current environment"),
        CmtError::ProjectCycle {
            name,
        } => ErrorContext::new(CmtError::ProjectCycle {
            name: name.clone(),
        }),
        CmtError::UndecodableLine {
            line,
        } => ErrorContext::new(CmtError::UndecodableLine {
            line: line.clone(),
        })
        .with_details("The output format of 'cmt show uses' changed incompatibly"),
        CmtError::InvalidPackageName {
            name,
        } => ErrorContext::new(CmtError::InvalidPackageName {
            name: name.clone(),
        })
        .with_suggestion("Pass the leaf name of the package (e.g. AthenaKernel, not Control/AthenaKernel)"),
        CmtError::ToolNotFound {
            tool,
        } => ErrorContext::new(CmtError::ToolNotFound {
            tool: tool.clone(),
        })
        .with_suggestion("Set up CMT or pass the binary location with --cmt"),
        CmtError::CommandFailed {
            command,
            status,
            stderr,
        } => {
            let ctx = ErrorContext::new(CmtError::CommandFailed {
                command: command.clone(),
                status: *status,
                stderr: stderr.clone(),
            });
            if stderr.trim().is_empty() {
                ctx
            } else {
                ctx.with_details(stderr.trim().to_string())
            }
        }
        CmtError::CommandTimedOut {
            command,
            seconds,
        } => ErrorContext::new(CmtError::CommandTimedOut {
            command: command.clone(),
            seconds: *seconds,
        })
        .with_suggestion("Raise command_timeout_secs in the configuration, or set it to 0"),
        CmtError::CheckoutFailed {
            package,
        } => ErrorContext::new(CmtError::CheckoutFailed {
            package: package.clone(),
        })
        .with_suggestion("Check the package name and tag, and that the repository is reachable"),
        CmtError::NoTagFound {
            package,
        } => ErrorContext::new(CmtError::NoTagFound {
            package: package.clone(),
        })
        .with_suggestion("Check that SVNROOT is set and points at the package repository"),
        CmtError::UnsupportedArchive {
            path,
            extension,
        } => ErrorContext::new(CmtError::UnsupportedArchive {
            path: path.clone(),
            extension: extension.clone(),
        })
        .with_suggestion("Provide the sources as a .tar.gz or .tar.bz2 archive, or as a directory"),
        CmtError::SourceNotFound {
            path,
        } => ErrorContext::new(CmtError::SourceNotFound {
            path: path.clone(),
        })
        .with_suggestion("Check the 'src' entry of the recipe"),
        CmtError::TemplateKeyMissing {
            key,
            template,
        } => ErrorContext::new(CmtError::TemplateKeyMissing {
            key: key.clone(),
            template: template.clone(),
        })
        .with_suggestion(format!("Define '{key}' in the [env] table of the recipe")),
        CmtError::TemplateCycle {
            key,
        } => ErrorContext::new(CmtError::TemplateCycle {
            key: key.clone(),
        }),
        CmtError::RecipeInvalid {
            path,
            reason,
        } => ErrorContext::new(CmtError::RecipeInvalid {
            path: path.clone(),
            reason: reason.clone(),
        }),
        CmtError::ConfigError {
            message,
        } => ErrorContext::new(CmtError::ConfigError {
            message: message.clone(),
        }),
        CmtError::IoError(e) => {
            ErrorContext::new(CmtError::IoError(std::io::Error::new(e.kind(), e.to_string())))
        }
        CmtError::TomlError(e) => ErrorContext::new(CmtError::ConfigError {
            message: e.to_string(),
        })
        .with_details("TOML parsing errors are usually caused by missing quotes or brackets"),
    }
}
