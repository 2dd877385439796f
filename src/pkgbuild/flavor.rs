//! Build flavors: the configure, build and install steps of a package
//!
//! A flavor does not run anything itself. Each step returns the
//! [`BuildAction`]s the builder performs in order, so every process and
//! filesystem effect goes through the builder's shell and ends up in the
//! build log.

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::BuildContext;
use super::autoconf::HostOs;
use super::env::BuildEnv;
use crate::core::CmtError;
use crate::shell::ShellCommand;
use crate::utils::cpu_count;

/// One effect of a build step.
#[derive(Debug, Clone)]
pub enum BuildAction {
    /// Change the shell directory
    Chdir(PathBuf),
    /// Create a directory and its parents
    MakeDirs(PathBuf),
    /// Append text to a file (relative to the shell directory)
    Append {
        /// File to extend
        path: PathBuf,
        /// Text to add
        text: String,
    },
    /// Run a command with the build environment
    Run(ShellCommand),
}

/// The three build steps of a package.
///
/// `configure` and `install` default to doing nothing; `build` must be
/// provided. Steps may update `env`; later steps and every command see the
/// result.
pub trait BuildSteps: Send + Sync {
    /// Prepares the unpacked sources.
    fn configure(&self, _ctx: &BuildContext, _env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        Ok(Vec::new())
    }

    /// Compiles the package.
    fn build(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>>;

    /// Installs into [`BuildContext::install_dir`].
    fn install(&self, _ctx: &BuildContext, _env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        Ok(Vec::new())
    }
}

/// How a package is built.
#[derive(Clone)]
pub enum BuildFlavor {
    /// `configure && make && make install`
    Autotools,
    /// `python setup.py build && python setup.py install`
    Distutils,
    /// Caller-provided steps
    Custom(Arc<dyn BuildSteps>),
}

impl fmt::Debug for BuildFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Autotools => f.write_str("Autotools"),
            Self::Distutils => f.write_str("Distutils"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl BuildFlavor {
    /// Flavor named in a recipe: `autotools` (or `cmmi`) and `distutils`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "autotools" | "cmmi" => Some(Self::Autotools),
            "distutils" => Some(Self::Distutils),
            _ => None,
        }
    }

    fn steps(&self) -> &dyn BuildSteps {
        match self {
            Self::Autotools => &Autotools,
            Self::Distutils => &Distutils,
            Self::Custom(steps) => steps.as_ref(),
        }
    }

    /// Configure step.
    pub fn configure(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        self.steps().configure(ctx, env)
    }

    /// Build step.
    pub fn build(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        self.steps().build(ctx, env)
    }

    /// Install step.
    pub fn install(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        self.steps().install(ctx, env)
    }
}

/// configure, make, make install.
struct Autotools;

impl BuildSteps for Autotools {
    fn configure(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        let mut configure =
            ShellCommand::new("./configure").arg(format!("--prefix={}", ctx.install_dir.display()));
        if let Some(triple) = env.get("pkg_host_triple")? {
            configure = configure.arg(format!("--host={triple}"));
        }
        Ok(vec![BuildAction::Chdir(ctx.source_dir()), BuildAction::Run(configure)])
    }

    fn build(&self, _ctx: &BuildContext, _env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        let make = ShellCommand::new("make").arg(format!("-j{}", cpu_count()));
        Ok(vec![BuildAction::Run(make)])
    }

    fn install(&self, _ctx: &BuildContext, _env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        Ok(vec![BuildAction::Run(ShellCommand::new("make").arg("install"))])
    }
}

/// Python packages built with `setup.py`.
struct Distutils;

const SITE_CFG: &str = "\
[DEFAULT]
library_dirs = %(LD_LIBRARY_PATH)s:/usr/lib:/lib
include_dirs = %(includes)s
fcompiler    = %(FC)s
";

fn python_lib_dir(env: &mut BuildEnv) -> Result<String> {
    let version = env.get("pkg_python_version")?.ok_or_else(|| CmtError::ConfigError {
        message: "distutils builds need pkg_python_version (e.g. 2.6)".to_string(),
    })?;
    Ok(format!("lib/python{version}"))
}

impl BuildSteps for Distutils {
    fn configure(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        let fc = env.get("FC")?.unwrap_or_default();
        env.insert("F77", fc);

        let linkopts = env.get("Python_linkopts")?.unwrap_or_default();
        let shared = if HostOs::current() == HostOs::Darwin {
            ""
        } else {
            " -shared"
        };
        env.append("LDFLAGS", &format!(" {linkopts}{shared}"))?;

        let cppflags = env.get("cppflags")?.unwrap_or_default();
        if cppflags.contains("-m32") {
            env.append("CC", " -m32")?;
            env.append("CXX", " -m32")?;
        }

        let ppcmd = env.get("ppcmd")?.filter(|p| !p.is_empty()).unwrap_or_else(|| "-I".to_string());
        let includes = env.get("CPPFLAGS")?.unwrap_or_default();
        let includes = includes
            .split(ppcmd.as_str())
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .collect::<Vec<_>>()
            .join(":")
            .replace('"', "");
        env.insert("includes", includes);

        let text = env.expand(SITE_CFG)?;
        Ok(vec![
            BuildAction::Chdir(ctx.source_dir()),
            BuildAction::Append {
                path: PathBuf::from("site.cfg"),
                text,
            },
        ])
    }

    fn build(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        let egg_cache = ctx.source_dir().join(".python-eggs");
        env.insert("PYTHON_EGG_CACHE", egg_cache.display().to_string());
        Ok(vec![BuildAction::Run(ShellCommand::new("python").args(["setup.py", "build"]))])
    }

    fn install(&self, ctx: &BuildContext, env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        let lib = python_lib_dir(env)?;
        let install = ShellCommand::new("python").args([
            "setup.py".to_string(),
            "install".to_string(),
            "--force".to_string(),
            format!("--root={}", ctx.install_dir.display()),
            format!("--install-platlib={lib}"),
            format!("--install-purelib={lib}"),
            "--install-scripts=bin".to_string(),
            format!("--install-data={lib}"),
        ]);
        Ok(vec![
            BuildAction::MakeDirs(ctx.install_dir.join(&lib)),
            BuildAction::MakeDirs(ctx.install_dir.join("bin")),
            BuildAction::Run(install),
        ])
    }
}
