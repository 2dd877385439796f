//! Generic builder for external packages
//!
//! [`PkgBuilder`] drives one package through
//! `pre_build → build (fetch, configure, build, install) → post_build`:
//!
//! - `pre_build` purges and recreates the staging install and build
//!   directories, enters the build directory and opens the build log
//! - `build` unpacks or copies the sources, then performs the configure,
//!   build and install steps of the [`BuildFlavor`]
//! - `post_build` relocates the staged files into the install area through
//!   relative symlinks, leaves the build directory and removes it together
//!   with the log
//!
//! A successful build writes a `pkg-build-<name>.done` sentinel next to the
//! build directory. While it exists, [`PkgBuilder::pkg_build`] does nothing.
//! A failing step dumps the build log to stdout; the build directory is
//! removed on every exit path, the log only on success.
//!
//! Every process a step runs sees the expanded [`BuildEnv`] on top of the
//! inherited process environment. Step output goes to the build log unless
//! the environment sets `PKGBUILD_VERBOSE`.

pub mod archive;
pub mod autoconf;
pub mod env;
pub mod flavor;
pub mod recipe;
pub mod relocate;

pub use env::BuildEnv;
pub use flavor::{BuildAction, BuildFlavor, BuildSteps};
pub use recipe::Recipe;
pub use relocate::RelocationReport;

use anyhow::{Context, Result};
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::cmt::CmtWrapper;
use crate::constants::{CMT_DIR, LOG_FRAME_WIDTH, PKG_BUILD_PREFIX, PKGBUILD_VERBOSE_ENV};
use crate::core::CmtError;
use crate::shell::{Shell, ShellCommand};
use crate::utils::fs::copy_dir;
use autoconf::{HostOs, cmt_to_autoconf, fetch_autoconf_macros};

/// Locations and identity of one package build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Package root directory
    pub root: PathBuf,
    /// Source archive or directory
    pub src: PathBuf,
    /// Scratch build directory, `<root>/<CMTCONFIG>/pkg-build-<name>`
    pub build_dir: PathBuf,
    /// Staging install directory
    pub install_dir: PathBuf,
    /// Shared install area receiving the relocation links
    pub installarea_dir: PathBuf,
    /// Whether post_build relocates into the install area
    pub relocate: bool,
}

impl BuildContext {
    /// Reads the context from the `pkg_*` keys and `CMTCONFIG`.
    pub fn from_env(env: &mut BuildEnv, relocate: bool) -> Result<Self> {
        let name = env.require("pkg_name")?;
        let root = PathBuf::from(env.require("pkg_root")?);
        let cmtconfig = env.require("CMTCONFIG")?;
        let build_dir = root.join(&cmtconfig).join(format!("{PKG_BUILD_PREFIX}{name}"));
        Ok(Self {
            version: env.require("pkg_ver")?,
            src: PathBuf::from(env.require("pkg_src")?),
            install_dir: PathBuf::from(env.require("pkg_install_dir")?),
            installarea_dir: PathBuf::from(env.require("pkg_installarea_dir")?),
            name,
            root,
            build_dir,
            relocate,
        })
    }

    /// Directory holding the build directory, its log and its sentinel.
    pub fn build_root(&self) -> PathBuf {
        self.build_dir.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Directory the sources unpack into, `<build_dir>/<name>-<version>`.
    pub fn source_dir(&self) -> PathBuf {
        self.build_dir.join(format!("{}-{}", self.name, self.version))
    }

    /// Staging tree relocated by post_build.
    pub fn dest_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Build log, appended to by every step.
    pub fn log_path(&self) -> PathBuf {
        self.build_root().join(format!("{PKG_BUILD_PREFIX}{}.log", self.name))
    }

    /// Sentinel marking a finished build.
    pub fn sentinel_path(&self) -> PathBuf {
        self.build_root().join(format!("{PKG_BUILD_PREFIX}{}.done", self.name))
    }
}

/// Result of [`PkgBuilder::pkg_build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The package was built by this call
    Built,
    /// A sentinel from an earlier build short-circuited the call
    AlreadyBuilt,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Configure,
    Build,
    Install,
}

/// Build state machine for one package.
pub struct PkgBuilder<'a, S: Shell> {
    shell: &'a S,
    ctx: BuildContext,
    env: BuildEnv,
    flavor: BuildFlavor,
    origin: Option<PathBuf>,
}

impl<'a, S: Shell> PkgBuilder<'a, S> {
    /// Creates a builder; nothing happens before [`PkgBuilder::pkg_build`].
    pub const fn new(shell: &'a S, ctx: BuildContext, env: BuildEnv, flavor: BuildFlavor) -> Self {
        Self {
            shell,
            ctx,
            env,
            flavor,
            origin: None,
        }
    }

    /// The build context.
    pub const fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// The build environment, as updated by the steps so far.
    pub const fn env(&self) -> &BuildEnv {
        &self.env
    }

    /// Whether the sentinel of a finished build exists.
    pub fn is_done(&self) -> bool {
        self.shell.resolve(&self.ctx.sentinel_path()).exists()
    }

    /// Builds the package unless it was already built.
    ///
    /// # Errors
    ///
    /// Any failing step, after the build log has been dumped to stdout.
    pub async fn pkg_build(&mut self) -> Result<BuildOutcome> {
        if self.is_done() {
            info!(target: "pkgbuild", "[{}] already built, nothing to do", self.ctx.name);
            return Ok(BuildOutcome::AlreadyBuilt);
        }

        let start = Local::now();
        info!(target: "pkgbuild", "building [{}-{}]...", self.ctx.name, self.ctx.version);

        if let Err(e) = self.run_states().await {
            self.cleanup_after_failure();
            return Err(e);
        }

        let done = Local::now();
        let sentinel = self.shell.resolve(&self.ctx.sentinel_path());
        let stamp = format!(
            "start: {}\ndone:  {}\n",
            start.format("%a %b %e %H:%M:%S %Y"),
            done.format("%a %b %e %H:%M:%S %Y")
        );
        std::fs::write(&sentinel, stamp)
            .with_context(|| format!("Failed to write {}", sentinel.display()))?;

        info!(target: "pkgbuild", "building [{}-{}]... [ok]", self.ctx.name, self.ctx.version);
        Ok(BuildOutcome::Built)
    }

    async fn run_states(&mut self) -> Result<()> {
        self.pre_build()?;
        self.build().await?;
        self.post_build()
    }

    /// Purges and recreates the install and build directories, enters the
    /// build directory and opens the build log.
    pub fn pre_build(&mut self) -> Result<()> {
        self.origin = Some(self.shell.getcwd());

        self.shell.remove(&self.ctx.install_dir)?;
        self.shell.makedirs(&self.ctx.install_dir)?;
        self.shell.remove(&self.ctx.build_dir)?;
        self.shell.makedirs(&self.ctx.build_dir)?;
        self.shell.chdir(&self.ctx.build_dir)?;

        let log = self.shell.resolve(&self.ctx.log_path());
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log)
            .with_context(|| format!("Failed to open build log {}", log.display()))?;

        if self.ctx.relocate {
            self.shell.remove(self.ctx.dest_dir())?;
            self.shell.makedirs(self.ctx.dest_dir())?;
        }
        Ok(())
    }

    /// Fetches the sources, then configures, builds and installs them.
    pub async fn build(&mut self) -> Result<()> {
        self.fetch_src()?;
        for step in [Step::Configure, Step::Build, Step::Install] {
            debug!(target: "pkgbuild", "[{}] {:?}...", self.ctx.name, step);
            let actions = match step {
                Step::Configure => self.flavor.configure(&self.ctx, &mut self.env)?,
                Step::Build => self.flavor.build(&self.ctx, &mut self.env)?,
                Step::Install => self.flavor.install(&self.ctx, &mut self.env)?,
            };
            self.perform(actions).await?;
        }
        Ok(())
    }

    /// Brings the sources into the build directory.
    ///
    /// An archive is linked into the build directory and unpacked into the
    /// shell directory; a directory is copied.
    pub fn fetch_src(&self) -> Result<()> {
        let src = self.shell.resolve(&self.ctx.src);
        if !src.exists() {
            return Err(CmtError::SourceNotFound {
                path: src.display().to_string(),
            }
            .into());
        }
        let file_name = src.file_name().context("source path has no file name")?;
        let build_dir = self.shell.resolve(&self.ctx.build_dir);
        let dest = build_dir.join(file_name);

        if src.is_dir() {
            debug!(target: "pkgbuild", "copying [{}] -> [{}]", src.display(), dest.display());
            copy_dir(&src, &dest)
        } else {
            self.shell.symlink(&src, &dest)?;
            archive::uncompress(&dest, &self.shell.getcwd())
        }
    }

    /// Relocates, leaves the build directory and removes it with the log.
    pub fn post_build(&mut self) -> Result<()> {
        if self.ctx.relocate {
            let report =
                relocate::relocate(self.shell, self.ctx.dest_dir(), &self.ctx.installarea_dir)?;
            info!(
                target: "pkgbuild",
                "relocated [{}] files into [{}]",
                report.linked.len(),
                self.ctx.installarea_dir.display()
            );
        }
        if let Some(origin) = self.origin.take() {
            self.shell.chdir(&origin)?;
        }
        self.shell.remove(&self.ctx.build_dir)?;
        self.shell.remove(&self.ctx.log_path())?;
        Ok(())
    }

    async fn perform(&mut self, actions: Vec<BuildAction>) -> Result<()> {
        for action in actions {
            match action {
                BuildAction::Chdir(dir) => self.shell.chdir(&dir)?,
                BuildAction::MakeDirs(dir) => self.shell.makedirs(&dir)?,
                BuildAction::Append {
                    path,
                    text,
                } => {
                    let path = self.shell.resolve(&path);
                    let mut file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    file.write_all(text.as_bytes())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                BuildAction::Run(command) => self.run(command).await?,
            }
        }
        Ok(())
    }

    /// Runs one step command with the build environment.
    ///
    /// Output goes to the build log (or the terminal with
    /// `PKGBUILD_VERBOSE`). A failure dumps the log before returning, unless
    /// the output already went to the terminal.
    pub async fn run(&mut self, command: ShellCommand) -> Result<()> {
        let command = command.envs(self.env.expanded_vars()?);
        let command = if self.is_verbose() {
            command.inherit_stdio()
        } else {
            command.append_to(self.shell.resolve(&self.ctx.log_path()))
        };
        let line = command.command_line();

        let failure = match self.shell.run(command).await {
            Ok(output) => output.into_success().err(),
            Err(e) => Some(e),
        };
        match failure {
            None => Ok(()),
            Some(e) => {
                error!(target: "pkgbuild", "problem executing [{}]", line);
                if let Some(dump) = self.log_dump() {
                    print!("{dump}");
                }
                Err(e.context(format!("building [{}] failed", self.ctx.name)))
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.env.contains(PKGBUILD_VERBOSE_ENV)
    }

    /// The framed build log printed after a failed step.
    ///
    /// `None` with `PKGBUILD_VERBOSE`: step output went to the terminal.
    pub fn log_dump(&self) -> Option<String> {
        if self.is_verbose() {
            return None;
        }
        let log = self.shell.resolve(&self.ctx.log_path());
        let content = std::fs::read_to_string(&log).unwrap_or_default();
        let frame = "=".repeat(LOG_FRAME_WIDTH);
        let mut dump = format!("dumping build log:\n{frame}\n{content}");
        if !content.is_empty() && !content.ends_with('\n') {
            dump.push('\n');
        }
        dump.push_str(&frame);
        dump.push('\n');
        Some(dump)
    }

    fn cleanup_after_failure(&mut self) {
        if let Some(origin) = self.origin.take() {
            if let Err(e) = self.shell.chdir(&origin) {
                warn!(target: "pkgbuild", "could not go back to [{}]: {:#}", origin.display(), e);
            }
        }
        if let Err(e) = self.shell.remove(&self.ctx.build_dir) {
            warn!(target: "pkgbuild", "could not remove [{}]: {:#}", self.ctx.build_dir.display(), e);
        }
    }
}

/// Options of [`build_package`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Relocate into the install area after install
    pub relocate: bool,
    /// Flavor overriding the recipe's
    pub flavor: Option<BuildFlavor>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            relocate: true,
            flavor: None,
        }
    }
}

/// Adds the CMT view of the package in `pkg_cmt_dir` to `env`: the install
/// area, the configuration tag, the autoconf variables and the raw macros
/// the distutils flavor reads.
pub async fn import_cmt_env<S: Shell>(
    cmt: &CmtWrapper<S>,
    pkg_cmt_dir: &Path,
    env: &mut BuildEnv,
) -> Result<()> {
    let installarea = cmt.macro_value_in(pkg_cmt_dir, "CMTINSTALLAREA").await?;
    if !installarea.is_empty() {
        env.insert("CMTINSTALLAREA", installarea);
    }
    let tag = cmt.macro_value_in(pkg_cmt_dir, "tag").await?;
    if !tag.is_empty() {
        env.insert("CMTCONFIG", tag);
    }

    let cmtconfig = env.get("CMTCONFIG")?.unwrap_or_default();
    let macros = fetch_autoconf_macros(cmt, pkg_cmt_dir).await?;
    for (key, value) in cmt_to_autoconf(&macros, &cmtconfig, HostOs::current()) {
        env.insert(key, value);
    }
    for name in ["Python_linkopts", "cppflags", "ppcmd"] {
        let value = cmt.macro_value_in(pkg_cmt_dir, name).await?;
        env.insert(name, value);
    }
    Ok(())
}

async fn python_version<S: Shell>(shell: &S) -> Result<String> {
    let command = ShellCommand::new("python")
        .args(["-c", "import sys; print('%d.%d' % sys.version_info[:2])"])
        .with_context("python version");
    let output = shell.run(command).await?.into_success()?;
    Ok(output.stdout.trim().to_string())
}

/// Builds the package described by the recipe at `recipe_path`.
///
/// `env` is the starting environment, usually [`BuildEnv::from_process`].
/// With a CMT environment the package's `cmt/` directory is queried for the
/// install area, the configuration tag and the compiler settings first.
pub async fn build_package<S: Shell, C: Shell>(
    shell: &S,
    recipe_path: &Path,
    mut env: BuildEnv,
    cmt: Option<&CmtWrapper<C>>,
    options: BuildOptions,
) -> Result<BuildOutcome> {
    let recipe = Recipe::load(&shell.resolve(recipe_path)).await?;
    recipe.apply(&mut env);

    if let Some(cmt) = cmt {
        let pkg_cmt_dir = PathBuf::from(env.require("pkg_root")?).join(CMT_DIR);
        if pkg_cmt_dir.is_dir() {
            import_cmt_env(cmt, &pkg_cmt_dir, &mut env).await?;
        } else {
            warn!(
                target: "pkgbuild",
                "no [{}] directory, CMT settings are not imported",
                pkg_cmt_dir.display()
            );
        }
    }

    let flavor = match options.flavor {
        Some(flavor) => flavor,
        None => recipe.flavor()?,
    };
    if matches!(flavor, BuildFlavor::Distutils) && !env.contains("pkg_python_version") {
        let version = python_version(shell).await?;
        env.insert("pkg_python_version", version);
    }

    let ctx = BuildContext::from_env(&mut env, options.relocate)?;
    PkgBuilder::new(shell, ctx, env, flavor).pkg_build().await
}
