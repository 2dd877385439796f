use cmtkit::cmt::CmtWrapper;
use anyhow::Result;
use cmtkit::pkgbuild::{
    BuildAction, BuildContext, BuildEnv, BuildFlavor, BuildOptions, BuildOutcome, BuildSteps,
    build_package,
};
use cmtkit::shell::{CommandOutput, LocalShell, Shell, ShellCommand};
use cmtkit::test_utils::ScriptedShell;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::write_file;

const CMTCONFIG: &str = "x86_64-slc5-gcc43-opt";

const RECIPE: &str = r#"
[package]
name = "foo"
version = "1.0"
flavor = "autotools"
"#;

/// Lays out `root/foo` with a recipe and a `foo-1.0.tar.gz` source tarball.
fn package_tree(root: &Path) -> PathBuf {
    let pkg = root.join("foo");
    write_file(&pkg, "pkgbuild.toml", RECIPE);
    std::fs::create_dir_all(pkg.join("src")).unwrap();

    let tarball = std::fs::File::create(pkg.join("src/foo-1.0.tar.gz")).unwrap();
    let mut archive = tar::Builder::new(GzEncoder::new(tarball, Compression::default()));
    let configure = b"#!/bin/sh\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(configure.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    archive.append_data(&mut header, "foo-1.0/configure", &configure[..]).unwrap();
    archive.into_inner().unwrap().finish().unwrap();
    pkg
}

fn env(root: &Path) -> BuildEnv {
    let installarea = root.join("InstallArea").display().to_string();
    [("CMTCONFIG", CMTCONFIG.to_string()), ("CMTINSTALLAREA", installarea)].into_iter().collect()
}

/// Scripted shell whose `make install` stages a library and a header.
fn make_shell(root: &Path, pkg: &Path) -> ScriptedShell {
    let staging = pkg.join(CMTCONFIG).join("pkg-build-install-foo");
    ScriptedShell::new(root).on_run("make install", move |command| {
        std::fs::create_dir_all(staging.join("lib")).unwrap();
        std::fs::create_dir_all(staging.join("include/foo")).unwrap();
        std::fs::write(staging.join("lib/libfoo.so"), "elf").unwrap();
        std::fs::write(staging.join("include/foo/foo.h"), "int foo();\n").unwrap();
        CommandOutput::new(command.command_line(), 0, "installing\n", "")
    })
}

async fn build(shell: &ScriptedShell, recipe: &Path, env: BuildEnv, relocate: bool) -> BuildOutcome {
    let options = BuildOptions {
        relocate,
        ..BuildOptions::default()
    };
    build_package(shell, recipe, env, None::<&CmtWrapper<ScriptedShell>>, options).await.unwrap()
}

#[tokio::test]
async fn test_recipe_build_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let pkg = package_tree(dir.path());
    let shell = make_shell(dir.path(), &pkg);
    let recipe = pkg.join("pkgbuild.toml");

    assert_eq!(build(&shell, &recipe, env(dir.path()), true).await, BuildOutcome::Built);

    let lines = shell.command_lines();
    assert_eq!(lines.len(), 3);
    let staging = pkg.join(CMTCONFIG).join("pkg-build-install-foo");
    assert_eq!(lines[0], format!("./configure --prefix={}", staging.display()));
    assert!(lines[1].starts_with("make -j"));
    assert_eq!(lines[2], "make install");

    let build_dir = pkg.join(CMTCONFIG).join("pkg-build-foo");
    assert_eq!(shell.recorded()[0].cwd, build_dir.join("foo-1.0"));
    assert!(!build_dir.exists());
    assert!(!pkg.join(CMTCONFIG).join("pkg-build-foo.log").exists());
    assert!(pkg.join(CMTCONFIG).join("pkg-build-foo.done").exists());
    assert_eq!(shell.getcwd(), dir.path());

    assert_eq!(build(&shell, &recipe, env(dir.path()), true).await, BuildOutcome::AlreadyBuilt);
    assert_eq!(shell.command_lines().len(), 3);
}

#[cfg(unix)]
#[tokio::test]
async fn test_relocated_tree_survives_a_move() {
    let dir = TempDir::new().unwrap();
    let pkg = package_tree(dir.path());
    let shell = make_shell(dir.path(), &pkg);
    build(&shell, &pkg.join("pkgbuild.toml"), env(dir.path()), true).await;

    let installarea = dir.path().join("InstallArea").join(CMTCONFIG);
    for rel in ["lib/libfoo.so", "include/foo/foo.h"] {
        let link = installarea.join(rel);
        let target = std::fs::read_link(&link).unwrap();
        assert!(target.is_relative(), "{} -> {}", link.display(), target.display());
    }
    assert_eq!(std::fs::read_to_string(installarea.join("lib/libfoo.so")).unwrap(), "elf");

    let moved = TempDir::new().unwrap();
    let new_root = moved.path().join("release");
    std::fs::rename(dir.path(), &new_root).unwrap();
    let moved_area = new_root.join("InstallArea").join(CMTCONFIG);
    assert_eq!(std::fs::read_to_string(moved_area.join("include/foo/foo.h")).unwrap(), "int foo();\n");
    std::fs::rename(&new_root, dir.path()).unwrap();
}

#[tokio::test]
async fn test_without_relocation_install_area_is_untouched() {
    let dir = TempDir::new().unwrap();
    let pkg = package_tree(dir.path());
    let shell = make_shell(dir.path(), &pkg);
    build(&shell, &pkg.join("pkgbuild.toml"), env(dir.path()), false).await;

    assert!(!dir.path().join("InstallArea").exists());
    assert!(pkg.join(CMTCONFIG).join("pkg-build-install-foo/lib/libfoo.so").exists());
}

#[tokio::test]
async fn test_failed_build_can_be_retried() {
    let dir = TempDir::new().unwrap();
    let pkg = package_tree(dir.path());
    let recipe = pkg.join("pkgbuild.toml");

    let failing = ScriptedShell::new(dir.path()).on("make -j", 2, "make: *** [all] Error 2\n");
    let options = BuildOptions::default();
    let err = build_package(&failing, &recipe, env(dir.path()), None::<&CmtWrapper<ScriptedShell>>, options)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("building [foo] failed"));

    let log = std::fs::read_to_string(pkg.join(CMTCONFIG).join("pkg-build-foo.log")).unwrap();
    assert!(log.contains("Error 2"));
    assert!(!pkg.join(CMTCONFIG).join("pkg-build-foo").exists());
    assert!(!pkg.join(CMTCONFIG).join("pkg-build-foo.done").exists());

    let shell = make_shell(dir.path(), &pkg);
    assert_eq!(build(&shell, &recipe, env(dir.path()), true).await, BuildOutcome::Built);
}

/// Build step that fails after printing to the log.
struct Boom;

impl BuildSteps for Boom {
    fn build(&self, _ctx: &BuildContext, _env: &mut BuildEnv) -> Result<Vec<BuildAction>> {
        Ok(vec![BuildAction::Run(ShellCommand::new("sh").args(["-c", "echo boom; exit 2"]))])
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_local_build_failure_keeps_real_log() {
    let dir = TempDir::new().unwrap();
    let pkg = package_tree(dir.path());
    let shell = LocalShell::with_cwd(dir.path());
    let mut env = env(dir.path());
    env.insert_literal("PROMPT_TEMPLATE", "%(user)s 100%%");
    let options = BuildOptions {
        flavor: Some(BuildFlavor::Custom(Arc::new(Boom))),
        ..BuildOptions::default()
    };

    let err = build_package(&shell, &pkg.join("pkgbuild.toml"), env, None::<&CmtWrapper<LocalShell>>, options)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("building [foo] failed"));

    let log = std::fs::read_to_string(pkg.join(CMTCONFIG).join("pkg-build-foo.log")).unwrap();
    assert!(log.contains("boom"), "build log: {log:?}");
    assert!(!pkg.join(CMTCONFIG).join("pkg-build-foo").exists());
    assert!(!pkg.join(CMTCONFIG).join("pkg-build-foo.done").exists());
    assert_eq!(shell.getcwd(), dir.path());
}

#[test]
fn test_templates_expand_once() {
    let mut env: BuildEnv = [("prefix", "/opt"), ("libdir", "%(prefix)s/lib")].into_iter().collect();
    assert_eq!(env.get("libdir").unwrap().as_deref(), Some("/opt/lib"));
    assert!(env.is_expanded("libdir"));
    assert_eq!(env.get("libdir").unwrap().as_deref(), Some("/opt/lib"));
    assert_eq!(env.raw("libdir"), Some("/opt/lib"));
}
