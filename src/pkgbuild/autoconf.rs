//! Translation of CMT compiler macros into autoconf variables
//!
//! CMT describes the toolchain with its own macros (`cc`, `cppflags`,
//! `cpplinkflags`, ...). Third-party packages built with `configure` expect
//! `CC`, `CFLAGS`, `LDFLAGS` and friends instead, with some CMT-only flags
//! removed. [`cmt_to_autoconf`] performs that mapping on already fetched
//! macro values; [`fetch_autoconf_macros`] asks CMT for them.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::cmt::CmtWrapper;
use crate::shell::Shell;

/// CMT macros read by [`cmt_to_autoconf`], besides `<package>_linkopts`.
pub const AUTOCONF_MACROS: [&str; 14] = [
    "package",
    "cpplinkflags",
    "cmt_installarea_linkopts",
    "use_linkopts",
    "cc",
    "gcc_config_version",
    "cflags",
    "cppflags",
    "pp_cppflags",
    "cppdebugflags",
    "cpp",
    "for",
    "fflags",
    "includes",
];

/// Operating system the package is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Linux
    Linux,
    /// macOS
    Darwin,
    /// Anything else
    Other,
}

impl HostOs {
    /// The operating system cmtkit runs on.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::Darwin,
            _ => Self::Other,
        }
    }

    const fn triple_name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Other => "none",
        }
    }
}

/// GNU host triple for a CMT configuration tag.
pub fn host_triple(cmtconfig: &str, os: HostOs) -> String {
    let arch = if cmtconfig.contains("x86_64") {
        "x86_64"
    } else {
        "i686"
    };
    format!("{arch}-unknown-{}-gnu", os.triple_name())
}

/// Queries CMT, from the package in `pkg_dir`, for every macro
/// [`cmt_to_autoconf`] needs. Unset macros come back empty.
pub async fn fetch_autoconf_macros<S: Shell>(
    cmt: &CmtWrapper<S>,
    pkg_dir: &Path,
) -> Result<BTreeMap<String, String>> {
    let mut macros = BTreeMap::new();
    for name in AUTOCONF_MACROS {
        let value = cmt.macro_value_in(pkg_dir, name).await?;
        macros.insert(name.to_string(), value);
    }
    let package = macros.get("package").cloned().unwrap_or_default();
    if !package.is_empty() {
        let key = format!("{package}_linkopts");
        let value = cmt.macro_value_in(pkg_dir, &key).await?;
        macros.insert(key, value);
    }
    Ok(macros)
}

fn remove(value: &str, needle: &str) -> String {
    value.replace(needle, "")
}

fn joined(macros: &BTreeMap<String, String>, names: &[&str]) -> String {
    names.iter().map(|&name| macros.get(name).map_or("", String::as_str)).collect::<Vec<_>>().join(" ")
}

fn edit(env: &mut BTreeMap<String, String>, keys: &[&str], f: impl Fn(&str) -> String) {
    for key in keys {
        if let Some(value) = env.get_mut(*key) {
            *value = f(value);
        }
    }
}

/// Derives the autoconf variables from CMT macro values.
///
/// Produces `LDFLAGS`, `LIBS`, `CC`, `compiler`, `gcc-version`, `LD`,
/// `CFLAGS`, `CXX`, `CXXFLAGS`, `FC`, `FCFLAGS`, `CPPFLAGS`, `F77`, `FFLAGS`
/// and `pkg_host_triple`. Missing macros count as empty.
pub fn cmt_to_autoconf(
    macros: &BTreeMap<String, String>,
    cmtconfig: &str,
    os: HostOs,
) -> BTreeMap<String, String> {
    let m = |name: &str| macros.get(name).map_or("", String::as_str);

    let mut env: BTreeMap<String, String> = BTreeMap::new();
    let mut set = |key: &str, value: String| {
        env.insert(key.to_string(), value);
    };
    set("LDFLAGS", joined(macros, &["cpplinkflags", "cmt_installarea_linkopts"]));
    set("LIBS", m("use_linkopts").to_string());
    set("CC", m("cc").to_string());
    set("compiler", m("cc").to_string());
    set("gcc-version", m("gcc_config_version").to_string());
    set("LD", m("cc").to_string());
    set("CFLAGS", joined(macros, &["cflags", "cppflags", "pp_cppflags", "cppdebugflags"]));
    set("CXX", m("cpp").to_string());
    set("CXXFLAGS", joined(macros, &["cppflags", "pp_cppflags", "cppdebugflags"]));
    set("FC", m("for").to_string());
    set("FCFLAGS", m("fflags").to_string());
    set("CPPFLAGS", m("includes").to_string());

    let package_linkopts = m(&format!("{}_linkopts", m("package"))).to_string();
    if !package_linkopts.is_empty() {
        if let Some(libs) = env.get_mut("LIBS") {
            *libs = libs.replace(&package_linkopts, " ");
        }
    }

    for value in env.values_mut() {
        *value = value.replace("\r\n", " ").replace('\n', " ").trim().to_string();
    }

    edit(&mut env, &["CC", "CXX", "FC"], |v| remove(v, "-m32"));
    edit(&mut env, &["CFLAGS"], |v| {
        v.replace("-Woverloaded-virtual ", " ").replace("-Wno-deprecated ", " ").replace("-shared ", " ")
    });
    edit(&mut env, &["CXXFLAGS"], |v| v.replace("-shared ", " "));
    edit(&mut env, &["CFLAGS", "CXXFLAGS"], |v| v.replace(" -Werror ", " "));
    edit(&mut env, &["CFLAGS", "FCFLAGS", "CXXFLAGS"], |v| format!("{v} -fno-strict-aliasing"));
    if os == HostOs::Darwin {
        edit(&mut env, &["CFLAGS", "CXXFLAGS"], |v| v.replace(" -bundle ", " "));
    }
    edit(&mut env, &["LDFLAGS", "LIBS"], |v| remove(&remove(v, "-Wl,--as-needed"), "-Wl,--no-undefined"));
    edit(&mut env, &["CC", "CXX", "FC", "compiler"], |v| remove(v, "distcc").trim().to_string());
    edit(&mut env, &["CPPFLAGS"], |v| remove(v, "\""));

    let use_linkopts = m("use_linkopts").replace("\r\n", " ").replace('\n', " ").trim().to_string();
    edit(&mut env, &["LIBS"], |v| {
        if use_linkopts.is_empty() {
            v.trim().to_string()
        } else {
            remove(v, &use_linkopts).trim().to_string()
        }
    });
    edit(&mut env, &["CFLAGS"], |v| v.replace(" -include cstdio ", " -include stdio.h "));

    let fc = env.get("FC").cloned().unwrap_or_default();
    let fcflags = env.get("FCFLAGS").cloned().unwrap_or_default();
    env.insert("F77".to_string(), fc);
    env.insert("FFLAGS".to_string(), fcflags);
    env.insert("pkg_host_triple".to_string(), host_triple(cmtconfig, os));

    for (key, value) in &env {
        debug!(target: "pkgbuild", "autoconf: {} = [{}]", key, value);
    }
    env
}
