//! Global configuration loading and path resolution.

use cmtkit::cmt::CmtSettings;
use cmtkit::config::{CONFIG_PATH_ENV, GlobalConfig};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
#[serial]
async fn test_config_path_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "top_project = \"AtlasEvent\"\ncommand_timeout_secs = 0\n").unwrap();

    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::set_var(CONFIG_PATH_ENV, &path) };
    let resolved = GlobalConfig::default_path();
    let loaded = GlobalConfig::load_with_optional(None).await;
    unsafe { std::env::remove_var(CONFIG_PATH_ENV) };

    assert_eq!(resolved.unwrap(), path);
    let config = loaded.unwrap();
    assert_eq!(config.top_project, "AtlasEvent");
    assert!(config.relocate);
    assert_eq!(config.command_timeout(), None);
}

#[tokio::test]
#[serial]
async fn test_svnroot_falls_back_to_environment() {
    unsafe { std::env::set_var("SVNROOT", "svn+ssh://svn.cern.ch/reps/atlasoff") };
    let config = GlobalConfig::default();
    let from_env = config.svnroot();
    let explicit = GlobalConfig {
        svnroot: Some("file:///repo".into()),
        ..GlobalConfig::default()
    }
    .svnroot();
    unsafe { std::env::remove_var("SVNROOT") };

    assert_eq!(from_env.as_deref(), Some("svn+ssh://svn.cern.ch/reps/atlasoff"));
    assert_eq!(explicit.as_deref(), Some("file:///repo"));
}

#[tokio::test]
async fn test_settings_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let config = GlobalConfig {
        cmt_bin: Some("/opt/cmt/v1r20/Linux-x86_64/cmt.exe".into()),
        command_timeout_secs: 30,
        project_releases: [("GAUDI".to_string(), "GaudiRelease".to_string())].into(),
        ..GlobalConfig::default()
    };
    config.save_to(&path).await.unwrap();

    let loaded = GlobalConfig::load_with_optional(Some(path)).await.unwrap();
    assert_eq!(loaded, config);

    let settings = CmtSettings::from(&loaded);
    assert_eq!(settings.command_timeout, Some(Duration::from_secs(30)));
    assert_eq!(settings.project_releases["GAUDI"], "GaudiRelease");
}

#[tokio::test]
async fn test_unknown_type_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "relocate = \"sometimes\"\n").unwrap();
    let err = GlobalConfig::load_from(&path).await.unwrap_err();
    assert!(err.to_string().contains("Failed to parse global config"));
}
