//! Real process execution through `LocalShell`.
#![cfg(unix)]

use cmtkit::core::CmtError;
use cmtkit::shell::{LocalShell, Shell, ShellCommand};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_runs_in_shell_directory_with_env() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("work")).unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    shell.chdir(Path::new("work")).unwrap();

    let command = ShellCommand::new("sh").args(["-c", "pwd; echo $PKG_NAME"]).env("PKG_NAME", "fftw");
    let output = shell.run(command).await.unwrap().into_success().unwrap();
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(Path::new(lines[0]).file_name().unwrap(), "work");
    assert_eq!(lines[1], "fftw");
}

#[tokio::test]
async fn test_append_to_log() {
    let dir = TempDir::new().unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    for word in ["configure", "make"] {
        let command = ShellCommand::new("sh").arg("-c").arg(format!("echo {word}; echo oops >&2"));
        shell.run(command.append_to("build.log")).await.unwrap();
    }
    let log = std::fs::read_to_string(dir.path().join("build.log")).unwrap();
    assert_eq!(log.matches("oops").count(), 2);
    assert!(log.contains("configure\n"));
    assert!(log.contains("make\n"));
}

#[tokio::test]
async fn test_write_to_fills_dump_file() {
    let dir = TempDir::new().unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    let command = ShellCommand::new("sh")
        .args(["-c", "echo '# use Foo v1 G ()'; echo '#   use Bar v2 T ()'; echo spurious >&2"])
        .write_to("uses.cmt");
    let output = shell.run(command).await.unwrap();
    assert!(output.stdout.is_empty());
    assert_eq!(output.stderr, "spurious\n");

    let dump = std::fs::read_to_string(dir.path().join("uses.cmt")).unwrap();
    assert_eq!(dump, "# use Foo v1 G ()\n#   use Bar v2 T ()\n");
}

#[tokio::test]
async fn test_discarded_output_is_not_captured() {
    let dir = TempDir::new().unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    let command = ShellCommand::new("sh").args(["-c", "echo noisy; echo noisier >&2"]).discard_output();
    let output = shell.run(command).await.unwrap().into_success().unwrap();
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn test_nonzero_status() {
    let dir = TempDir::new().unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    let output = shell.run(ShellCommand::new("sh").args(["-c", "exit 3"])).await.unwrap();
    assert_eq!(output.status, 3);
    let err = output.into_success().unwrap_err();
    assert!(matches!(err.downcast_ref::<CmtError>(), Some(CmtError::CommandFailed { status: 3, .. })));
}

#[tokio::test]
async fn test_timeout() {
    let dir = TempDir::new().unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    let command = ShellCommand::new("sleep").arg("5").with_timeout(Some(Duration::from_millis(100)));
    let err = shell.run(command).await.unwrap_err();
    assert!(err.chain().any(|e| matches!(e.downcast_ref::<CmtError>(), Some(CmtError::CommandTimedOut { .. }))));
}

#[tokio::test]
async fn test_makedirs_and_remove() {
    let dir = TempDir::new().unwrap();
    let shell = LocalShell::with_cwd(dir.path());
    shell.makedirs(Path::new("a/b/c")).unwrap();
    shell.makedirs(Path::new("a/b/c")).unwrap();
    assert!(dir.path().join("a/b/c").is_dir());

    std::fs::write(dir.path().join("a/file"), "x").unwrap();
    assert!(shell.makedirs(Path::new("a/file")).is_err());

    shell.remove(Path::new("a")).unwrap();
    shell.remove(Path::new("a")).unwrap();
    assert!(!dir.path().join("a").exists());
}
