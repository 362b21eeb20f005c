#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::project::{service, Project};
use std::path::Path;
use std::process::{Command, Output};

fn configen(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_configen"))
        .current_dir(dir)
        .env("CONFIGEN_LOG_LEVEL", "warn")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run configen")
}

#[test]
fn test_cli_generates_named_environments() {
    let project = service();
    let out = configen(project.root(), &["@dev", "@prod"]);

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(project.read("dist/dev/service.yaml").contains("name: api-dev"));
    assert!(project.read("dist/prod/service.yaml").contains("name: api-prod"));
}

#[test]
fn test_cli_without_environments_writes_to_dist() {
    let project = service();
    let out = configen(project.root(), &["--set", "name=cli"]);

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    // value files override --set
    assert!(project.read("dist/service.yaml").contains("name: api-\n"));
}

#[test]
fn test_cli_reports_validation_failure() {
    let project = service();
    project.file("values.yaml", "name: api\nport: 0\n");

    let out = configen(project.root(), &["@dev"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Error:"), "{stderr}");
    assert!(stderr.contains("service.yaml"), "{stderr}");
    assert!(stderr.contains("/port"), "{stderr}");
    assert!(!project.exists("dist/dev/service.yaml"));
}

#[test]
fn test_cli_loose_skips_validation() {
    let project = service();
    project.file("values.yaml", "name: api\nport: 0\n");

    let out = configen(project.root(), &["--loose", "@dev"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(project.read("dist/dev/service.yaml").contains("port: 0"));
}

#[test]
fn test_cli_dry_run_writes_nothing() {
    let project = service();
    let out = configen(project.root(), &["--dry-run", "--dump", "@dev"]);

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(!project.exists("dist"));
}

#[test]
fn test_cli_template_console_goes_to_stdout() {
    let project = Project::new();
    project.file("templates/notes.txt", "{{ outln('hello', Env) }}body\n");

    let out = configen(project.root(), &["@dev"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hello dev\n");
    assert_eq!(project.read("dist/dev/notes.txt"), "body\n");

    let quiet = configen(project.root(), &["-q", "@dev"]);
    assert!(quiet.status.success());
    assert!(quiet.stdout.is_empty());
}

#[test]
fn test_cli_dir_changes_working_directory() {
    let project = service();
    let elsewhere = tempfile::tempdir().unwrap();
    let dir = project.arg("");

    let out = configen(elsewhere.path(), &["--dir", &dir, "@qa"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(project.exists("dist/qa/service.yaml"));
    assert!(!elsewhere.path().join("dist").exists());
}

#[test]
fn test_cli_version() {
    let out = configen(Path::new("."), &["--version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("configen "));
}
