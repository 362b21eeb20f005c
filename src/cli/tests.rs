//! Unit tests for command-line parsing

use crate::cli::{Cli, Invocation};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::Path;

fn invoke(args: &[&str], cwd: &Path) -> Invocation {
    let mut argv = vec!["configen"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().into_invocation(cwd)
}

#[test]
fn test_defaults_in_prepared_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("schemas")).unwrap();
    fs::write(dir.path().join("package.json"), "{}").unwrap();
    fs::write(dir.path().join("values.toml"), "").unwrap();
    fs::write(dir.path().join("values.json"), "{}").unwrap();

    let run = invoke(&[], dir.path());

    assert_eq!(run.options.templates, vec!["templates"]);
    assert_eq!(run.options.output, "dist");
    assert_eq!(run.options.schemas, vec!["schemas"]);
    assert_eq!(run.options.values, vec!["values.toml"]);
    assert_eq!(run.options.package.as_deref(), Some("package.json"));
    assert!(run.envs.is_empty());
    assert!(!run.watch);
}

#[test]
fn test_defaults_in_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let run = invoke(&[], dir.path());

    assert_eq!(run.options.templates, vec!["templates"]);
    assert!(run.options.schemas.is_empty());
    assert!(run.options.values.is_empty());
    assert_eq!(run.options.package, None);
}

#[test]
fn test_positional_tags() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("values.yaml"), "").unwrap();

    let run = invoke(&["foo", "+values.json", "@test", "@dev", "replicas=3"], dir.path());

    assert_eq!(run.options.templates, vec!["foo"]);
    assert_eq!(run.options.values, vec!["values.json"]);
    assert_eq!(run.envs, vec!["test", "dev"]);
    assert_eq!(run.options.output, "dist/{{ Env }}");
    assert_eq!(run.options.define.get("replicas"), Some(&json!("3")));
}

#[test]
fn test_flags() {
    let dir = tempfile::tempdir().unwrap();
    let run = invoke(
        &[
            "-t", "in", "-o", "out/{{.Env}}", "-s", "schema-a", "-s", "schema-b", "-f", "base.yaml",
            "--set", "name=svc", "--set", "url=http://x/?a=b", "--loose", "--dry-run", "--dump", "-q",
            "-p", "pkg.json", "-e", "qa", "-w", "--port", "8080",
        ],
        dir.path(),
    );

    assert_eq!(run.options.templates, vec!["in"]);
    assert_eq!(run.options.output, "out/{{.Env}}");
    assert_eq!(run.options.schemas, vec!["schema-a", "schema-b"]);
    assert_eq!(run.options.values, vec!["base.yaml"]);
    assert_eq!(run.options.define.get("name"), Some(&json!("svc")));
    assert_eq!(run.options.define.get("url"), Some(&json!("http://x/?a=b")));
    assert!(run.options.loose && run.options.dry && run.options.dump && run.options.quiet);
    assert_eq!(run.options.package.as_deref(), Some("pkg.json"));
    assert_eq!(run.envs, vec!["qa"]);
    assert!(run.watch);
    assert_eq!(run.port, 8080);
}

#[test]
fn test_invalid_set_is_rejected() {
    assert!(Cli::try_parse_from(["configen", "--set", "novalue"]).is_err());
    assert!(Cli::try_parse_from(["configen", "--set", "=x"]).is_err());
}

#[test]
fn test_version_flag() {
    let err = Cli::try_parse_from(["configen", "--version"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
}
