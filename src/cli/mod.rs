//! # CLI Module
//!
//! Command-line front end of the `configen` binary.
//!
//! ## Overview
//!
//! One invocation generates every environment once and, with `--watch`, then
//! keeps regenerating while serving the output for preview.
//!
//! ```bash
//! # templates/ + values.yaml → dist/
//! configen
//!
//! # two environments → dist/dev and dist/prod, with an extra values file
//! configen @dev @prod +values-{{.Env}}.yaml
//!
//! # override a value, validate only
//! configen --set image=nginx:1.27 --dry-run
//!
//! # regenerate on change, preview on http://127.0.0.1:8080
//! configen @dev --watch --port 8080
//! ```
//!
//! ## Positional Shortcuts
//!
//! | argument | meaning |
//! |----------|---------|
//! | `@name` | add environment `name` |
//! | `+file` | add a values file |
//! | `name=value` | set a value |
//! | anything else | add a template directory |
//!
//! ## Defaults
//!
//! Applied after `--dir` changed the working directory, only where nothing
//! was given:
//!
//! - templates: `templates`
//! - schemas: `schemas`, if that directory exists
//! - package: `package.json`, if that file exists
//! - output: `dist`, or `dist/{{ Env }}` when environments are named
//! - values: the first existing of `values.yaml`, `values.yml`,
//!   `values.toml`, `values.json`
//!
//! Every flag except `--set` and `--dir` can also come from a `CONFIGEN_*`
//! environment variable (see `--help`).

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, Cli, Invocation, DEFAULT_VALUE_FILES};
