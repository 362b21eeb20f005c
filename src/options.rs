//! Generation options.
//!
//! Every path in [`Options`] is a *path template*: it may reference the
//! environment name (`dist/{{ Env }}`, or the Go-template flavoured
//! `dist/{{.Env}}`), which is substituted before the path is used.

use crate::engine::normalize_source;
use crate::error::Result;
use minijinja::{context, Environment};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Default output path template when no environments are named.
pub const DEFAULT_OUTPUT: &str = "dist";

/// Default output path template when at least one environment is named.
pub const DEFAULT_ENV_OUTPUT: &str = "dist/{{ Env }}";

/// Configuration consumed by the generator and the watch loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Template root directories
    pub templates: Vec<String>,
    /// Output directory template
    pub output: String,
    /// Schema directories
    pub schemas: Vec<String>,
    /// Value files, merged in order (later files win)
    pub values: Vec<String>,
    /// Literal overrides applied before any value file
    pub define: BTreeMap<String, Value>,
    /// Disable JSON Schema validation
    pub loose: bool,
    /// Render and validate but write nothing
    pub dry: bool,
    /// Also write raw renders next to the output with a `~` suffix
    pub dump: bool,
    /// Suppress console output from templates
    pub quiet: bool,
    /// Package descriptor copied to the common output root
    pub package: Option<String>,
}

impl Options {
    /// Output directory for `env`.
    pub fn output_dir(&self, env: &str) -> Result<PathBuf> {
        resolve_path(&self.output, env)
    }

    pub fn template_dirs(&self, env: &str) -> Result<Vec<PathBuf>> {
        resolve_all(&self.templates, env)
    }

    pub fn schema_dirs(&self, env: &str) -> Result<Vec<PathBuf>> {
        resolve_all(&self.schemas, env)
    }

    pub fn value_files(&self, env: &str) -> Result<Vec<PathBuf>> {
        resolve_all(&self.values, env)
    }

    pub fn package_file(&self, env: &str) -> Result<Option<PathBuf>> {
        self.package
            .as_deref()
            .map(|package| resolve_path(package, env))
            .transpose()
    }

    /// Every concrete input path for `env`: templates, schemas, values and the
    /// package descriptor.
    pub fn input_paths(&self, env: &str) -> Result<Vec<PathBuf>> {
        let mut paths = self.template_dirs(env)?;
        paths.extend(self.schema_dirs(env)?);
        paths.extend(self.value_files(env)?);
        paths.extend(self.package_file(env)?);
        Ok(paths)
    }

    /// Longest common directory of every environment's output directory and
    /// the unresolved output template itself.
    ///
    /// Including the template keeps the root above the per-environment
    /// directories even when only one environment is generated.
    pub fn output_root(&self, envs: &[String]) -> Result<PathBuf> {
        let mut dirs = vec![PathBuf::from(&self.output)];
        for env in environments(envs) {
            dirs.push(self.output_dir(&env)?);
        }
        Ok(common_prefix(&dirs))
    }
}

/// The environments a run covers. An empty list means one unnamed environment.
pub fn environments(envs: &[String]) -> Vec<String> {
    if envs.is_empty() {
        vec![String::new()]
    } else {
        envs.to_vec()
    }
}

/// Substitute the environment name into a path template.
///
/// ```
/// use configen::options::resolve_path;
///
/// let dir = resolve_path("dist/{{.Env}}", "dev").unwrap();
/// assert_eq!(dir, std::path::PathBuf::from("dist/dev"));
/// ```
pub fn resolve_path(template: &str, env: &str) -> Result<PathBuf> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(PathBuf::from(template));
    }
    let rendered = Environment::new().render_str(&normalize_source(template), context! { Env => env })?;
    Ok(PathBuf::from(rendered))
}

fn resolve_all(templates: &[String], env: &str) -> Result<Vec<PathBuf>> {
    templates.iter().map(|t| resolve_path(t, env)).collect()
}

/// Longest shared leading run of path components.
pub fn common_prefix(paths: &[PathBuf]) -> PathBuf {
    let Some((first, rest)) = paths.split_first() else {
        return PathBuf::new();
    };
    let mut prefix: Vec<Component<'_>> = first.components().collect();
    for path in rest {
        let shared = prefix
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.iter().collect()
}

/// `true` when `path` has a component starting with `_` (a fragment).
pub fn is_fragment(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('_'),
        _ => false,
    })
}
