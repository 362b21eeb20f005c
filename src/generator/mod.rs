//! # Generator Module
//!
//! Renders every template root into an output directory, once per environment.
//!
//! ## Overview
//!
//! For each environment the generator builds, strictly in order:
//!
//! 1. the [`SchemaCache`] from the schema directories
//! 2. the [`Context`] (overrides, then value files, validated eagerly)
//! 3. the shared [`TemplateRoot`] holding every fragment
//!
//! and then runs each target file through the [`Pipeline`]:
//!
//! ```text
//! render → dump (optional) → transform → validate → deferred blocks → write
//! ```
//!
//! The first failure aborts the environment (and the run). Errors carry the
//! absolute path of the offending file.
//!
//! ## Output Layout
//!
//! The output directory mirrors each template root. Fragments (any path
//! segment starting with `_`) are never written. Extensions follow the
//! resolved output format, so `app.jsonc` becomes `app.json` and a document
//! declaring `$format: toml` becomes `<name>.toml`.
//!
//! ```text
//! templates/                     dist/dev/
//! ├── _helpers/labels.yaml       ├── index.html     (placeholder)
//! ├── app.yaml          ──────►  ├── app.yaml
//! └── web/site.jsonc             └── web/
//!                                    ├── index.html (placeholder)
//!                                    └── site.json
//! ```
//!
//! Every directory the generator creates is seeded with a placeholder
//! `index.html` so the preview server can list it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use configen::engine::Console;
//! use configen::generator::generate;
//! use configen::options::Options;
//!
//! let options = Options {
//!     templates: vec!["templates".into()],
//!     output: "dist/{{ Env }}".into(),
//!     values: vec!["values.yaml".into()],
//!     ..Options::default()
//! };
//! let written = generate(&options, &["dev".into(), "prod".into()], &Console::Stdout)?;
//! ```

mod discover;
mod pipeline;
mod write;

pub use discover::{discover, Discovery, Target};
pub use pipeline::{transform, Pipeline, Transformed, DUMP_SUFFIX, FORMAT_KEY};
pub use write::{prepare_dir, seed_index, write_output, INDEX_FILE};

use crate::context::Context;
use crate::engine::{Console, TemplateRoot};
use crate::error::{Error, Result};
use crate::options::{environments, Options};
use crate::schema::SchemaCache;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Generate every environment in `envs` (an empty list is one unnamed
/// environment), then copy the package descriptor unless dry-run.
///
/// Returns every destination path, in generation order.
///
/// # Errors
///
/// The first failure in any environment.
pub fn generate(options: &Options, envs: &[String], console: &Console) -> Result<Vec<PathBuf>> {
    let console = if options.quiet {
        Console::Quiet
    } else {
        console.clone()
    };

    let mut generated = Vec::new();
    for env in environments(envs) {
        generated.extend(generate_env(options, &env, &console)?);
    }

    if !options.dry {
        if let Some(path) = copy_package(options, envs)? {
            info!(path = %path.display(), "package descriptor copied");
        }
    }
    Ok(generated)
}

/// Generate a single environment.
pub fn generate_env(options: &Options, env: &str, console: &Console) -> Result<Vec<PathBuf>> {
    let schemas = Arc::new(SchemaCache::load(&options.schema_dirs(env)?)?);
    let context = Context::build(options, env, &schemas)?;
    let discovery = discover(&options.template_dirs(env)?)?;

    let fragments: Vec<(String, PathBuf)> = discovery
        .fragments
        .iter()
        .map(|fragment| (fragment.name(), fragment.path()))
        .collect();
    let root = TemplateRoot::build(
        &context,
        Arc::clone(&schemas),
        fragments.iter().map(|(name, path)| (name.clone(), path.as_path())),
    )?;

    let output_dir = options.output_dir(env)?;
    debug!(
        env = %env,
        output = %output_dir.display(),
        schemas = schemas.len(),
        fragments = fragments.len(),
        targets = discovery.targets.len(),
        "environment prepared"
    );

    let pipeline = Pipeline {
        root: &root,
        schemas: &schemas,
        options,
        output_dir: &output_dir,
        console,
    };
    discovery
        .targets
        .iter()
        .map(|target| pipeline.run(target))
        .collect()
}

/// Copy the package descriptor verbatim into the common output root.
fn copy_package(options: &Options, envs: &[String]) -> Result<Option<PathBuf>> {
    let Some(package) = options.package_file("")? else {
        return Ok(None);
    };
    let file_name = package.file_name().ok_or_else(|| {
        Error::InvalidArgument(format!("package descriptor {} is not a file", package.display()))
    })?;
    let root = options.output_root(envs)?;
    let bytes = std::fs::read(&package).map_err(|e| Error::from(e).at(&package))?;
    let destination = root.join(file_name);
    write_output(&destination, &bytes)?;
    Ok(Some(destination))
}
