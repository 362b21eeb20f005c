//! # Context Module
//!
//! Builds the per-environment template context.
//!
//! ## Layout
//!
//! | key | value |
//! |-----|-------|
//! | `Values` | overrides and value files, deep-merged |
//! | `Files` | read access: `Files.Get(path)` (text), `Files.GetBytes(path)` (bytes) |
//! | `Env` | environment name (empty for the unnamed environment) |
//! | `Document` | validated output, present only while deferred blocks render |
//!
//! ## Merge Order
//!
//! Overrides seed the accumulator, then each value file is deep-merged in the
//! order given. When both sides hold a mapping at the same key they merge
//! recursively; otherwise the incoming value replaces the existing one, so
//! later files win.
//!
//! ## Eager Validation
//!
//! A value file that declares `$schema` is validated as soon as it is parsed,
//! so a broken environment fails before any template renders. `Loose` skips
//! this check.

mod files;

pub use files::Files;

use crate::error::Result;
use crate::format::Format;
use crate::options::Options;
use crate::schema::SchemaCache;
use minijinja::context;
use minijinja::value::{merge_maps, Value};
use serde_json::Map;
use std::path::Path;
use tracing::debug;

/// Merged configuration for one environment.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Map<String, serde_json::Value>,
    env: String,
}

impl Context {
    pub fn new(env: impl Into<String>, values: Map<String, serde_json::Value>) -> Self {
        Self {
            values,
            env: env.into(),
        }
    }

    /// Assemble the context for `env` from `options`.
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedFormat`] for a value file with an unknown extension
    /// * read and parse failures, located at the value file
    /// * [`Error::Validation`] when a value file fails its declared schema
    pub fn build(options: &Options, env: &str, schemas: &SchemaCache) -> Result<Self> {
        let mut values: Map<String, serde_json::Value> = options
            .define
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for file in options.value_files(env)? {
            let layer = load_values(&file, schemas, options.loose).map_err(|e| e.at(&file))?;
            debug!(path = %file.display(), keys = layer.len(), "merging value file");
            deep_merge(&mut values, layer);
        }

        Ok(Self::new(env, values))
    }

    pub fn values(&self) -> &Map<String, serde_json::Value> {
        &self.values
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// The template-facing context.
    pub fn to_value(&self) -> Value {
        context! {
            Values => Value::from_serialize(&self.values),
            Files => Value::from_object(Files),
            Env => self.env.as_str(),
        }
    }

    /// The template-facing context plus `Document`.
    pub fn with_document(base: &Value, document: &serde_json::Value) -> Value {
        merge_maps([
            base.clone(),
            context! { Document => Value::from_serialize(document) },
        ])
    }
}

fn load_values(
    path: &Path,
    schemas: &SchemaCache,
    loose: bool,
) -> Result<Map<String, serde_json::Value>> {
    let format = Format::require(path)?;
    let document = format.parse(&std::fs::read(path)?)?;
    if !loose {
        schemas.validate_declared(&document)?;
    }
    format.into_mapping(document)
}

/// Merge `incoming` into `base`: mappings merge recursively, anything else
/// is replaced.
pub fn deep_merge(base: &mut Map<String, serde_json::Value>, incoming: Map<String, serde_json::Value>) {
    for (key, value) in incoming {
        match (base.get_mut(&key), value) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(next)) => {
                deep_merge(existing, next);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
