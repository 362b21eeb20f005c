//! # Schema Cache Module
//!
//! Indexes JSON Schema documents by their declared `$id` so documents can be
//! validated against each other's identifiers without re-reading files.
//!
//! ## Overview
//!
//! A [`SchemaCache`] is built once per environment by scanning every schema
//! directory. Each file with a recognised extension (yaml/yml, json/jsonc,
//! toml) is parsed; documents that declare a string `$id` are cached under it.
//! Documents without an identifier are skipped: they remain reachable only
//! through a direct path reference.
//!
//! ## Cross References
//!
//! When a document is validated against identifier `S`:
//!
//! 1. If `S` is cached, the cached document becomes the root schema and every
//!    *other* cached schema is registered with the validator as an auxiliary
//!    resource. `S` itself is never registered twice.
//! 2. Otherwise `S` is a reference: a fully qualified URI is used as-is, any
//!    other value is a filesystem path relative to the working directory.
//!
//! See [`validate`] for the validation half.
//!
//! ## Reserved Keys
//!
//! | key | meaning |
//! |-----|---------|
//! | `$id` | identifier a schema is cached under |
//! | `$schema` | in a generated or value document: the schema to validate it against |

mod validate;

pub use validate::{schema_reference, Reference};

use crate::error::{Error, Result};
use crate::format::Format;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Key a schema declares its identifier under.
pub const ID_KEY: &str = "$id";

/// Key a document declares its schema under.
pub const SCHEMA_KEY: &str = "$schema";

/// Per-environment index of schema documents by declared identifier.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    entries: BTreeMap<String, Value>,
    base_dir: PathBuf,
}

impl SchemaCache {
    /// Create an empty cache resolving relative references against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: BTreeMap::new(),
            base_dir: base_dir.into(),
        }
    }

    /// Scan `dirs` recursively and index every schema declaring an `$id`.
    ///
    /// Relative references are resolved against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error (located at the offending file) if a directory cannot
    /// be walked or a schema file cannot be read or parsed.
    pub fn load(dirs: &[PathBuf]) -> Result<Self> {
        let mut cache = Self::new(std::env::current_dir()?);
        for dir in dirs {
            cache.scan(dir)?;
        }
        debug!(schemas = cache.entries.len(), "schema cache built");
        Ok(cache)
    }

    /// Index every recognised schema file below `dir`.
    pub fn scan(&mut self, dir: &Path) -> Result<usize> {
        let mut added = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::from(std::io::Error::from(e)).at(dir))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(format) = Format::from_path(path) else {
                continue;
            };
            let bytes = std::fs::read(path).map_err(|e| Error::from(e).at(path))?;
            let doc = format.parse(&bytes).map_err(|e| e.at(path))?;
            if let Some(id) = self.insert(doc) {
                debug!(schema_id = %id, path = %path.display(), "schema indexed");
                added += 1;
            }
        }
        Ok(added)
    }

    /// Cache `schema` under its `$id`; returns the identifier, or `None` (and
    /// drops the document) when it declares none.
    pub fn insert(&mut self, schema: Value) -> Option<String> {
        let id = schema.get(ID_KEY)?.as_str()?.to_string();
        self.entries.insert(id.clone(), schema);
        Some(id)
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Directory relative references are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Identifiers registered alongside root schema `root`: every cached
    /// identifier except `root` itself.
    pub fn auxiliary_ids<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(move |id| *id != root)
    }
}
