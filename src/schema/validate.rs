use super::{SchemaCache, ID_KEY, SCHEMA_KEY};
use crate::error::{Error, Result, Violation};
use crate::format::Format;
use jsonschema::{Resource, Validator};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, error};
use url::Url;

/// How a schema identifier was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Found in the cache under this identifier
    Cached(String),
    /// Filesystem path (already joined with the base directory)
    Path(PathBuf),
    /// Fully qualified URI, handed to the validator untouched
    Uri(String),
}

/// The schema a document declares under `$schema`, if any.
///
/// Only mappings with a string `$schema` qualify; everything else is never
/// validated.
pub fn schema_reference(document: &Value) -> Option<&str> {
    document.as_object()?.get(SCHEMA_KEY)?.as_str()
}

fn is_uri(reference: &str) -> bool {
    // single letter schemes are drive letters
    Url::parse(reference).is_ok_and(|url| url.scheme().len() > 1)
}

impl SchemaCache {
    /// Resolve `id`: cache first, then URI, then path relative to the base
    /// directory.
    pub fn reference(&self, id: &str) -> Reference {
        if self.contains(id) {
            Reference::Cached(id.to_string())
        } else if is_uri(id) {
            Reference::Uri(id.to_string())
        } else {
            Reference::Path(self.base_dir().join(id))
        }
    }

    /// Validate `document` against the schema identified by `id`.
    ///
    /// # Errors
    ///
    /// * [`Error::Schema`] if the schema cannot be loaded or compiled
    /// * [`Error::Validation`] listing every violation when the document does
    ///   not conform
    pub fn validate(&self, id: &str, document: &Value) -> Result<()> {
        let validator = self.compile(id)?;
        let violations: Vec<Violation> = validator
            .iter_errors(document)
            .map(|err| Violation {
                instance_path: err.instance_path().to_string(),
                message: err.to_string(),
            })
            .collect();

        if violations.is_empty() {
            debug!(schema = %id, "document is valid");
            return Ok(());
        }
        for violation in &violations {
            error!(schema = %id, path = %violation.instance_path, "{}", violation.message);
        }
        Err(Error::Validation {
            schema: id.to_string(),
            violations,
        })
    }

    /// Validate `document` against the schema it declares, if it declares one.
    ///
    /// Returns the schema identifier that was checked.
    pub fn validate_declared(&self, document: &Value) -> Result<Option<String>> {
        match schema_reference(document) {
            Some(id) => self.validate(id, document).map(|()| Some(id.to_string())),
            None => Ok(None),
        }
    }

    fn compile(&self, id: &str) -> Result<Validator> {
        let mut options = jsonschema::options();
        let (root, root_id) = match self.reference(id) {
            Reference::Cached(id) => {
                let root = self.get(&id).cloned().unwrap_or(Value::Null);
                (root, Some(id))
            }
            Reference::Uri(uri) => (json!({ "$ref": uri }), None),
            Reference::Path(path) => {
                let root = load_schema_file(&path)?;
                if let Ok(url) = Url::from_file_path(&path) {
                    options = options.with_base_uri(url.to_string());
                }
                let root_id = root.get(ID_KEY).and_then(Value::as_str).map(str::to_string);
                (root, root_id)
            }
        };

        let exclude = root_id.as_deref().unwrap_or_default();
        for aux in self.auxiliary_ids(exclude) {
            if let Some(schema) = self.get(aux) {
                options = options.with_resource(aux, Resource::from_contents(schema.clone()));
            }
        }

        options
            .build(&root)
            .map_err(|e| Error::Schema(format!("{id:?} could not be compiled: {e}")))
    }
}

fn load_schema_file(path: &std::path::Path) -> Result<Value> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::Schema(format!("{} could not be read: {e}", path.display())))?;
    let format = Format::from_path(path).unwrap_or(Format::Json);
    format.parse(&bytes).map_err(|e| e.at(path))
}
