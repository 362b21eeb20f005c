//! Structured data formats recognised by extension.
//!
//! Value files, schema documents and rendered output all go through the same
//! adapters. Every format parses into [`serde_json::Value`] so merging,
//! validation and queries work on one representation.

use crate::error::{Error, Result};
use serde_json::Value;
use std::path::Path;

/// A structured data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Yaml,
    Json,
    /// JSON with comments; always emitted as plain [`Format::Json`]
    Jsonc,
    Toml,
}

impl Format {
    /// Map a file extension (without the dot, case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "jsonc" => Some(Format::Jsonc),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Format of a path, judged by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Like [`Format::from_path`] but unrecognised extensions are an error.
    pub fn require(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            Error::UnsupportedFormat(ext)
        })
    }

    /// Canonical name, also used as the output extension.
    pub fn name(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Jsonc => "jsonc",
            Format::Toml => "toml",
        }
    }

    /// The format actually written for this one.
    pub fn emitted(self) -> Self {
        match self {
            Format::Jsonc => Format::Json,
            other => other,
        }
    }

    /// Parse raw bytes. An empty YAML document parses to `null`.
    pub fn parse(self, bytes: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::Parse {
            format: self.name(),
            message: e.to_string(),
            line: None,
        })?;
        match self {
            Format::Yaml if text.trim().is_empty() => Ok(Value::Null),
            Format::Yaml => serde_yaml::from_str(text).map_err(|e| Error::Parse {
                format: "yaml",
                line: e.location().map(|loc| loc.line()),
                message: e.to_string(),
            }),
            Format::Json | Format::Jsonc => parse_json5(self.name(), text),
            Format::Toml => toml::from_str(text).map_err(|e| Error::Parse {
                format: "toml",
                line: e.span().map(|span| line_of(text, span.start)),
                message: e.message().to_string(),
            }),
        }
    }

    /// Parse a document whose top level must be a mapping. An empty document
    /// counts as an empty mapping.
    pub fn parse_mapping(self, bytes: &[u8]) -> Result<serde_json::Map<String, Value>> {
        self.into_mapping(self.parse(bytes)?)
    }

    /// Unwrap a parsed document into its top-level mapping.
    pub fn into_mapping(self, document: Value) -> Result<serde_json::Map<String, Value>> {
        match document {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(serde_json::Map::new()),
            other => Err(Error::Parse {
                format: self.name(),
                message: format!("expected a mapping at the top level, found {}", kind(&other)),
                line: None,
            }),
        }
    }

    /// Serialize a value. YAML uses two-space indentation and JSON is pretty
    /// printed with two spaces; both end with a newline.
    pub fn serialize(self, value: &Value) -> Result<String> {
        let text = match self {
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| Error::Parse {
                format: "yaml",
                message: e.to_string(),
                line: None,
            })?,
            Format::Json | Format::Jsonc => {
                let mut text = serde_json::to_string_pretty(value).map_err(|e| Error::Parse {
                    format: "json",
                    message: e.to_string(),
                    line: None,
                })?;
                text.push('\n');
                text
            }
            Format::Toml => toml::to_string(value).map_err(|e| Error::Parse {
                format: "toml",
                message: e.to_string(),
                line: None,
            })?,
        };
        Ok(text)
    }
}

// Both JSON flavours tolerate comments and trailing commas on input.
fn parse_json5(format: &'static str, text: &str) -> Result<Value> {
    json5::from_str(text).map_err(|e| {
        let line = match &e {
            json5::Error::Message { location, .. } => location.as_ref().map(|loc| loc.line),
        };
        Error::Parse {
            format,
            message: e.to_string(),
            line,
        }
    })
}

fn line_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
