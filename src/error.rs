//! # Error Module
//!
//! One error type for the whole generation pipeline.
//!
//! ## Taxonomy
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`Error::UnsupportedFormat`] | a value/schema file has an extension no codec handles |
//! | [`Error::MissingValue`] | `required(...)` received an absent value or an empty string |
//! | [`Error::Assertion`] | `assert(...)` received a falsy value |
//! | [`Error::InvalidArgument`] | a query function received a non-string query |
//! | [`Error::Validation`] | a document failed JSON Schema validation |
//!
//! The remaining variants carry failures from the codecs, the template engine,
//! the filesystem and the change-notification backend.
//!
//! ## Location
//!
//! The orchestration wraps every failure in [`Error::Located`] with the
//! absolute path of the offending file and, when one can be recovered from the
//! underlying engine/codec error, a line number. [`Error::root`] peels those
//! wrappers (and the template engine's wrapper around errors raised by
//! template functions) so callers can match on the taxonomy kind.

use std::fmt;
use std::path::{Path, PathBuf};

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single JSON Schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer into the validated document
    pub instance_path: String,
    /// Human readable description
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Errors produced while building contexts, rendering, validating and writing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    MissingValue(String),

    #[error("{0}")]
    Assertion(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{language} query {query:?} failed: {message}")]
    Query {
        language: &'static str,
        query: String,
        message: String,
    },

    #[error("document does not match schema {schema:?}: {}", join_violations(.violations))]
    Validation {
        schema: String,
        violations: Vec<Violation>,
    },

    #[error("schema {0}")]
    Schema(String),

    #[error("{format} parse error: {message}")]
    Parse {
        format: &'static str,
        message: String,
        line: Option<usize>,
    },

    #[error(transparent)]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("watch: {0}")]
    Watch(#[from] notify::Error),

    #[error("{}: {source}", location(.path, .line))]
    Located {
        path: PathBuf,
        line: Option<usize>,
        #[source]
        source: Box<Error>,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn location(path: &Path, line: &Option<usize>) -> String {
    match line {
        Some(line) => format!("{}:{line}", path.display()),
        None => path.display().to_string(),
    }
}

impl Error {
    /// Wrap this error with the absolute path of the file it concerns.
    ///
    /// Already located errors are returned untouched so the innermost (most
    /// precise) location wins.
    pub fn at(self, path: impl AsRef<Path>) -> Self {
        if matches!(self, Error::Located { .. }) {
            return self;
        }
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let line = self.line();
        Error::Located {
            path,
            line,
            source: Box::new(self),
        }
    }

    /// Best-effort line number carried by the underlying engine/codec error.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Template(err) => err.line(),
            Error::Parse { line, .. } => *line,
            Error::Located { line, .. } => *line,
            _ => None,
        }
    }

    /// The path recorded by [`Error::at`], if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Located { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The innermost crate error: strips location wrappers and digs through
    /// template engine errors raised by template functions.
    pub fn root(&self) -> &Error {
        match self {
            Error::Located { source, .. } => source.root(),
            Error::Template(err) => {
                let mut current: Option<&(dyn std::error::Error + 'static)> =
                    std::error::Error::source(err);
                while let Some(inner) = current {
                    if let Some(found) = inner.downcast_ref::<Error>() {
                        return found.root();
                    }
                    current = inner.source();
                }
                self
            }
            _ => self,
        }
    }

    /// Convert into a template engine error so it can be raised from a
    /// template function while keeping the original as its source.
    pub fn into_template_error(self) -> minijinja::Error {
        match self {
            Error::Template(err) => err,
            other => {
                minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, other.to_string())
                    .with_source(other)
            }
        }
    }
}

/// Shorthand for raising crate errors from template functions.
pub(crate) fn raise<T>(err: Error) -> Result<T, minijinja::Error> {
    Err(err.into_template_error())
}
