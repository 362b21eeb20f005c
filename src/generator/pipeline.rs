use super::discover::Target;
use super::write::write_output;
use crate::engine::{deferred, normalize_source, Console, RenderSession, TemplateRoot};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::options::Options;
use crate::schema::SchemaCache;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix of raw render dumps.
pub const DUMP_SUFFIX: &str = "~";

/// Document key selecting a different output format.
pub const FORMAT_KEY: &str = "$format";

/// Rendered text after format normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub text: String,
    /// Resolved output format; `None` for unstructured output
    pub format: Option<Format>,
    /// Parsed document for structured output
    pub document: Option<serde_json::Value>,
}

/// Normalise rendered `text` according to the format of `path`.
///
/// JSON with comments is re-emitted as plain JSON. A structured document that
/// declares `$format` loses the key and is re-serialized in that format.
/// Unstructured output passes through untouched.
pub fn transform(path: &Path, text: String) -> Result<Transformed> {
    let Some(format) = Format::from_path(path) else {
        return Ok(Transformed {
            text,
            format: None,
            document: None,
        });
    };

    let mut document = format.parse(text.as_bytes())?;
    let requested = match document.as_object_mut() {
        Some(map) => map.shift_remove(FORMAT_KEY),
        None => None,
    };

    let (resolved, text) = match requested {
        Some(requested) => {
            let name = requested.as_str().unwrap_or_default();
            let resolved = Format::from_extension(name)
                .ok_or_else(|| Error::UnsupportedFormat(name.to_string()))?
                .emitted();
            (resolved, resolved.serialize(&document)?)
        }
        None if format == Format::Jsonc => (Format::Json, Format::Json.serialize(&document)?),
        None => (format, text),
    };

    Ok(Transformed {
        text,
        format: Some(resolved),
        document: Some(document),
    })
}

fn with_format(path: &Path, format: Option<Format>) -> PathBuf {
    match format {
        Some(format) => path.with_extension(format.name()),
        None => path.to_path_buf(),
    }
}

fn dump_path(path: &Path) -> PathBuf {
    let mut dump = path.as_os_str().to_owned();
    dump.push(DUMP_SUFFIX);
    PathBuf::from(dump)
}

/// Everything one file's pipeline needs from its environment.
pub struct Pipeline<'a> {
    pub root: &'a TemplateRoot,
    pub schemas: &'a SchemaCache,
    pub options: &'a Options,
    pub output_dir: &'a Path,
    pub console: &'a Console,
}

impl Pipeline<'_> {
    /// Run render → dump → transform → validate → deferred → write for
    /// `target`. Returns the destination path, written unless dry-run.
    ///
    /// # Errors
    ///
    /// Any step's failure, located at the template file (or at its dump once
    /// rendering has succeeded and dumps are enabled).
    pub fn run(&self, target: &Target) -> Result<PathBuf> {
        let source_path = target.path();
        let name = target.name();
        let source = std::fs::read_to_string(&source_path).map_err(|e| Error::from(e).at(&source_path))?;

        let mut env = self.root.fork();
        let session = RenderSession::bind(&mut env, self.root.context(), self.console.clone());
        env.add_template_owned(name.clone(), normalize_source(&source).into_owned())
            .map_err(|e| Error::from(e).at(&source_path))?;
        let template = env.get_template(&name).map_err(|e| Error::from(e).at(&source_path))?;
        let (rendered, state) = template
            .render_and_return_state(self.root.context())
            .map_err(|e| Error::from(e).at(&source_path))?;
        debug!(template = %name, bytes = rendered.len(), "rendered");

        let destination = self.output_dir.join(&target.relative);
        let report_path = if self.options.dump {
            let dump = dump_path(&destination);
            if !self.options.dry {
                write_output(&dump, rendered.as_bytes())?;
                debug!(path = %dump.display(), "raw render dumped");
            }
            dump
        } else {
            source_path
        };

        let output = transform(&destination, rendered).map_err(|e| e.at(&report_path))?;
        let destination = with_format(&destination, output.format);

        if let Some(document) = &output.document {
            if !self.options.loose {
                if let Some(schema) = self
                    .schemas
                    .validate_declared(document)
                    .map_err(|e| e.at(&report_path))?
                {
                    debug!(template = %name, schema = %schema, "validated");
                }
            }
        }

        let blocks = session.take_deferred();
        if !blocks.is_empty() {
            let document = output.document.clone().unwrap_or_default();
            let count = deferred::replay(&state, &blocks, self.root.context(), &document, self.console)
                .map_err(|e| e.at(&report_path))?;
            debug!(template = %name, blocks = count, "deferred blocks rendered");
        }

        if self.options.dry {
            debug!(path = %destination.display(), "dry run, not written");
        } else {
            write_output(&destination, output.text.as_bytes())?;
            info!(path = %destination.display(), "generated");
        }
        Ok(destination)
    }
}
