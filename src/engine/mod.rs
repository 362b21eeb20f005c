//! # Template Engine Module
//!
//! Wraps a [`minijinja`] environment with the configen function library.
//!
//! ## Template Sets
//!
//! A [`TemplateRoot`] is built once per environment. It holds:
//!
//! - every *fragment* (a template file whose relative path has a segment
//!   starting with `_`), registered under its forward-slash relative path,
//!   e.g. `_helpers/labels.yaml`
//! - the context-free function library ([`functions`], [`query`], the
//!   `minijinja-contrib` filters) and the inline `validate` check
//!
//! Output is never auto-escaped, so `{{ x }}` in a `.json` or `.yaml`
//! template interpolates the raw value. Use `tojson` or `quote` to quote.
//!
//! Each target file renders in a fork of the root (a clone of the
//! environment), into which a [`RenderSession`] binds the file-scoped
//! functions (`defer`, `out`, `outln`, `outf`, `include`, `tpl`). Forking
//! never touches the root, so nothing leaks between files.
//!
//! ## Syntax
//!
//! Templates use Jinja syntax. Go-template style root references such as
//! `{{ .Values.name }}` or `{{- .Env }}` are accepted and rewritten to
//! `{{ Values.name }}` / `{{- Env }}` before parsing (see
//! [`normalize_source`]).
//!
//! ## Functions
//!
//! | function | purpose |
//! |----------|---------|
//! | `toYaml`, `toToml`, `toJson` | serialize a value (also filters for YAML/TOML) |
//! | `fromYaml`, `fromYamlArray`, `fromToml`, `fromJson` | parse text |
//! | `equal(a, b)` | deep equality |
//! | `quote`, `squote`, `nindent`, `trimPrefix`, `trimSuffix` | string helpers (filters) |
//! | `b64enc`, `b64dec`, `sha256sum` | encodings and digests (filters) |
//! | `coalesce(...)` | first non-empty argument |
//! | `required(msg, v)` | `v`, or fail with `msg` when missing or empty |
//! | `assert(msg, v)` | fail with `msg` unless `v` is truthy |
//! | `jq`, `jp`, `jptr`, `expr` | queries, see [`query`] |
//! | `uritpl(tpl, vars)` | RFC 6570 URI template expansion |
//! | `qsParse(s)`, `qsJoin(map)` | query string decoding/encoding |
//! | `validate(schema, doc)` | `true` if valid; logs and returns `false` otherwise |
//! | `include(name, data)` | render a fragment with explicit data |
//! | `tpl(source, data)` | render a string as a template over the context |
//! | `out`, `outln`, `outf` | write to the console |
//! | `defer(name)` | run block `name` after validation, see [`deferred`] |

pub mod deferred;
pub mod functions;
pub mod query;
mod session;

pub use session::RenderSession;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::schema::SchemaCache;
use minijinja::value::{Value, ValueKind};
use minijinja::{escape_formatter, AutoEscape, Environment, ErrorKind, Output, State};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[allow(clippy::expect_used)]
static DOT_ROOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(-?)(\s*)\.([A-Za-z_])").expect("root reference regex should be valid")
});

/// Rewrite Go-template style root references (`{{ .Name`) to Jinja ones
/// (`{{ Name`).
pub fn normalize_source(source: &str) -> Cow<'_, str> {
    DOT_ROOT.replace_all(source, "{{$1$2$3")
}

/// Apply the engine settings every configen environment shares: output is
/// never auto-escaped whatever the template extension, booleans print as
/// `true`/`false`, trailing newlines are kept, and the context-free function
/// library is registered.
pub fn configure(env: &mut Environment<'static>) {
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_formatter(format_value);
    minijinja_contrib::add_to_environment(env);
    env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
    functions::register(env);
    query::register(env);
}

fn format_value(out: &mut Output<'_>, state: &State<'_, '_>, value: &Value) -> std::result::Result<(), minijinja::Error> {
    if value.kind() == ValueKind::Bool {
        out.write_str(functions::scalar(value).as_str())
            .map_err(|_| minijinja::Error::from(ErrorKind::WriteFailure))
    } else {
        escape_formatter(out, state, value)
    }
}

/// Where template console output (`out*` functions, deferred blocks) goes.
#[derive(Debug, Clone, Default)]
pub enum Console {
    /// Standard output
    #[default]
    Stdout,
    /// Discard everything
    Quiet,
    /// Collect into a shared buffer
    Capture(Arc<Mutex<String>>),
}

impl Console {
    pub fn capture() -> Self {
        Console::Capture(Arc::new(Mutex::new(String::new())))
    }

    pub fn write(&self, text: &str) -> std::io::Result<()> {
        match self {
            Console::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()
            }
            Console::Quiet => Ok(()),
            Console::Capture(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_str(text);
                Ok(())
            }
        }
    }

    /// Everything captured so far (empty unless [`Console::Capture`]).
    pub fn captured(&self) -> String {
        match self {
            Console::Capture(buffer) => buffer.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            _ => String::new(),
        }
    }
}

/// The shared, read-only template set of one environment.
#[derive(Debug, Clone)]
pub struct TemplateRoot {
    env: Environment<'static>,
    context: Value,
}

impl TemplateRoot {
    /// Build the root from the generation context and the fragment files.
    ///
    /// `fragments` pairs each template name with the file it is read from.
    ///
    /// # Errors
    ///
    /// Read and syntax errors, located at the fragment file.
    pub fn build<'a, I>(context: &Context, schemas: Arc<SchemaCache>, fragments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, &'a Path)>,
    {
        let mut env = Environment::new();
        configure(&mut env);
        register_validate(&mut env, schemas);

        for (name, path) in fragments {
            let source = std::fs::read_to_string(path).map_err(|e| Error::from(e).at(path))?;
            env.add_template_owned(name.clone(), normalize_source(&source).into_owned())
                .map_err(|e| Error::from(e).at(path))?;
            debug!(fragment = %name, "fragment registered");
        }

        Ok(Self {
            env,
            context: context.to_value(),
        })
    }

    /// A file-local copy of the template set.
    pub fn fork(&self) -> Environment<'static> {
        self.env.clone()
    }

    /// The generation context every file renders against.
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Names of the registered fragments.
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.env.templates().map(|(name, _)| name)
    }
}

fn register_validate(env: &mut Environment<'static>, schemas: Arc<SchemaCache>) {
    env.add_function(
        "validate",
        move |schema: String, document: Value| -> std::result::Result<bool, minijinja::Error> {
            let doc = functions::to_document(&document)?;
            match schemas.validate(&schema, &doc) {
                Ok(()) => Ok(true),
                Err(err) => {
                    warn!(schema = %schema, error = %err, "inline validation failed");
                    Ok(false)
                }
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_dot_roots() {
        assert_eq!(normalize_source("name: {{.Values.name}}"), "name: {{Values.name}}");
        assert_eq!(normalize_source("{{ .Env }}"), "{{ Env }}");
        assert_eq!(normalize_source("{{- .Env -}}"), "{{- Env -}}");
        assert_eq!(normalize_source("{{ Values.a }} {{ 1.5 }}"), "{{ Values.a }} {{ 1.5 }}");
    }

    #[test]
    fn test_console_capture_and_quiet() {
        let console = Console::capture();
        console.write("a").unwrap();
        console.clone().write("b").unwrap();
        assert_eq!(console.captured(), "ab");
        Console::Quiet.write("ignored").unwrap();
        assert_eq!(Console::Quiet.captured(), "");
    }

    fn root_with(fragments: &[(&str, &str)]) -> (tempfile::TempDir, TemplateRoot) {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for (name, body) in fragments {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, body).unwrap();
            files.push((name.to_string(), path));
        }
        let mut schemas = SchemaCache::default();
        schemas.insert(json!({ "$id": "port", "type": "integer" }));
        let ctx = Context::new("dev", serde_json::Map::new());
        let root = TemplateRoot::build(
            &ctx,
            Arc::new(schemas),
            files.iter().map(|(name, path)| (name.clone(), path.as_path())),
        )
        .unwrap();
        (dir, root)
    }

    #[test]
    fn test_fragments_registered_by_relative_name() {
        let (_dir, root) = root_with(&[("_helpers/name.txt", "svc-{{ .Env }}")]);
        assert_eq!(root.fragments().collect::<Vec<_>>(), vec!["_helpers/name.txt"]);
        let env = root.fork();
        let out = env
            .render_str("{% include '_helpers/name.txt' %}", root.context())
            .unwrap();
        assert_eq!(out, "svc-dev");
    }

    #[test]
    fn test_fork_does_not_touch_root() {
        let (_dir, root) = root_with(&[]);
        let mut fork = root.fork();
        fork.add_template("target.yaml", "x").unwrap();
        assert!(fork.get_template("target.yaml").is_ok());
        assert!(root.fork().get_template("target.yaml").is_err());
    }

    #[test]
    fn test_structured_templates_are_not_escaped() {
        let (_dir, root) = root_with(&[("_name.yaml", "{{ name }}-{{ Env }}")]);
        let mut env = root.fork();
        env.add_template("app.json", "{\"name\": \"{{ name }}\", \"label\": \"{% include '_name.yaml' %}\"}")
            .unwrap();
        env.add_template("app.yaml", "name: {{ name }}\n").unwrap();
        let ctx = minijinja::context! { name => "foo", Env => "dev" };

        let json = env.get_template("app.json").unwrap().render(ctx.clone()).unwrap();
        assert_eq!(json, r#"{"name": "foo", "label": "foo-dev"}"#);
        let yaml = env.get_template("app.yaml").unwrap().render(ctx).unwrap();
        assert_eq!(yaml, "name: foo\n");
    }

    #[test]
    fn test_booleans_print_lowercase() {
        let (_dir, root) = root_with(&[]);
        let mut env = root.fork();
        env.add_template("flags.toml", "on = {{ on }}\noff = {{ off }}\n").unwrap();
        let out = env
            .get_template("flags.toml")
            .unwrap()
            .render(minijinja::context! { on => true, off => false })
            .unwrap();
        assert_eq!(out, "on = true\noff = false\n");
    }

    #[test]
    fn test_inline_validate_is_soft() {
        let (_dir, root) = root_with(&[]);
        let env = root.fork();
        assert_eq!(env.render_str("{{ validate('port', 8080) }}", root.context()).unwrap(), "true");
        assert_eq!(env.render_str("{{ validate('port', 'x') }}", root.context()).unwrap(), "false");
    }

    #[test]
    fn test_fragment_syntax_error_is_located() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_broken.txt");
        std::fs::write(&path, "line one\n{{ oops(").unwrap();
        let err = TemplateRoot::build(
            &Context::default(),
            Arc::new(SchemaCache::default()),
            [("_broken.txt".to_string(), path.as_path())],
        )
        .unwrap_err();
        assert!(err.path().unwrap().ends_with("_broken.txt"));
        assert_eq!(err.line(), Some(2));
    }
}
