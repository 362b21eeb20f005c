use super::functions::scalar;
use super::{normalize_source, Console};
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind, State};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// File-scoped state of one render: the deferred block names and the console.
///
/// A session is created per target file and bound into that file's fork of the
/// template set only, so registrations and output never cross files.
#[derive(Debug)]
pub struct RenderSession {
    deferred: Mutex<VecDeque<String>>,
    console: Console,
}

fn console_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::WriteFailure, "console output failed").with_source(err)
}

/// `fmt.Print` spacing: a space between operands when neither is a string.
fn print(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let prev = &args[i - 1];
            if prev.kind() != ValueKind::String && arg.kind() != ValueKind::String {
                out.push(' ');
            }
        }
        out.push_str(&scalar(arg));
    }
    out
}

fn println(args: &[Value]) -> String {
    let mut out = args
        .iter()
        .map(scalar)
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    out
}

/// `data` laid over `base`: keys of `data` win.
fn overlay(base: &Value, data: &Value) -> Result<Value, Error> {
    let mut merged = BTreeMap::new();
    for source in [base, data] {
        for key in source.try_iter()? {
            let value = source.get_item(&key)?;
            merged.insert(scalar(&key), value);
        }
    }
    Ok(Value::from(merged))
}

impl RenderSession {
    pub fn new(console: Console) -> Self {
        Self {
            deferred: Mutex::new(VecDeque::new()),
            console,
        }
    }

    /// Create a session and bind its functions into `env`.
    ///
    /// `context` is the generation context `tpl` overlays caller data onto.
    pub fn bind(env: &mut Environment<'static>, context: &Value, console: Console) -> Arc<Self> {
        let session = Arc::new(Self::new(console));

        let s = Arc::clone(&session);
        env.add_function("defer", move |name: String| -> String {
            s.register(&name);
            name
        });

        let s = Arc::clone(&session);
        env.add_function("out", move |args: Rest<Value>| -> Result<String, Error> {
            s.console.write(&print(&args)).map_err(console_error)?;
            Ok(String::new())
        });

        let s = Arc::clone(&session);
        env.add_function("outln", move |args: Rest<Value>| -> Result<String, Error> {
            s.console.write(&println(&args)).map_err(console_error)?;
            Ok(String::new())
        });

        let s = Arc::clone(&session);
        env.add_function(
            "outf",
            move |state: &State, format: Value, args: Rest<Value>| -> Result<String, Error> {
                let mut filter_args = Vec::with_capacity(args.len() + 1);
                filter_args.push(format);
                filter_args.extend(args.iter().map(|arg| match arg.kind() {
                    ValueKind::Bool => Value::from(scalar(arg)),
                    _ => arg.clone(),
                }));
                let text = state.apply_filter("format", &filter_args)?;
                s.console.write(&text.to_string()).map_err(console_error)?;
                Ok(String::new())
            },
        );

        env.add_function(
            "include",
            |state: &State, name: &str, data: Option<Value>| -> Result<String, Error> {
                let template = state.env().get_template(name)?;
                template.render(data.unwrap_or_default())
            },
        );

        let base = context.clone();
        env.add_function(
            "tpl",
            move |state: &State, source: &str, data: Option<Value>| -> Result<String, Error> {
                let ctx = match data {
                    Some(data) if data.kind() == ValueKind::Map => overlay(&base, &data)?,
                    _ => base.clone(),
                };
                state.env().render_str(&normalize_source(source), ctx)
            },
        );

        session
    }

    /// Record a deferred block; the most recent registration runs first.
    pub fn register(&self, name: &str) {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_front(name.to_string());
    }

    /// Drain the registered names, most recently registered first.
    pub fn take_deferred(&self) -> Vec<String> {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn console(&self) -> &Console {
        &self.console
    }
}
