use minijinja::value::{from_args, Object, Value};
use minijinja::{Error, ErrorKind, State};
use std::sync::Arc;

/// Read access to the filesystem from templates, relative to the working
/// directory: `Files.Get("path")` returns text, `Files.GetBytes("path")`
/// returns bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Files;

fn read(path: &str) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, format!("cannot read {path:?}")).with_source(e)
    })
}

impl Object for Files {
    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "Get" => {
                let (path,): (&str,) = from_args(args)?;
                let text = String::from_utf8(read(path)?).map_err(|e| {
                    Error::new(ErrorKind::InvalidOperation, format!("{path:?} is not UTF-8"))
                        .with_source(e)
                })?;
                Ok(Value::from(text))
            }
            "GetBytes" => {
                let (path,): (&str,) = from_args(args)?;
                Ok(Value::from_bytes(read(path)?))
            }
            _ => Err(Error::from(ErrorKind::UnknownMethod)),
        }
    }
}
