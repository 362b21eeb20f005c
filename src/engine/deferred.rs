use super::Console;
use crate::context::Context;
use crate::error::{Error, Result};
use minijinja::value::Value;
use minijinja::State;
use tracing::debug;

/// Run deferred blocks against the validated `document`, in the order given.
///
/// A name exported by the target file (a top-level macro) is called with the
/// document as its only argument. The macro sees the file's render context,
/// which has no `Document` key; declare the parameter as `Document`
/// (`{% macro summary(Document) %}`) to read it under that name. Any other
/// name is looked up as a template and rendered with `base` plus `Document`.
/// Output goes to `console`.
///
/// Returns the number of blocks executed.
pub fn replay(
    state: &State<'_, '_>,
    names: &[String],
    base: &Value,
    document: &serde_json::Value,
    console: &Console,
) -> Result<usize> {
    let exports = state.exports();
    for name in names {
        let output = if exports.contains(&name.as_str()) {
            state.call_macro(name, &[Value::from_serialize(document)])?
        } else {
            state
                .env()
                .get_template(name)?
                .render(Context::with_document(base, document))?
        };
        debug!(block = %name, bytes = output.len(), "deferred block rendered");
        console.write(&output).map_err(Error::from)?;
    }
    Ok(names.len())
}
