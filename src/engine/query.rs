//! Query operations over documents.
//!
//! Every query takes `(document, query)` in that order and is registered both
//! as a function and as a filter, so `jq(Values, ".a")` and
//! `Values | jq(".a")` are the same call.
//!
//! | name | language |
//! |------|----------|
//! | `jq` | jq filter, the last output wins |
//! | `jp` | JMESPath; a missing path is `none` |
//! | `jptr` | JSON Pointer (RFC 6901); a missing target is `none` |
//! | `expr` | template expression evaluated with the document as variables |

use super::functions::to_document;
use crate::error::{raise, Error};
use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, RcIter};
use jaq_json::Val;
use minijinja::value::Value;
use minijinja::{Environment, State};

type FnResult<T> = Result<T, minijinja::Error>;

pub(crate) fn register(env: &mut Environment<'static>) {
    env.add_function("jq", jq);
    env.add_function("jp", jp);
    env.add_function("jptr", jptr);
    env.add_function("expr", expr);

    env.add_filter("jq", jq);
    env.add_filter("jp", jp);
    env.add_filter("jptr", jptr);
    env.add_filter("expr", expr);
}

fn query_text<'a>(name: &str, query: &'a Value) -> FnResult<&'a str> {
    match query.as_str() {
        Some(text) => Ok(text),
        None => raise(Error::InvalidArgument(format!(
            "{name} expects the query as a string, got {}",
            query.kind()
        ))),
    }
}

fn failed(language: &'static str, query: &str, message: impl ToString) -> Error {
    Error::Query {
        language,
        query: query.to_string(),
        message: message.to_string(),
    }
}

/// Run a jq filter and return its last output (`null` when it yields nothing).
pub fn run_jq(document: serde_json::Value, filter: &str) -> Result<serde_json::Value, Error> {
    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();
    let modules = loader
        .load(&arena, File { code: filter, path: () })
        .map_err(|_| failed("jq", filter, "syntax error"))?;
    let compiled = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|_| failed("jq", filter, "undefined name or bad arity"))?;

    let inputs = RcIter::new(core::iter::empty());
    let mut last = serde_json::Value::Null;
    for output in compiled.run((Ctx::new([], &inputs), Val::from(document))) {
        let value = output.map_err(|e| failed("jq", filter, e))?;
        last = serde_json::Value::from(value);
    }
    Ok(last)
}

/// Evaluate a JMESPath expression.
pub fn run_jmespath(document: serde_json::Value, expression: &str) -> Result<serde_json::Value, Error> {
    let compiled = jmespath::compile(expression).map_err(|e| failed("jmespath", expression, e))?;
    let result = compiled
        .search(document)
        .map_err(|e| failed("jmespath", expression, e))?;
    serde_json::to_value(&*result).map_err(|e| failed("jmespath", expression, e))
}

fn jq(document: Value, query: Value) -> FnResult<Value> {
    let filter = query_text("jq", &query)?;
    match run_jq(to_document(&document)?, filter) {
        Ok(result) => Ok(Value::from_serialize(result)),
        Err(err) => raise(err),
    }
}

fn jp(document: Value, query: Value) -> FnResult<Value> {
    let path = query_text("jp", &query)?;
    match run_jmespath(to_document(&document)?, path) {
        Ok(result) => Ok(Value::from_serialize(result)),
        Err(err) => raise(err),
    }
}

fn jptr(document: Value, query: Value) -> FnResult<Value> {
    let pointer = query_text("jptr", &query)?;
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return raise(failed("pointer", pointer, "must be empty or start with '/'"));
    }
    let doc = to_document(&document)?;
    Ok(doc
        .pointer(pointer)
        .map(Value::from_serialize)
        .unwrap_or(Value::from(())))
}

fn expr(state: &State, document: Value, query: Value) -> FnResult<Value> {
    let source = query_text("expr", &query)?;
    let expression = state.env().compile_expression_owned(source.to_string())?;
    expression.eval(document)
}
