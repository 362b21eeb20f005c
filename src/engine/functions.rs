//! Context-free template functions: format conversion, assertions, URI
//! templates, query strings and the sprig-style string helpers ported
//! templates rely on.

use crate::error::{raise, Error};
use crate::format::Format;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{Environment, ErrorKind};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uritemplate::{TemplateVar, UriTemplate};

type FnResult<T> = Result<T, minijinja::Error>;

pub(crate) fn register(env: &mut Environment<'static>) {
    env.add_function("toYaml", to_yaml);
    env.add_function("toToml", to_toml);
    env.add_function("toJson", to_json);
    env.add_function("fromYaml", from_yaml);
    env.add_function("fromYamlArray", from_yaml_array);
    env.add_function("fromToml", from_toml);
    env.add_function("fromJson", from_json);
    env.add_function("equal", equal);
    env.add_function("required", required);
    env.add_function("assert", assertion);
    env.add_function("uritpl", uritpl);
    env.add_function("qsParse", qs_parse);
    env.add_function("qsJoin", qs_join);
    env.add_function("coalesce", coalesce);

    env.add_filter("toYaml", to_yaml);
    env.add_filter("toToml", to_toml);
    env.add_filter("quote", quote);
    env.add_filter("squote", squote);
    env.add_filter("nindent", nindent);
    env.add_filter("trimPrefix", trim_prefix);
    env.add_filter("trimSuffix", trim_suffix);
    env.add_filter("b64enc", b64enc);
    env.add_filter("b64dec", b64dec);
    env.add_filter("sha256sum", sha256sum);
}

/// Template value to a JSON document.
pub(crate) fn to_document(value: &Value) -> FnResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| {
        minijinja::Error::new(ErrorKind::BadSerialization, "value is not serializable")
            .with_source(e)
    })
}

fn serialize(format: Format, value: &Value) -> FnResult<String> {
    let doc = to_document(value)?;
    match format.serialize(&doc) {
        Ok(text) => Ok(text.trim_end_matches('\n').to_string()),
        Err(err) => raise(err),
    }
}

fn parse(format: Format, text: &str) -> FnResult<serde_json::Value> {
    format.parse(text.as_bytes()).or_else(raise)
}

fn to_yaml(value: Value) -> FnResult<String> {
    serialize(Format::Yaml, &value)
}

fn to_toml(value: Value) -> FnResult<String> {
    serialize(Format::Toml, &value)
}

fn to_json(value: Value) -> FnResult<String> {
    serialize(Format::Json, &value)
}

fn from_yaml(text: &str) -> FnResult<Value> {
    match Format::Yaml.parse_mapping(text.as_bytes()) {
        Ok(map) => Ok(Value::from_serialize(&map)),
        Err(err) => raise(err),
    }
}

fn from_yaml_array(text: &str) -> FnResult<Value> {
    match parse(Format::Yaml, text)? {
        serde_json::Value::Null => Ok(Value::from(Vec::<Value>::new())),
        list @ serde_json::Value::Array(_) => Ok(Value::from_serialize(&list)),
        _ => raise(Error::Parse {
            format: "yaml",
            message: "expected a sequence at the top level".into(),
            line: None,
        }),
    }
}

fn from_toml(text: &str) -> FnResult<Value> {
    Ok(Value::from_serialize(parse(Format::Toml, text)?))
}

fn from_json(text: &str) -> FnResult<Value> {
    Ok(Value::from_serialize(parse(Format::Json, text)?))
}

fn equal(a: Value, b: Value) -> bool {
    a == b
}

fn required(message: String, value: Value) -> FnResult<Value> {
    if value.is_undefined() || value.is_none() || value.as_str() == Some("") {
        return raise(Error::MissingValue(message));
    }
    Ok(value)
}

fn assertion(message: String, value: Value) -> FnResult<bool> {
    if value.is_true() {
        Ok(true)
    } else {
        raise(Error::Assertion(message))
    }
}

/// Plain text of a value; booleans are `true`/`false`.
pub(crate) fn scalar(value: &Value) -> String {
    match value.kind() {
        ValueKind::Bool if value.is_true() => "true".to_string(),
        ValueKind::Bool => "false".to_string(),
        ValueKind::Undefined => String::new(),
        _ => value.to_string(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => true,
        ValueKind::String => value.as_str() == Some(""),
        ValueKind::Seq | ValueKind::Map => value.len() == Some(0),
        _ => false,
    }
}

fn coalesce(values: Rest<Value>) -> Value {
    values
        .iter()
        .find(|value| !is_empty(value))
        .cloned()
        .unwrap_or_default()
}

fn quote(value: Value) -> String {
    format!("{:?}", scalar(&value))
}

fn squote(value: Value) -> String {
    format!("'{}'", scalar(&value))
}

/// A newline, then every line of `text` indented by `width` spaces.
fn nindent(text: Value, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut out = String::new();
    for line in scalar(&text).split('\n') {
        out.push('\n');
        out.push_str(&pad);
        out.push_str(line);
    }
    out
}

fn trim_prefix(text: &str, prefix: &str) -> String {
    text.strip_prefix(prefix).unwrap_or(text).to_string()
}

fn trim_suffix(text: &str, suffix: &str) -> String {
    text.strip_suffix(suffix).unwrap_or(text).to_string()
}

fn b64enc(value: Value) -> String {
    match value.as_bytes() {
        Some(bytes) if value.kind() == ValueKind::Bytes => STANDARD.encode(bytes),
        _ => STANDARD.encode(scalar(&value)),
    }
}

fn b64dec(text: &str) -> FnResult<String> {
    let bytes = STANDARD.decode(text.trim()).map_err(|e| {
        minijinja::Error::new(ErrorKind::InvalidOperation, "b64dec: invalid base64").with_source(e)
    })?;
    String::from_utf8(bytes).map_err(|e| {
        minijinja::Error::new(ErrorKind::InvalidOperation, "b64dec: decoded data is not UTF-8")
            .with_source(e)
    })
}

fn sha256sum(value: Value) -> String {
    let mut hasher = Sha256::new();
    match value.as_bytes() {
        Some(bytes) if value.kind() == ValueKind::Bytes => hasher.update(bytes),
        _ => hasher.update(scalar(&value).as_bytes()),
    }
    format!("{:x}", hasher.finalize())
}

fn template_var(value: &Value) -> FnResult<TemplateVar> {
    let var = match value.kind() {
        ValueKind::Seq | ValueKind::Iterable => {
            let items: Vec<String> = value.try_iter()?.map(|item| scalar(&item)).collect();
            if items.is_empty() {
                TemplateVar::AssociativeArray(Vec::new())
            } else {
                TemplateVar::List(items)
            }
        }
        ValueKind::Map => {
            let mut pairs = Vec::new();
            for key in value.try_iter()? {
                let entry = value.get_item(&key)?;
                match entry.kind() {
                    ValueKind::Seq | ValueKind::Iterable => {
                        for item in entry.try_iter()? {
                            pairs.push((scalar(&key), scalar(&item)));
                        }
                    }
                    _ => pairs.push((scalar(&key), scalar(&entry))),
                }
            }
            TemplateVar::AssociativeArray(pairs)
        }
        _ => match value.as_str() {
            Some("") => TemplateVar::AssociativeArray(Vec::new()),
            _ => TemplateVar::Scalar(scalar(value)),
        },
    };
    Ok(var)
}

/// RFC 6570 expansion of `template` with named parameters.
fn uritpl(template: &str, params: Option<Value>) -> FnResult<String> {
    let mut uri = UriTemplate::new(template);
    if let Some(params) = params.filter(|p| p.kind() == ValueKind::Map) {
        for key in params.try_iter()? {
            let var = template_var(&params.get_item(&key)?)?;
            uri.set(&scalar(&key), var);
        }
    }
    Ok(uri.build())
}

fn qs_parse(query: &str) -> Value {
    let mut parsed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        parsed
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    Value::from_serialize(&parsed)
}

fn qs_join(params: Value) -> FnResult<String> {
    if params.kind() != ValueKind::Map {
        return raise(Error::InvalidArgument("qsJoin expects a mapping".into()));
    }
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for key in params.try_iter()? {
        let value = params.get_item(&key)?;
        let slot = entries.entry(scalar(&key)).or_default();
        match value.kind() {
            ValueKind::Seq | ValueKind::Iterable => {
                slot.extend(value.try_iter()?.map(|item| scalar(&item)));
            }
            _ => slot.push(scalar(&value)),
        }
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, values) in &entries {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    Ok(serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    fn env() -> Environment<'static> {
        let mut env = Environment::new();
        crate::engine::configure(&mut env);
        env
    }

    fn render(src: &str, ctx: Value) -> Result<String, minijinja::Error> {
        env().render_str(src, ctx)
    }

    #[test]
    fn test_to_yaml_trims_trailing_newline() {
        let out = render("{{ toYaml(v) }}", context! { v => context! { a => 1 } }).unwrap();
        assert_eq!(out, "a: 1");
    }

    #[test]
    fn test_to_toml_and_back() {
        let out = render(
            "{{ fromToml(toToml(v)).name }}",
            context! { v => context! { name => "svc" } },
        )
        .unwrap();
        assert_eq!(out, "svc");
    }

    #[test]
    fn test_from_yaml_variants() {
        assert_eq!(render("{{ fromYaml('a: 2').a }}", context! {}).unwrap(), "2");
        assert_eq!(render("{{ fromYamlArray('[1, 2, 3]') | length }}", context! {}).unwrap(), "3");
        assert_eq!(render("{{ fromYaml('') | length }}", context! {}).unwrap(), "0");
    }

    #[test]
    fn test_equal_is_structural() {
        let ctx = context! { a => vec![1, 2], b => vec![1, 2], c => vec![2, 1] };
        assert_eq!(render("{{ equal(a, b) }} {{ equal(a, c) }}", ctx).unwrap(), "true false");
    }

    #[test]
    fn test_required() {
        assert_eq!(render("{{ required('need x', x) }}", context! { x => "v" }).unwrap(), "v");
        for ctx in [context! {}, context! { x => "" }, context! { x => () }] {
            let err = Error::from(render("{{ required('need x', x) }}", ctx).unwrap_err());
            assert!(matches!(err.root(), Error::MissingValue(m) if m == "need x"));
        }
    }

    #[test]
    fn test_assert() {
        assert_eq!(render("{{ assert('ok', [1]) }}", context! {}).unwrap(), "true");
        for src in ["{{ assert('m', false) }}", "{{ assert('m', []) }}", "{{ assert('m', '') }}", "{{ assert('m', nothing) }}"] {
            let err = Error::from(render(src, context! {}).unwrap_err());
            assert!(matches!(err.root(), Error::Assertion(m) if m == "m"), "{src}");
        }
    }

    #[test]
    fn test_uritpl() {
        let ctx = context! {
            p => context! {
                host => "example.com",
                path => vec!["a", "b"],
                q => context! { x => "1", y => vec!["2", "3"] },
            }
        };
        let out = render("{{ uritpl('https://{host}{/path*}{?q*}', p) }}", ctx).unwrap();
        assert_eq!(out, "https://example.com/a/b?x=1&y=2&y=3");
    }

    #[test]
    fn test_query_strings() {
        let out = render("{{ qsParse('a=1&b=2&a=3').a | join(',') }}", context! {}).unwrap();
        assert_eq!(out, "1,3");
        let ctx = context! { q => context! { b => "x y", a => vec!["1", "2"] } };
        assert_eq!(render("{{ qsJoin(q) }}", ctx).unwrap(), "a=1&a=2&b=x+y");
    }

    #[test]
    fn test_booleans_render_lowercase_everywhere() {
        let ctx = context! { flag => true, q => context! { on => false } };
        let out = render("{{ flag }} {{ equal(1, 1) }} {{ qsJoin(q) }} {{ flag | quote }}", ctx).unwrap();
        assert_eq!(out, "true true on=false \"true\"");
    }

    #[test]
    fn test_string_helpers() {
        let ctx = context! { name => "api", list => "a: 1\nb: 2" };
        assert_eq!(render("{{ name | quote }} {{ name | squote }}", ctx.clone()).unwrap(), "\"api\" 'api'");
        assert_eq!(
            render("data:{{ list | nindent(2) }}", ctx.clone()).unwrap(),
            "data:\n  a: 1\n  b: 2"
        );
        assert_eq!(
            render("{{ 'v1.2' | trimPrefix('v') }} {{ 'app.yaml' | trimSuffix('.yaml') }}", ctx).unwrap(),
            "1.2 app"
        );
    }

    #[test]
    fn test_encodings_and_digests() {
        assert_eq!(render("{{ 'hello' | b64enc }}", context! {}).unwrap(), "aGVsbG8=");
        assert_eq!(render("{{ 'aGVsbG8=' | b64dec }}", context! {}).unwrap(), "hello");
        assert!(render("{{ '%%%' | b64dec }}", context! {}).is_err());
        assert_eq!(
            render("{{ 'abc' | sha256sum }}", context! {}).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_coalesce_skips_empty_values() {
        let ctx = context! { empty => "", list => Vec::<i32>::new(), port => 8080 };
        assert_eq!(render("{{ coalesce(missing, empty, list, port, 1) }}", ctx).unwrap(), "8080");
        assert_eq!(render("{{ coalesce(missing) }}", context! {}).unwrap(), "");
    }

    #[test]
    fn test_python_string_methods_available() {
        assert_eq!(render("{{ 'Name'.upper() }}", context! {}).unwrap(), "NAME");
    }
}
