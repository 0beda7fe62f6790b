//! Deep merge of a connection profile into a request template
//!
//! Both sides are handled as [`serde_json::Value`] trees. The target (the template)
//! is mutated in place and takes precedence for every scalar it already carries.
//! Nested objects are merged key by key, so a profile's headers fill the gaps left
//! by a template's headers. The `path` key is the only exception to "target wins":
//! a profile path is prepended to the template path.
use std::borrow::Cow;

use http::Uri;
use serde_json::{Map, Value};

/// Key that joins rather than overrides.
const PATH_KEY: &str = "path";

/// Merge `source` into `target`.
///
/// Precedence, per key of `source`:
///
/// - object values are merged recursively into `target[key]`, created as an empty object when absent or `null`
/// - `target[key]` absent or `null`: the source value is copied over
/// - `path` with a non-empty source path: the two paths are joined, keeping the query of `target`
/// - anything else: `target` keeps its value
///
/// A `source` that is not an object leaves `target` untouched.
pub fn merge(target: &mut Value, source: &Value) {
    let Value::Object(source) = source else {
        return;
    };
    if target.is_null() {
        *target = Value::Object(Map::new());
    }
    // a scalar or array already in the target wins over a source object
    if let Value::Object(target) = target {
        merge_object(target, source);
    }
}

fn merge_object(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, prop) in source {
        match (prop, target.get_mut(key)) {
            (Value::Object(_), Some(existing)) => merge(existing, prop),
            (Value::Object(_), None) => {
                let mut copied = Value::Object(Map::new());
                merge(&mut copied, prop);
                target.insert(key.clone(), copied);
            }
            (_, None) => {
                target.insert(key.clone(), prop.clone());
            }
            (_, Some(slot @ Value::Null)) => *slot = prop.clone(),
            (Value::String(base), Some(Value::String(path))) if key == PATH_KEY && !base.is_empty() => {
                *path = join_with_query(base, path);
            }
            (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_), Some(_)) => {}
        }
    }
}

/// Join `base` and `path`, then re-attach the query of `path`.
///
/// Any query on `base` is dropped.
pub fn join_with_query(base: &str, path: &str) -> String {
    let joined = join_paths(base, path);
    match split_query(path).1 {
        Some(query) if !query.is_empty() => format!("{joined}?{query}"),
        _ => joined,
    }
}

/// Join two url paths as segments without duplicate separators.
///
/// Only the path of each argument is used: the scheme and authority of an absolute
/// url are dropped, as are queries and fragments. `.` segments are removed and `..`
/// removes the segment before it. The result is absolute when `base` is empty or
/// absolute, and keeps a trailing `/` when the last non-empty input had one.
pub fn join_paths(base: &str, path: &str) -> String {
    let base = url_path(strip_query(base));
    let path = url_path(strip_query(path));

    let mut segments: Vec<&str> = vec![];
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return if base.starts_with('/') || path.starts_with('/') {
            "/".into()
        } else {
            String::new()
        };
    }

    let mut joined = segments.join("/");
    if base.is_empty() || base.starts_with('/') {
        joined.insert(0, '/');
    }
    let last = if path.is_empty() { &base } else { &path };
    if last.ends_with('/') || last.ends_with("/.") || last.ends_with("/..") {
        joined.push('/');
    }
    joined
}

/// The path of an absolute url, or `path` itself when it has no scheme
fn url_path(path: &str) -> Cow<'_, str> {
    match path.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() => Cow::Owned(uri.path().to_string()),
        _ => Cow::Borrowed(path),
    }
}

fn strip_query(path: &str) -> &str {
    split_query(path).0
}

/// Split a path into its path part and its query, dropping any fragment.
fn split_query(path: &str) -> (&str, Option<&str>) {
    let path = path.split_once('#').map_or(path, |(p, _)| p);
    match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    }
}
