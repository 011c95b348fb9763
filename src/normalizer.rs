use std::borrow::Cow;
use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::parsers::structured_text;

// leading underscores survive, empty segments are dropped
pub fn to_camel_case(key: &str) -> Cow<'_, str> {
    let body = key.trim_start_matches('_');
    if !body.contains('_') {
        return Cow::Borrowed(key);
    }

    let mut out = String::with_capacity(key.len());
    out.push_str(&key[..key.len() - body.len()]);
    for (i, segment) in body.split('_').filter(|s| !s.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(segment);
            continue;
        }
        let mut chars = segment.chars();
        if let Some(head) = chars.next() {
            out.extend(head.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    Cow::Owned(out)
}

pub fn normalize_keys(value: &Value) -> Value {
    walk(value, false)
}

/// Key normalization plus expansion of `@{...}` strings.
pub fn normalize_record(value: &Value) -> Value {
    walk(value, true)
}

fn walk(value: &Value, expand_text: bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map, expand_text)),
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, expand_text)).collect()),
        Value::String(s) if expand_text && structured_text::looks_structured(s) => {
            match structured_text::parse_structured_text(s) {
                parsed @ Value::Object(_) => walk(&parsed, expand_text),
                untouched => untouched,
            }
        }
        other => other.clone(),
    }
}

fn normalize_map(map: &Map<String, Value>, expand_text: bool) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    // keys whose current value came from an originally camelCase key
    let mut from_camel: HashSet<String> = HashSet::new();

    for (key, value) in map {
        let camel = to_camel_case(key);
        let is_camel_original = camel == key.as_str();
        let normalized = walk(value, expand_text);
        let camel = camel.into_owned();

        let replace = match out.get(&camel) {
            None => true,
            Some(existing) => {
                if from_camel.contains(&camel) {
                    existing.is_null() && !normalized.is_null()
                } else {
                    is_camel_original && !normalized.is_null()
                }
            }
        };
        if replace {
            if is_camel_original {
                from_camel.insert(camel.clone());
            }
            out.insert(camel, normalized);
        }
    }
    out
}
