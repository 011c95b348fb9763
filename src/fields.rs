use std::borrow::Cow;

use serde_json::Value;

use crate::normalizer::{normalize_keys, to_camel_case};
use crate::parsers::boolean::parse_bool_opt;
use crate::parsers::structured_text::{looks_structured, parse_structured_text};

fn pascal(camel: &str) -> String {
    let mut chars = camel.chars();
    match chars.next() {
        Some(head) => head.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Look up a snake_case name as camelCase, snake_case, then PascalCase.
pub fn get<'a>(obj: &'a Value, name: &str) -> Option<&'a Value> {
    let map = obj.as_object()?;
    let camel = to_camel_case(name);
    map.get(&*camel)
        .filter(|v| !v.is_null())
        .or_else(|| map.get(name).filter(|v| !v.is_null()))
        .or_else(|| map.get(&pascal(&camel)).filter(|v| !v.is_null()))
}

pub fn get_any<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| get(obj, name))
}

// empty strings count as absent
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

pub fn object_of(value: &Value) -> Option<Cow<'_, Value>> {
    match value {
        Value::Object(_) => Some(Cow::Borrowed(value)),
        Value::String(s) if looks_structured(s) => match parse_structured_text(s) {
            parsed @ Value::Object(_) => Some(Cow::Owned(normalize_keys(&parsed))),
            _ => None,
        },
        _ => None,
    }
}

// a lone mapping counts as a one-element list
pub fn records_of(value: &Value) -> Vec<Value> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(|item| object_of(item).map(|obj| normalize_keys(&obj)))
        .collect()
}

pub fn strings_of(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn string(obj: &Value, names: &[&str]) -> Option<String> {
    get_any(obj, names).and_then(text)
}

pub fn bool(obj: &Value, names: &[&str]) -> bool {
    parse_bool_opt(get_any(obj, names))
}

pub fn u64(obj: &Value, names: &[&str]) -> Option<u64> {
    get_any(obj, names).and_then(number)
}

pub fn count(obj: &Value, names: &[&str]) -> usize {
    u64(obj, names).map(|n| n as usize).unwrap_or(0)
}

pub fn object<'a>(obj: &'a Value, names: &[&str]) -> Option<Cow<'a, Value>> {
    get_any(obj, names).and_then(object_of)
}

pub fn records(obj: &Value, names: &[&str]) -> Vec<Value> {
    get_any(obj, names).map(records_of).unwrap_or_default()
}

pub fn string_list(obj: &Value, names: &[&str]) -> Vec<String> {
    get_any(obj, names).map(strings_of).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_all_spellings() {
        let camel = json!({"displayName": "Print Spooler"});
        let snake = json!({"display_name": "Print Spooler"});
        let pascal = json!({"DisplayName": "Print Spooler"});
        for obj in [camel, snake, pascal] {
            assert_eq!(string(&obj, &["display_name"]).as_deref(), Some("Print Spooler"));
        }
    }

    #[test]
    fn null_falls_through_to_next_spelling() {
        let obj = json!({"serverUrl": null, "server_url": "https://mdm"});
        assert_eq!(string(&obj, &["server_url"]).as_deref(), Some("https://mdm"));
    }

    #[test]
    fn aliases_are_tried_in_order() {
        let obj = json!({"issuer": "B", "certificateIssuer": "A"});
        assert_eq!(string(&obj, &["certificate_issuer", "issuer"]).as_deref(), Some("A"));
        assert_eq!(string(&obj, &["missing", "issuer"]).as_deref(), Some("B"));
    }

    #[test]
    fn blank_strings_are_absent() {
        let obj = json!({"model": "   "});
        assert_eq!(string(&obj, &["model"]), None);
    }

    #[test]
    fn numbers_and_counts() {
        let obj = json!({"cores": "8", "mem": 17179869184u64, "bad": "x", "neg": -1});
        assert_eq!(count(&obj, &["cores"]), 8);
        assert_eq!(u64(&obj, &["mem"]), Some(17179869184));
        assert_eq!(count(&obj, &["bad"]), 0);
        assert_eq!(count(&obj, &["neg"]), 0);
        assert_eq!(count(&obj, &["absent"]), 0);
    }

    #[test]
    fn records_accept_objects_and_structured_text() {
        let obj = json!({"services": [
            {"start_type": "Manual"},
            "@{Name=Spooler; StartType=Automatic}",
            42
        ]});
        let rows = records(&obj, &["services"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(string(&rows[0], &["start_type"]).as_deref(), Some("Manual"));
        assert_eq!(string(&rows[1], &["start_type"]).as_deref(), Some("Automatic"));
    }

    #[test]
    fn single_object_is_a_one_row_list() {
        let obj = json!({"interfaces": {"name": "en0"}});
        assert_eq!(records(&obj, &["interfaces"]).len(), 1);
    }

    #[test]
    fn string_lists() {
        let obj = json!({"a": ["x", " y ", "", 3], "b": "p, q,,r"});
        assert_eq!(string_list(&obj, &["a"]), vec!["x", "y", "3"]);
        assert_eq!(string_list(&obj, &["b"]), vec!["p", "q", "r"]);
    }

    #[test]
    fn structured_object_field() {
        let obj = json!({"btmdb_health": "@{status=ok; item_count=4}"});
        let parsed = object(&obj, &["btmdb_health"]).unwrap();
        assert_eq!(count(&parsed, &["item_count"]), 4);
    }
}
