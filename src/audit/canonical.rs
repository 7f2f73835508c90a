//! Canonical JSON serialization for chain hashing.
//!
//! The same logical payload must hash identically no matter which call site
//! built it, so object keys are emitted in sorted order at every nesting
//! level and numbers use `serde_json`'s own formatting. This exact
//! serialization is used both when writing an entry and when replaying the
//! chain for verification.

use std::collections::BTreeMap;

use serde_json::Value;

pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => {
            // serde_json escaping is deterministic for a given string.
            out.push_str(&Value::String(text.clone()).to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (index, (key, item)) in sorted.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(out, item);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_level() {
        let scrambled = json!({"b": {"y": 1, "x": 2}, "a": [{"q": 1, "p": 2}]});
        assert_eq!(
            canonical_json(&scrambled),
            r#"{"a":[{"p":2,"q":1}],"b":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn insertion_order_does_not_change_output() {
        let first = json!({"name": "deploy", "scopes": ["read", "write"], "count": 3});
        let second = json!({"count": 3, "scopes": ["read", "write"], "name": "deploy"});
        assert_eq!(canonical_json(&first), canonical_json(&second));
    }

    #[test]
    fn escapes_strings_like_serde_json() {
        let value = json!({"note": "line\nbreak \"quoted\""});
        assert_eq!(
            canonical_json(&value),
            r#"{"note":"line\nbreak \"quoted\""}"#
        );
    }

    #[test]
    fn preserves_number_formatting() {
        let value = json!({"float": 1.5, "int": 7, "neg": -2});
        assert_eq!(canonical_json(&value), r#"{"float":1.5,"int":7,"neg":-2}"#);
    }
}
