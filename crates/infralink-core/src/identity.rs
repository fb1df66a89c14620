//! Synthetic identifiers for list-shaped reads
//!
//! Listings have no natural id, yet every tracked entity needs one. The id is
//! a SHA-256 digest over the type name and the canonical form of the input
//! arguments (object keys sorted at every level), so it is stable for equal
//! inputs and changes whenever any argument does.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Deterministic id for `type_name` queried with `arguments`
pub fn synthesize_id(type_name: &str, arguments: &Map<String, Value>) -> String {
    let mut canonical = String::new();
    write_canonical(&Value::Object(arguments.clone()), &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(type_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&object[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(elements) => {
            out.push('[');
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(element, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_same_input_same_id() {
        let a = args(json!({"compartment_id": "c1", "state": "ACTIVE"}));
        assert_eq!(synthesize_id("core_instances", &a), synthesize_id("core_instances", &a));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let mut a = Map::new();
        a.insert("b".to_string(), json!(2));
        a.insert("a".to_string(), json!({"y": 1, "x": [1, 2]}));
        let b = args(json!({"a": {"x": [1, 2], "y": 1}, "b": 2}));

        assert_eq!(synthesize_id("t", &a), synthesize_id("t", &b));
    }

    #[test]
    fn test_any_change_changes_id() {
        let base = args(json!({"compartment_id": "c1", "state": "ACTIVE", "limit": 10}));
        let id = synthesize_id("core_instances", &base);

        let mut changed_value = base.clone();
        changed_value.insert("state".to_string(), json!("STOPPED"));
        let mut added = base.clone();
        added.insert("display_name".to_string(), json!("web"));
        let mut removed = base.clone();
        removed.remove("limit");
        let mut retyped = base.clone();
        retyped.insert("limit".to_string(), json!("10"));

        assert_ne!(id, synthesize_id("core_instances", &changed_value));
        assert_ne!(id, synthesize_id("core_instances", &added));
        assert_ne!(id, synthesize_id("core_instances", &removed));
        assert_ne!(id, synthesize_id("core_instances", &retyped));
        assert_ne!(id, synthesize_id("core_vcns", &base));
    }

    #[test]
    fn test_id_is_hex_sha256() {
        let id = synthesize_id("t", &Map::new());
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
