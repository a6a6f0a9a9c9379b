//! Pure JSON-schema -> host-schema translation for child tool input schemas.
//!
//! Child providers describe their tools with arbitrary JSON Schema. This
//! host re-exposes those tools directly to its own clients, so the schema
//! has to be translated into a form this host's own schema machinery
//! accepts: known primitive/array/object types pass through unchanged,
//! a JSON Schema `"type"` array (a union of types) becomes an `anyOf`,
//! anything unrecognized collapses to an unconstrained "any" schema, and
//! an empty or non-object schema becomes a no-args object schema.

use serde_json::{Map, Value, json};

const KNOWN_TYPES: &[&str] = &[
    "string", "number", "integer", "boolean", "null", "array", "object",
];

/// Translate a single child-supplied JSON Schema value into this host's
/// own accepted schema form.
#[must_use]
pub fn translate(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return empty_object_schema();
    };
    if obj.is_empty() {
        return empty_object_schema();
    }
    translate_object(obj)
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn translate_object(obj: &Map<String, Value>) -> Value {
    let mut out = Map::new();

    match obj.get("type") {
        Some(Value::String(t)) if KNOWN_TYPES.contains(&t.as_str()) => {
            out.insert("type".to_string(), Value::String(t.clone()));
        }
        Some(Value::Array(types)) => {
            let variants: Vec<Value> = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| KNOWN_TYPES.contains(t))
                .map(|t| json!({ "type": t }))
                .collect();
            if variants.is_empty() {
                return empty_object_schema();
            }
            out.insert("anyOf".to_string(), Value::Array(variants));
        }
        Some(_) | None => {
            // Unknown or absent type: treat as unconstrained "any" and
            // carry over whatever structural hints we can recognize below.
        }
    }

    if let Some(Value::String(d)) = obj.get("description") {
        out.insert("description".to_string(), Value::String(d.clone()));
    }

    if let Some(Value::Object(props)) = obj.get("properties") {
        let translated: Map<String, Value> = props
            .iter()
            .map(|(k, v)| (k.clone(), translate(v)))
            .collect();
        out.insert("properties".to_string(), Value::Object(translated));
    }

    if let Some(required @ Value::Array(_)) = obj.get("required") {
        out.insert("required".to_string(), required.clone());
    }

    if let Some(items) = obj.get("items") {
        out.insert("items".to_string(), translate(items));
    }

    if let Some(Value::Array(values)) = obj.get("enum") {
        out.insert("enum".to_string(), Value::Array(values.clone()));
    }

    if out.is_empty() {
        return empty_object_schema();
    }
    Value::Object(out)
}
