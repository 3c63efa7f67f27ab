use serde_json::{json, Map, Value as JsonValue};

use crate::{Name, Value};

/// Normalize shorthand `Value` JSON into the canonical `{ "type": ..., "data": ... }`
/// representation understood by the serde derives on [`Value`]. Accepts
/// shorthand objects such as `{ "vec3": [1, 2, 3] }` and primitive aliases
/// like `1.0`, `true` or `[0, 1, 0]`.
pub fn normalize_value_json(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Number(n) => {
            if n.is_f64() {
                json!({ "type": "scalar", "data": n })
            } else {
                json!({ "type": "integer", "data": n })
            }
        }
        JsonValue::Bool(b) => json!({ "type": "bool", "data": b }),
        JsonValue::String(s) => json!({
            "type": "space",
            "data": { "space": "control_rig", "element": s }
        }),
        JsonValue::Array(arr) if arr.len() == 3 && arr.iter().all(|x| x.is_number()) => {
            json!({ "type": "vector3", "data": arr })
        }
        JsonValue::Object(obj) => normalize_object(obj),
        other => other,
    }
}

fn normalize_object(obj: Map<String, JsonValue>) -> JsonValue {
    if obj.contains_key("type") && obj.contains_key("data") {
        return JsonValue::Object(obj);
    }
    if let Some(f) = obj
        .get("scalar")
        .or_else(|| obj.get("float"))
        .and_then(|x| x.as_f64())
    {
        return json!({ "type": "scalar", "data": f });
    }
    if let Some(b) = obj.get("bool").and_then(|x| x.as_bool()) {
        return json!({ "type": "bool", "data": b });
    }
    if let Some(i) = obj.get("integer").and_then(|x| x.as_i64()) {
        return json!({ "type": "integer", "data": i });
    }
    if let Some(e) = obj.get("enum").and_then(|x| x.as_u64()) {
        return json!({ "type": "enum", "data": e });
    }
    if let Some(arr) = obj
        .get("vec3")
        .or_else(|| obj.get("vector3"))
        .and_then(|x| x.as_array())
    {
        return json!({ "type": "vector3", "data": arr });
    }
    if let Some(transform) = obj.get("transform").and_then(|x| x.as_object()) {
        let mut data = Map::new();
        for key in ["translation", "rotation", "scale"] {
            if let Some(v) = transform.get(key) {
                data.insert(key.to_string(), v.clone());
            }
        }
        return json!({ "type": "transform", "data": JsonValue::Object(data) });
    }
    if let Some(space) = obj.get("space") {
        return match space {
            JsonValue::String(s) => json!({
                "type": "space",
                "data": { "space": s, "element": obj.get("element").cloned().unwrap_or(JsonValue::Null) }
            }),
            JsonValue::Object(inner) => json!({ "type": "space", "data": JsonValue::Object(inner.clone()) }),
            _ => JsonValue::Object(obj),
        };
    }
    JsonValue::Object(obj)
}

/// Normalize shorthand JSON then deserialize it into a [`Value`].
pub fn parse_value(value: JsonValue) -> Result<Value, serde_json::Error> {
    let mut normalized = normalize_value_json(value);
    // A null element means the empty name.
    if let Some(data) = normalized.get_mut("data").and_then(|d| d.as_object_mut()) {
        if data.get("element").is_some_and(|e| e.is_null()) {
            data.insert("element".to_string(), JsonValue::String(String::new()));
        }
    }
    serde_json::from_value(normalized)
}

/// Parse a `{ "<name>": <value json>, ... }` object into name/value pairs,
/// keeping the object's iteration order.
pub fn parse_named_values(value: JsonValue) -> Result<Vec<(Name, Value)>, serde_json::Error> {
    use serde::de::Error as _;

    let JsonValue::Object(obj) = value else {
        return Err(serde_json::Error::custom("expected an object of named values"));
    };
    obj.into_iter()
        .map(|(k, v)| parse_value(v).map(|value| (Name::new(&k), value)))
        .collect()
}
