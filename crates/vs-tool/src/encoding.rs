use serde_json::{json, Map as JsonMap, Value as JsonValue};
use vs_core::{ObservableMap, ObservableValue, PlainObject, Value};

const MAP_TAG: &str = "$map";
const OBSERVABLE_TAG: &str = "$observable";
const UNDEFINED_TAG: &str = "$undefined";

/// Builds a runtime value from fixture JSON. Objects with a single tag key
/// become observables: `{"$map": {..}}` an observable map,
/// `{"$observable": v}` a settable value, `{"$undefined": true}` undefined.
pub fn decode_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(value) => Value::Bool(*value),
        JsonValue::Number(value) => value.as_f64().map(Value::Number).unwrap_or(Value::Null),
        JsonValue::String(value) => Value::string(value.as_str()),
        JsonValue::Array(values) => Value::list(values.iter().map(decode_value)),
        JsonValue::Object(entries) => decode_object(entries),
    }
}

fn decode_object(entries: &JsonMap<String, JsonValue>) -> Value {
    if entries.len() == 1 {
        if let Some(inner) = entries.get(MAP_TAG) {
            let map = ObservableMap::new();
            if let JsonValue::Object(inner) = inner {
                for (key, value) in inner {
                    map.set(key, decode_value(value));
                }
            }
            return Value::Map(map);
        }
        if let Some(inner) = entries.get(OBSERVABLE_TAG) {
            return ObservableValue::new(decode_value(inner)).to_value();
        }
        if entries.contains_key(UNDEFINED_TAG) {
            return Value::Undefined;
        }
    }
    let object = PlainObject::new();
    for (key, value) in entries {
        object.insert(key.as_str(), decode_value(value));
    }
    Value::Object(object)
}

pub fn encode_value(value: &Value) -> JsonValue {
    match value {
        Value::Undefined => json!({ UNDEFINED_TAG: true }),
        Value::Observable(observable) => observable.peek_value().to_json(),
        other => other.to_json(),
    }
}

#[cfg(test)]
mod encoding_tests {
    use super::*;

    #[test]
    fn tagged_objects_decode_to_observables() {
        let decoded = decode_value(&json!({
            "plain": {"a": 1},
            "map": {"$map": {"b": "two"}},
            "cell": {"$observable": 3},
            "missing": {"$undefined": true}
        }));
        let Value::Object(object) = decoded else {
            panic!("root should decode to a plain object");
        };

        assert!(matches!(object.get("plain"), Some(Value::Object(_))));
        let map = object.get("map").expect("map should exist");
        assert_eq!(
            map.as_map().map(|map| map.peek("b")),
            Some(Value::from("two"))
        );
        let cell = object.get("cell").expect("cell should exist");
        assert_eq!(
            cell.as_observable().map(|cell| cell.peek_value()),
            Some(Value::from(3))
        );
        assert_eq!(object.get("missing"), Some(Value::Undefined));
    }

    #[test]
    fn encoding_keeps_undefined_distinct_from_null() {
        assert_eq!(encode_value(&Value::Undefined), json!({"$undefined": true}));
        assert_eq!(encode_value(&Value::Null), JsonValue::Null);
        assert_eq!(
            encode_value(&ObservableValue::new(Value::from("x")).to_value()),
            json!("x")
        );
    }
}
