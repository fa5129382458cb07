//! Utility functions for value normalization and conversion

use std::collections::HashMap;

use serde_json::json;
use strata_core::resource::Value;
use strata_core::schema::{AttributeType, types};

const MAX_TAGS: usize = 50;
const MAX_TAG_KEY_LENGTH: usize = 512;
const MAX_TAG_VALUE_LENGTH: usize = 256;

/// Normalize an Azure location (e.g., "West Europe" -> "westeurope")
pub fn normalize_location(s: &str) -> String {
    s.replace(' ', "").to_lowercase()
}

/// Tags map type with Azure's limits on count and lengths
pub fn tags_type() -> AttributeType {
    AttributeType::Custom {
        name: "Tags".to_string(),
        base: Box::new(types::string_map()),
        validate: validate_tags,
    }
}

pub fn validate_tags(value: &Value) -> Result<(), String> {
    let Some(tags) = value.as_map() else {
        return Err("Expected map".to_string());
    };
    if tags.len() > MAX_TAGS {
        return Err(format!(
            "a maximum of {} tags can be applied to each ARM resource",
            MAX_TAGS
        ));
    }
    for (key, value) in tags {
        if key.len() > MAX_TAG_KEY_LENGTH {
            return Err(format!(
                "the maximum length for a tag key is {} characters: {:?} is {} characters",
                MAX_TAG_KEY_LENGTH,
                key,
                key.len()
            ));
        }
        if let Some(v) = value.as_str()
            && v.len() > MAX_TAG_VALUE_LENGTH
        {
            return Err(format!(
                "the maximum length for a tag value is {} characters: the value for {:?} is {} characters",
                MAX_TAG_VALUE_LENGTH,
                key,
                v.len()
            ));
        }
    }
    Ok(())
}

/// Tags attribute to the ARM `tags` object
pub fn expand_tags(tags: Option<&Value>) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    if let Some(Value::Map(tags)) = tags {
        for (key, value) in tags {
            let v = match value {
                Value::String(s) => json!(s),
                Value::Int(i) => json!(i.to_string()),
                Value::Bool(b) => json!(b.to_string()),
                _ => continue,
            };
            out.insert(key.clone(), v);
        }
    }
    serde_json::Value::Object(out)
}

/// ARM `tags` object to the tags attribute; absent or empty tags yield an empty map
pub fn flatten_tags(tags: Option<&serde_json::Value>) -> Value {
    let map: HashMap<String, Value> = tags
        .and_then(|t| t.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), Value::string(s))))
                .collect()
        })
        .unwrap_or_default();
    Value::Map(map)
}

/// String field of an ARM JSON object
pub fn json_str(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
