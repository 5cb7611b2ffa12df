//! Type-safe schema generation for OpenAI structured outputs.
//!
//! Uses the `schemars` crate to generate JSON schemas from Rust types, then
//! rewrites them into the dialect OpenAI's strict mode accepts:
//! `additionalProperties: false` everywhere, every property listed in
//! `required`, and all `$ref`s inlined.

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types usable as OpenAI structured output.
///
/// Blanket-implemented for any `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate an OpenAI-strict-mode-compatible JSON schema for this type.
    fn openai_schema() -> serde_json::Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        rewrite(&mut value, definitions.as_ref());

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    /// Schema name for this type.
    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Single recursive pass: inline `$ref`s from `definitions`, force
/// `additionalProperties: false` on object schemas, and mirror every
/// property into `required` (strict mode rejects optional properties;
/// optionality is expressed through nullable types instead).
fn rewrite(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.and_then(|d| d.get(name)) {
                        *value = def.clone();
                        rewrite(value, definitions);
                        return;
                    }
                }
            }

            if map.get("type") == Some(&serde_json::Value::String("object".into())) {
                map.insert("additionalProperties".into(), serde_json::Value::Bool(false));
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".into(), serde_json::Value::Array(all));
                }
            }

            for (_, v) in map.iter_mut() {
                rewrite(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                rewrite(item, definitions);
            }
        }
        _ => {}
    }
}
