//! Example sources embedded in JSON Schema documents (`example`, `examples`,
//! `default` and nested `properties`).

use serde_json::Value as JsonValue;

use crate::mock::example::{looks_like_json, ExampleSource, ExampleValue, Examples, NamedExample};

const MAX_DEPTH: usize = 16;

/// `None` when the text is not a JSON document (XSD, plain names, ...).
pub fn json_schema_source(text: &str) -> Option<ExampleSource> {
    if !looks_like_json(text) {
        return None;
    }
    let schema: JsonValue = serde_json::from_str(text.trim()).ok()?;
    Some(source_from_schema(&schema, 0))
}

fn source_from_schema(schema: &JsonValue, depth: usize) -> ExampleSource {
    let Some(obj) = schema.as_object() else {
        return ExampleSource::default();
    };

    let examples = match (obj.get("example"), obj.get("examples")) {
        (Some(example), _) => ExampleValue::from_json(example)
            .map(Examples::Single)
            .unwrap_or_default(),
        (None, Some(JsonValue::Array(list))) => Examples::from_list(
            list.iter()
                .filter_map(ExampleValue::from_json)
                .enumerate()
                .map(|(i, value)| NamedExample {
                    name: format!("example{}", i + 1),
                    value,
                })
                .collect(),
        ),
        _ => Examples::Absent,
    };

    let properties = match obj.get("properties") {
        Some(JsonValue::Object(props)) if depth < MAX_DEPTH => props
            .iter()
            .map(|(name, sub)| (name.clone(), source_from_schema(sub, depth + 1)))
            .collect(),
        _ => Vec::new(),
    };

    ExampleSource {
        default: obj.get("default").and_then(ExampleValue::from_json),
        examples,
        properties,
    }
}
