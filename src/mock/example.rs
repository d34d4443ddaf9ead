use rand::Rng;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};
use serde_yaml::Value as YamlValue;

/// Source of randomness used when a node declares several undistinguished examples.
///
/// Any `Fn(usize) -> usize` is a picker, which lets tests pin the selection.
pub trait ExamplePicker: Send + Sync {
    /// Returns an index in `0..len`. `len` is always at least 1.
    fn pick(&self, len: usize) -> usize;
}

impl<F> ExamplePicker for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn pick(&self, len: usize) -> usize {
        self(len)
    }
}

/// Uniform choice backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngPicker;

impl ExamplePicker for ThreadRngPicker {
    fn pick(&self, len: usize) -> usize {
        if len <= 1 {
            0
        } else {
            rand::thread_rng().gen_range(0..len)
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExtractError {
    #[error("example contains a non-finite number ({0})")]
    NonFiniteNumber(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
}

/// Structured example tree. Mappings keep document order.
#[derive(Debug, Clone, PartialEq)]
pub enum DataNode {
    Scalar(Scalar),
    Sequence(Vec<DataNode>),
    Mapping(Vec<(String, DataNode)>),
}

impl DataNode {
    pub fn from_yaml(value: &YamlValue) -> DataNode {
        match value {
            YamlValue::Null => DataNode::Scalar(Scalar::Null),
            YamlValue::Bool(b) => DataNode::Scalar(Scalar::Bool(*b)),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DataNode::Scalar(Scalar::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    DataNode::Scalar(Scalar::Unsigned(u))
                } else {
                    DataNode::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            YamlValue::String(s) => DataNode::Scalar(Scalar::String(s.clone())),
            YamlValue::Sequence(items) => {
                DataNode::Sequence(items.iter().map(DataNode::from_yaml).collect())
            }
            YamlValue::Mapping(map) => DataNode::Mapping(
                map.iter()
                    .map(|(k, v)| (yaml_key(k), DataNode::from_yaml(v)))
                    .collect(),
            ),
            YamlValue::Tagged(tagged) => DataNode::from_yaml(&tagged.value),
        }
    }

    pub fn from_json(value: &JsonValue) -> DataNode {
        match value {
            JsonValue::Null => DataNode::Scalar(Scalar::Null),
            JsonValue::Bool(b) => DataNode::Scalar(Scalar::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DataNode::Scalar(Scalar::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    DataNode::Scalar(Scalar::Unsigned(u))
                } else {
                    DataNode::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            JsonValue::String(s) => DataNode::Scalar(Scalar::String(s.clone())),
            JsonValue::Array(items) => {
                DataNode::Sequence(items.iter().map(DataNode::from_json).collect())
            }
            JsonValue::Object(map) => DataNode::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), DataNode::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Single recursive conversion into a plain JSON value.
    pub fn to_json(&self) -> Result<JsonValue, ExtractError> {
        match self {
            DataNode::Scalar(scalar) => scalar_to_json(scalar),
            DataNode::Sequence(items) => items
                .iter()
                .map(DataNode::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            DataNode::Mapping(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, node) in entries {
                    map.insert(key.clone(), node.to_json()?);
                }
                Ok(JsonValue::Object(map))
            }
        }
    }
}

impl Serialize for DataNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataNode::Scalar(scalar) => scalar.serialize(serializer),
            DataNode::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            DataNode::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, node) in entries {
                    map.serialize_entry(key, node)?;
                }
                map.end()
            }
        }
    }
}

fn scalar_to_json(scalar: &Scalar) -> Result<JsonValue, ExtractError> {
    Ok(match scalar {
        Scalar::Null => JsonValue::Null,
        Scalar::Bool(b) => JsonValue::Bool(*b),
        Scalar::Integer(i) => JsonValue::Number((*i).into()),
        Scalar::Unsigned(u) => JsonValue::Number((*u).into()),
        Scalar::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or(ExtractError::NonFiniteNumber(*f))?,
        Scalar::String(s) => JsonValue::String(s.clone()),
    })
}

fn yaml_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Tagged(tagged) => yaml_key(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// A declared example value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExampleValue {
    /// Text written byte-for-byte (pre-formatted JSON, XML, plain strings).
    Raw(String),
    Structured(DataNode),
}

impl ExampleValue {
    /// `None` for a null example, which RAML treats as "not declared".
    pub fn from_yaml(value: &YamlValue) -> Option<ExampleValue> {
        match value {
            YamlValue::Null => None,
            YamlValue::String(s) => Some(ExampleValue::Raw(s.clone())),
            YamlValue::Tagged(tagged) => ExampleValue::from_yaml(&tagged.value),
            other => Some(ExampleValue::Structured(DataNode::from_yaml(other))),
        }
    }

    pub fn from_json(value: &JsonValue) -> Option<ExampleValue> {
        match value {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(ExampleValue::Raw(s.clone())),
            other => Some(ExampleValue::Structured(DataNode::from_json(other))),
        }
    }

    /// Value used when this example is nested inside a generated mapping.
    /// Pre-formatted JSON text is embedded as structure rather than as an escaped string.
    pub fn to_json(&self) -> Result<JsonValue, ExtractError> {
        match self {
            ExampleValue::Raw(text) => {
                if looks_like_json(text) {
                    if let Ok(parsed) = serde_json::from_str(text) {
                        return Ok(parsed);
                    }
                }
                Ok(JsonValue::String(text.clone()))
            }
            ExampleValue::Structured(node) => node.to_json(),
        }
    }

    /// Text form used for header values.
    pub fn to_text(&self) -> Result<String, ExtractError> {
        match self {
            ExampleValue::Raw(text) => Ok(text.clone()),
            ExampleValue::Structured(DataNode::Scalar(Scalar::String(s))) => Ok(s.clone()),
            ExampleValue::Structured(node) => Ok(node.to_json()?.to_string()),
        }
    }
}

pub fn looks_like_json(text: &str) -> bool {
    let t = text.trim();
    (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']'))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedExample {
    pub name: String,
    pub value: ExampleValue,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Examples {
    #[default]
    Absent,
    Single(ExampleValue),
    Multiple(Vec<NamedExample>),
}

impl Examples {
    pub fn from_list(mut list: Vec<NamedExample>) -> Examples {
        match list.len() {
            0 => Examples::Absent,
            1 => Examples::Single(list.remove(0).value),
            _ => Examples::Multiple(list),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Examples::Absent)
    }

    /// Chooses the example to use for one extraction.
    pub fn choose(&self, picker: &dyn ExamplePicker) -> Option<&ExampleValue> {
        match self {
            Examples::Absent => None,
            Examples::Single(value) => Some(value),
            Examples::Multiple(list) if list.is_empty() => None,
            Examples::Multiple(list) => {
                let idx = picker.pick(list.len()).min(list.len() - 1);
                Some(&list[idx].value)
            }
        }
    }
}

/// Everything a header, body or property declares that can produce a mock value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExampleSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ExampleValue>,
    #[serde(skip_serializing_if = "Examples::is_absent")]
    pub examples: Examples,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<(String, ExampleSource)>,
}

impl ExampleSource {
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.examples.is_absent() && self.properties.is_empty()
    }

    /// Default wins over examples.
    fn declared(&self, picker: &dyn ExamplePicker) -> Option<&ExampleValue> {
        self.default.as_ref().or_else(|| self.examples.choose(picker))
    }
}

/// Body content produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(JsonValue),
}

impl Payload {
    pub fn into_string(self) -> String {
        match self {
            Payload::Text(text) => text,
            Payload::Json(value) => value.to_string(),
        }
    }
}

pub fn extract_header(
    source: &ExampleSource,
    picker: &dyn ExamplePicker,
) -> Result<Option<String>, ExtractError> {
    source.declared(picker).map(ExampleValue::to_text).transpose()
}

/// Resolves the body for a negotiated representation. `None` means no body is written.
pub fn extract_body(
    source: &ExampleSource,
    picker: &dyn ExamplePicker,
) -> Result<Option<Payload>, ExtractError> {
    if let Some(example) = source.declared(picker) {
        return match example {
            ExampleValue::Raw(text) => Ok(Some(Payload::Text(text.clone()))),
            ExampleValue::Structured(node) => Ok(Some(Payload::Json(node.to_json()?))),
        };
    }
    Ok(extract_properties(&source.properties, picker)?.map(Payload::Json))
}

fn extract_value(
    source: &ExampleSource,
    picker: &dyn ExamplePicker,
) -> Result<Option<JsonValue>, ExtractError> {
    if let Some(example) = source.declared(picker) {
        return example.to_json().map(Some);
    }
    extract_properties(&source.properties, picker)
}

fn extract_properties(
    properties: &[(String, ExampleSource)],
    picker: &dyn ExamplePicker,
) -> Result<Option<JsonValue>, ExtractError> {
    let mut map = Map::new();
    for (name, property) in properties {
        if let Some(value) = extract_value(property, picker)? {
            map.insert(name.clone(), value);
        }
    }
    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(JsonValue::Object(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn yaml(text: &str) -> YamlValue {
        serde_yaml::from_str(text).unwrap()
    }

    fn single(value: ExampleValue) -> ExampleSource {
        ExampleSource {
            examples: Examples::Single(value),
            ..Default::default()
        }
    }

    fn named(list: &[&str]) -> Examples {
        Examples::from_list(
            list.iter()
                .enumerate()
                .map(|(i, v)| NamedExample {
                    name: format!("example{i}"),
                    value: ExampleValue::Raw(v.to_string()),
                })
                .collect(),
        )
    }

    #[test]
    fn header_default_wins_over_example() {
        let source = ExampleSource {
            default: Some(ExampleValue::Raw("test".into())),
            examples: Examples::Single(ExampleValue::Raw("bar".into())),
            properties: vec![],
        };
        assert_eq!(
            extract_header(&source, &ThreadRngPicker).unwrap(),
            Some("test".to_string())
        );
    }

    #[test]
    fn header_without_example_is_absent() {
        let source = ExampleSource::default();
        assert_eq!(extract_header(&source, &ThreadRngPicker).unwrap(), None);
    }

    #[test]
    fn structured_header_scalar_is_unquoted() {
        let source = single(ExampleValue::from_yaml(&yaml("42")).unwrap());
        assert_eq!(
            extract_header(&source, &ThreadRngPicker).unwrap(),
            Some("42".to_string())
        );
    }

    #[test]
    fn raw_json_body_is_written_verbatim() {
        let text = "{\"success\": true}";
        let source = single(ExampleValue::Raw(text.into()));
        let payload = extract_body(&source, &ThreadRngPicker).unwrap().unwrap();
        assert_eq!(payload.into_string(), text);
    }

    #[test]
    fn raw_xml_body_is_never_json_encoded() {
        let text = "<resource><id>1</id></resource>";
        let source = single(ExampleValue::Raw(text.into()));
        let payload = extract_body(&source, &ThreadRngPicker).unwrap().unwrap();
        assert_eq!(payload.into_string(), text);
    }

    #[test]
    fn structured_body_serializes_to_equivalent_json() {
        let value = ExampleValue::from_yaml(&yaml("nested:\n  success: true\nlist: [1, 2]")).unwrap();
        let source = single(value);
        let body = extract_body(&source, &ThreadRngPicker)
            .unwrap()
            .unwrap()
            .into_string();
        let parsed: JsonValue = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, json!({"nested": {"success": true}, "list": [1, 2]}));
    }

    #[test]
    fn boolean_body_example() {
        let source = single(ExampleValue::from_yaml(&yaml("true")).unwrap());
        let body = extract_body(&source, &ThreadRngPicker).unwrap().unwrap();
        assert_eq!(body.into_string(), "true");
    }

    #[test]
    fn property_examples_skip_properties_without_one() {
        let source = ExampleSource {
            properties: vec![
                ("name".into(), single(ExampleValue::Raw("Kendrick".into()))),
                ("age".into(), single(ExampleValue::from_yaml(&yaml("10")).unwrap())),
                ("nickname".into(), ExampleSource::default()),
                (
                    "object".into(),
                    single(ExampleValue::Raw("{\"foo\": 1, \"bar\": 2}".into())),
                ),
            ],
            ..Default::default()
        };
        let body = extract_body(&source, &ThreadRngPicker).unwrap().unwrap();
        assert_eq!(
            body,
            Payload::Json(json!({"name": "Kendrick", "age": 10, "object": {"foo": 1, "bar": 2}}))
        );
    }

    #[test]
    fn nested_property_examples_build_nested_mapping() {
        let inner = ExampleSource {
            properties: vec![("success".into(), single(ExampleValue::from_yaml(&yaml("true")).unwrap()))],
            ..Default::default()
        };
        let source = ExampleSource {
            properties: vec![("nested".into(), inner)],
            ..Default::default()
        };
        let body = extract_body(&source, &ThreadRngPicker).unwrap().unwrap();
        assert_eq!(body, Payload::Json(json!({"nested": {"success": true}})));
    }

    #[test]
    fn no_example_anywhere_means_no_body() {
        let source = ExampleSource {
            properties: vec![("id".into(), ExampleSource::default())],
            ..Default::default()
        };
        assert_eq!(extract_body(&source, &ThreadRngPicker).unwrap(), None);
    }

    #[test]
    fn multiple_examples_stay_within_declared_set() {
        let declared = ["bar", "foo", "random", "another"];
        let source = ExampleSource {
            examples: named(&declared),
            ..Default::default()
        };
        for _ in 0..50 {
            let value = extract_header(&source, &ThreadRngPicker).unwrap().unwrap();
            assert!(declared.contains(&value.as_str()), "unexpected {value}");
        }
    }

    #[test]
    fn injected_picker_selects_exact_example() {
        let source = ExampleSource {
            examples: named(&["first", "second", "third"]),
            ..Default::default()
        };
        let picker = |_len: usize| 2;
        assert_eq!(
            extract_header(&source, &picker).unwrap(),
            Some("third".to_string())
        );
    }

    #[test]
    fn out_of_range_pick_is_clamped() {
        let examples = named(&["a", "b"]);
        let picker = |len: usize| len + 10;
        assert_eq!(
            examples.choose(&picker),
            Some(&ExampleValue::Raw("b".into()))
        );
    }

    #[test]
    fn single_example_is_stable() {
        let source = single(ExampleValue::Raw("stable".into()));
        let first = extract_header(&source, &ThreadRngPicker).unwrap();
        for _ in 0..10 {
            assert_eq!(extract_header(&source, &ThreadRngPicker).unwrap(), first);
        }
    }

    #[test]
    fn non_finite_number_is_an_extraction_error() {
        let source = single(ExampleValue::Structured(DataNode::Scalar(Scalar::Float(f64::NAN))));
        assert!(matches!(
            extract_body(&source, &ThreadRngPicker),
            Err(ExtractError::NonFiniteNumber(_))
        ));
    }

    #[test]
    fn null_example_counts_as_absent() {
        assert_eq!(ExampleValue::from_yaml(&YamlValue::Null), None);
    }
}
