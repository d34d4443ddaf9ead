use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::mock::example::ExampleSource;

use super::errors::RamlError;

pub const HTTP_METHODS: [&str; 9] = [
    "get", "post", "put", "delete", "patch", "head", "options", "trace", "connect",
];

/// A resource as declared in the document: its relative URI, its methods in
/// document order and its nested resources.
#[derive(Debug, Clone)]
pub struct Resource<M> {
    pub relative_uri: String,
    pub methods: Vec<(String, M)>,
    pub children: Vec<Resource<M>>,
}

/// One representation of a response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyDecl {
    pub media_type: String,
    pub example: ExampleSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderDecl {
    pub name: String,
    pub example: ExampleSource,
}

/// Read access to a parsed RAML document, implemented once per version shape.
///
/// Mock construction only goes through this trait, so it never needs to know
/// whether it is looking at a 0.8 or a 1.0 document.
pub trait ApiShape {
    type Method;
    type Response;

    fn title(&self) -> Option<&str>;

    /// Mount path derived from `baseUri`; empty for the root.
    fn base_path(&self) -> String;

    fn resources(&self) -> &[Resource<Self::Method>];

    /// Declared responses in document order.
    fn responses<'a>(&'a self, method: &'a Self::Method) -> Vec<(u16, &'a Self::Response)>;

    /// Bodies of a response, at most one per media type.
    fn bodies(&self, response: &Self::Response) -> Vec<BodyDecl>;

    fn headers(&self, response: &Self::Response) -> Vec<HeaderDecl>;

    fn body(&self, response: &Self::Response, media_type: &str) -> Option<BodyDecl> {
        self.bodies(response)
            .into_iter()
            .find(|b| b.media_type.eq_ignore_ascii_case(media_type))
    }
}

pub fn key_str(key: &Value) -> Option<&str> {
    match key {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Response keys are usually YAML integers but may be quoted.
pub fn status_code(key: &Value) -> Option<u16> {
    match key {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_mapping<'a>(
    value: &'a Value,
    what: &'static str,
    location: &str,
) -> Result<Option<&'a Mapping>, RamlError> {
    match value {
        Value::Null => Ok(None),
        Value::Mapping(map) => Ok(Some(map)),
        Value::Tagged(tagged) => as_mapping(&tagged.value, what, location),
        _ => Err(RamlError::invalid(what, location, "expected a mapping")),
    }
}

/// Splits a resource mapping into its methods and nested resources.
pub fn parse_resources<M, F>(
    map: &Mapping,
    parent: &str,
    parse_method: &F,
) -> Result<Vec<Resource<M>>, RamlError>
where
    F: Fn(&Value, &str) -> Result<M, RamlError>,
{
    let mut resources = Vec::new();
    for (key, value) in map {
        let Some(relative_uri) = key_str(key).filter(|k| k.starts_with('/')) else {
            continue;
        };
        let full = format!("{}{}", parent, relative_uri);
        let body = as_mapping(value, "resource", &full)?;

        let mut methods = Vec::new();
        let mut children = Vec::new();
        if let Some(body) = body {
            for (method_key, method_value) in body {
                let Some(name) = key_str(method_key) else {
                    continue;
                };
                if HTTP_METHODS.contains(&name) {
                    let location = format!("{} {}", name.to_ascii_uppercase(), full);
                    methods.push((name.to_string(), parse_method(method_value, &location)?));
                }
            }
            children = parse_resources(body, &full, parse_method)?;
        }

        resources.push(Resource {
            relative_uri: relative_uri.to_string(),
            methods,
            children,
        });
    }
    Ok(resources)
}

/// Named declarations given either as a mapping (1.0) or as a list of
/// single-key mappings (0.8 `schemas`, `traits`, `resourceTypes`).
pub fn named_entries(value: Option<&Value>) -> Vec<(String, Value)> {
    let collect = |map: &Mapping| -> Vec<(String, Value)> {
        map.iter()
            .filter_map(|(k, v)| key_str(k).map(|k| (k.to_string(), v.clone())))
            .collect()
    };
    match value {
        Some(Value::Mapping(map)) => collect(map),
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(Value::as_mapping)
            .flat_map(collect)
            .collect(),
        _ => Vec::new(),
    }
}

/// Root `mediaType` (a string or a list); JSON when not declared.
pub fn default_media_types(value: Option<&Value>) -> Vec<String> {
    let types: Vec<String> = match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    };
    if types.is_empty() {
        vec!["application/json".to_string()]
    } else {
        types
    }
}

/// Splits a `body` declaration into `(media type, declaration)` pairs. A body
/// without media type keys applies to every default media type.
pub fn body_entries<'a>(body: &'a Value, default_types: &[String]) -> Vec<(String, &'a Value)> {
    let is_media_type = |k: &Value| key_str(k).is_some_and(|k| k.contains('/'));
    match body {
        Value::Null => Vec::new(),
        Value::Mapping(map) if map.keys().any(is_media_type) => map
            .iter()
            .filter(|(k, _)| is_media_type(*k))
            .filter_map(|(k, v)| key_str(k).map(|k| (k.to_string(), v)))
            .collect(),
        other => default_types.iter().map(|t| (t.clone(), other)).collect(),
    }
}

/// Turns a `baseUri` into a mount path: drops scheme and authority,
/// substitutes `{version}` and trims the trailing slash.
pub fn base_path_from_uri(base_uri: Option<&str>, version: Option<&str>) -> String {
    let Some(uri) = base_uri.map(str::trim).filter(|u| !u.is_empty()) else {
        return String::new();
    };

    let path = match uri.find("//") {
        Some(idx) if uri[..idx].chars().all(|c| c.is_ascii_alphanumeric() || c == ':') => {
            let rest = &uri[idx + 2..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        _ => uri,
    };

    let mut path = match version {
        Some(version) => path.replace("{version}", version),
        None => path.to_string(),
    };
    while path.ends_with('/') {
        path.pop();
    }
    if !path.is_empty() && !path.starts_with('/') {
        path.insert(0, '/');
    }
    path
}

/// Scalar YAML value as text (`version: 1` is a number, `version: v1` a string).
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}
