//! RAML 1.0: bodies and headers are type declarations, examples may come from
//! the declaration itself, from named `types`/`schemas`, or from per-property
//! examples.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::mock::example::{ExampleSource, ExampleValue, Examples, NamedExample};

use super::errors::RamlError;
use super::schema::json_schema_source;
use super::shape::{
    as_mapping, base_path_from_uri, body_entries, default_media_types, key_str, named_entries,
    parse_resources, scalar_text, status_code, ApiShape, BodyDecl, HeaderDecl, Resource,
};

const MAX_TYPE_DEPTH: usize = 16;

const BUILTIN_TYPES: [&str; 13] = [
    "any",
    "object",
    "array",
    "string",
    "number",
    "integer",
    "boolean",
    "date-only",
    "time-only",
    "datetime-only",
    "datetime",
    "file",
    "nil",
];

/// Facets allowed next to `value` in the expanded example form.
const EXAMPLE_FACETS: [&str; 4] = ["value", "displayName", "description", "strict"];

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named(String),
    Inline(Box<TypeDecl>),
    JsonSchema(String),
}

/// The parts of a type declaration that can contribute an example.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDecl {
    pub bases: Vec<TypeRef>,
    pub default: Option<ExampleValue>,
    pub examples: Examples,
    pub properties: Vec<(String, TypeDecl)>,
}

impl TypeDecl {
    pub fn parse(value: &Value) -> TypeDecl {
        match value {
            Value::Null => TypeDecl::default(),
            Value::Tagged(tagged) => TypeDecl::parse(&tagged.value),
            Value::Mapping(map) => TypeDecl::from_mapping(map),
            other => TypeDecl {
                bases: scalar_text(other).and_then(|t| type_ref(&t)).into_iter().collect(),
                ..TypeDecl::default()
            },
        }
    }

    fn from_mapping(map: &Mapping) -> TypeDecl {
        let mut bases = Vec::new();
        for key in ["type", "schema"] {
            match map.get(key) {
                Some(Value::Sequence(items)) => bases.extend(
                    items
                        .iter()
                        .filter_map(scalar_text)
                        .filter_map(|t| type_ref(&t)),
                ),
                Some(Value::Mapping(inline)) => {
                    bases.push(TypeRef::Inline(Box::new(TypeDecl::from_mapping(inline))))
                }
                Some(other) => bases.extend(scalar_text(other).and_then(|t| type_ref(&t))),
                None => {}
            }
        }

        let examples = match (map.get("example"), map.get("examples")) {
            (Some(example), _) => example_value(example)
                .map(Examples::Single)
                .unwrap_or_default(),
            (None, Some(examples)) => named_examples(examples),
            (None, None) => Examples::Absent,
        };

        let properties = match map.get("properties") {
            Some(Value::Mapping(props)) => props
                .iter()
                .filter_map(|(name, decl)| {
                    let name = key_str(name)?;
                    let name = name.strip_suffix('?').unwrap_or(name);
                    Some((name.to_string(), TypeDecl::parse(decl)))
                })
                .collect(),
            _ => Vec::new(),
        };

        TypeDecl {
            bases,
            default: map.get("default").and_then(ExampleValue::from_yaml),
            examples,
            properties,
        }
    }
}

/// Plain type names become references. Arrays, unions and builtins carry no
/// examples of their own.
fn type_ref(expr: &str) -> Option<TypeRef> {
    let expr = expr.trim();
    if expr.starts_with('{') {
        return Some(TypeRef::JsonSchema(expr.to_string()));
    }
    if expr.is_empty()
        || expr.starts_with('<')
        || expr.ends_with("[]")
        || expr.contains('|')
        || BUILTIN_TYPES.contains(&expr)
    {
        return None;
    }
    Some(TypeRef::Named(expr.trim_matches(|c| c == '(' || c == ')').to_string()))
}

/// `{ value: ..., strict: false }` carries the example under `value`.
fn unwrap_expanded(value: &Value) -> &Value {
    if let Value::Mapping(map) = value {
        let expanded = map.contains_key("value")
            && map.keys().all(|k| {
                key_str(k).is_some_and(|k| EXAMPLE_FACETS.contains(&k) || k.starts_with('('))
            });
        if expanded {
            if let Some(inner) = map.get("value") {
                return inner;
            }
        }
    }
    value
}

fn example_value(value: &Value) -> Option<ExampleValue> {
    ExampleValue::from_yaml(unwrap_expanded(value))
}

fn named_examples(value: &Value) -> Examples {
    let list = match value {
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(name, example)| {
                Some(NamedExample {
                    name: scalar_text(name)?,
                    value: example_value(example)?,
                })
            })
            .collect(),
        Value::Sequence(items) => items
            .iter()
            .filter_map(example_value)
            .enumerate()
            .map(|(i, value)| NamedExample {
                name: format!("example{}", i + 1),
                value,
            })
            .collect(),
        _ => Vec::new(),
    };
    Examples::from_list(list)
}

/// Fills whatever `own` leaves undeclared from `base`.
fn inherit(own: &mut ExampleSource, base: ExampleSource) {
    if own.default.is_none() {
        own.default = base.default;
    }
    if own.examples.is_absent() {
        own.examples = base.examples;
    }
    for (name, inherited) in base.properties {
        match own.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => inherit(existing, inherited),
            None => own.properties.push((name, inherited)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub headers: Vec<(String, TypeDecl)>,
    pub bodies: Vec<(String, TypeDecl)>,
}

#[derive(Debug, Clone, Default)]
pub struct Method {
    pub responses: Vec<(u16, Response)>,
}

#[derive(Debug, Clone)]
pub struct Raml10Document {
    title: Option<String>,
    base_path: String,
    types: HashMap<String, TypeDecl>,
    resources: Vec<Resource<Method>>,
}

impl Raml10Document {
    pub fn from_mapping(root: &Mapping) -> Result<Self, RamlError> {
        let version = root.get("version").and_then(scalar_text);
        let base_uri = root.get("baseUri").and_then(scalar_text);
        let media_types = default_media_types(root.get("mediaType"));

        let mut types = HashMap::new();
        for key in ["schemas", "types"] {
            for (name, decl) in named_entries(root.get(key)) {
                types.insert(name, TypeDecl::parse(&decl));
            }
        }

        let resources = parse_resources(root, "", &|value: &Value, location: &str| {
            parse_method(value, location, &media_types)
        })?;

        Ok(Raml10Document {
            title: root.get("title").and_then(scalar_text),
            base_path: base_path_from_uri(base_uri.as_deref(), version.as_deref()),
            types,
            resources,
        })
    }

    /// Resolves a declaration against its base types, own facets first.
    pub fn source_for(&self, decl: &TypeDecl) -> ExampleSource {
        self.resolve(decl, 0, &mut Vec::new())
    }

    /// `active` holds the named types being expanded; meeting one of them
    /// again contributes nothing.
    fn resolve(&self, decl: &TypeDecl, depth: usize, active: &mut Vec<String>) -> ExampleSource {
        let mut source = ExampleSource {
            default: decl.default.clone(),
            examples: decl.examples.clone(),
            properties: Vec::new(),
        };
        if depth >= MAX_TYPE_DEPTH {
            warn!(depth, "type inheritance too deep, ignoring further bases");
            return source;
        }

        source.properties = decl
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), self.resolve(prop, depth + 1, active)))
            .collect();

        for base in &decl.bases {
            let inherited = match base {
                TypeRef::Named(name) if active.contains(name) => {
                    debug!(%name, "recursive type reference, not expanded");
                    continue;
                }
                TypeRef::Named(name) => match self.types.get(name) {
                    Some(named) => {
                        active.push(name.clone());
                        let resolved = self.resolve(named, depth + 1, active);
                        active.pop();
                        resolved
                    }
                    None => {
                        debug!(%name, "type is not declared in this document");
                        continue;
                    }
                },
                TypeRef::Inline(inline) => self.resolve(inline, depth + 1, active),
                TypeRef::JsonSchema(text) => json_schema_source(text).unwrap_or_default(),
            };
            inherit(&mut source, inherited);
        }
        source
    }
}

fn parse_method(value: &Value, location: &str, media_types: &[String]) -> Result<Method, RamlError> {
    let Some(method) = as_mapping(value, "method", location)? else {
        return Ok(Method::default());
    };
    let Some(responses) = method.get("responses") else {
        return Ok(Method::default());
    };
    let Some(responses) = as_mapping(responses, "responses", location)? else {
        return Ok(Method::default());
    };

    let mut parsed = Vec::with_capacity(responses.len());
    for (key, response) in responses {
        let Some(status) = status_code(key) else {
            warn!(%location, key = ?key, "skipping response with a non-numeric status code");
            continue;
        };
        let Some(response) = as_mapping(response, "response", location)? else {
            parsed.push((status, Response::default()));
            continue;
        };

        let headers = match response.get("headers") {
            Some(headers) => as_mapping(headers, "headers", location)?
                .map(|headers| {
                    headers
                        .iter()
                        .filter_map(|(name, decl)| {
                            Some((key_str(name)?.to_string(), TypeDecl::parse(decl)))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let bodies = match response.get("body") {
            Some(body) => body_entries(body, media_types)
                .into_iter()
                .map(|(media_type, decl)| (media_type, TypeDecl::parse(decl)))
                .collect(),
            None => Vec::new(),
        };

        parsed.push((status, Response { headers, bodies }));
    }
    Ok(Method { responses: parsed })
}

impl ApiShape for Raml10Document {
    type Method = Method;
    type Response = Response;

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn base_path(&self) -> String {
        self.base_path.clone()
    }

    fn resources(&self) -> &[Resource<Method>] {
        &self.resources
    }

    fn responses<'a>(&'a self, method: &'a Method) -> Vec<(u16, &'a Response)> {
        method.responses.iter().map(|(status, r)| (*status, r)).collect()
    }

    fn bodies(&self, response: &Response) -> Vec<BodyDecl> {
        response
            .bodies
            .iter()
            .map(|(media_type, decl)| BodyDecl {
                media_type: media_type.clone(),
                example: self.source_for(decl),
            })
            .collect()
    }

    fn headers(&self, response: &Response) -> Vec<HeaderDecl> {
        response
            .headers
            .iter()
            .map(|(name, decl)| HeaderDecl {
                name: name.clone(),
                example: self.source_for(decl),
            })
            .collect()
    }
}
