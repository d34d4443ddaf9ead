//! RAML 0.8: responses keyed by status code, bodies keyed by media type,
//! JSON Schema strings for body structure.

use std::collections::HashMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::mock::example::{ExampleSource, ExampleValue, Examples};

use super::errors::RamlError;
use super::schema::json_schema_source;
use super::shape::{
    as_mapping, base_path_from_uri, body_entries, default_media_types, key_str, named_entries,
    parse_resources, scalar_text, status_code, ApiShape, BodyDecl, HeaderDecl, Resource,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedParameter {
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub headers: Vec<(String, NamedParameter)>,
    pub bodies: Vec<(String, Body)>,
}

#[derive(Debug, Clone, Default)]
pub struct Method {
    pub responses: Vec<(u16, Response)>,
}

#[derive(Debug, Clone)]
pub struct Raml08Document {
    title: Option<String>,
    base_path: String,
    schemas: HashMap<String, String>,
    resources: Vec<Resource<Method>>,
}

impl Raml08Document {
    pub fn from_mapping(root: &Mapping) -> Result<Self, RamlError> {
        let version = root.get("version").and_then(scalar_text);
        let base_uri = root.get("baseUri").and_then(scalar_text);
        let media_types = default_media_types(root.get("mediaType"));

        let schemas = named_entries(root.get("schemas"))
            .into_iter()
            .filter_map(|(name, value)| scalar_text(&value).map(|text| (name, text)))
            .collect();

        let resources = parse_resources(root, "", &|value: &Value, location: &str| {
            parse_method(value, location, &media_types)
        })?;

        Ok(Raml08Document {
            title: root.get("title").and_then(scalar_text),
            base_path: base_path_from_uri(base_uri.as_deref(), version.as_deref()),
            schemas,
            resources,
        })
    }

    fn body_source(&self, body: &Body) -> ExampleSource {
        let schema = body
            .schema
            .as_ref()
            .and_then(scalar_text)
            .map(|text| self.schemas.get(text.trim()).cloned().unwrap_or(text))
            .and_then(|text| json_schema_source(&text))
            .unwrap_or_default();

        let examples = match body.example.as_ref().and_then(ExampleValue::from_yaml) {
            Some(example) => Examples::Single(example),
            None => schema.examples,
        };

        ExampleSource {
            default: schema.default,
            examples,
            properties: schema.properties,
        }
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
        parsed.push((status, parse_response(response, location, media_types)?));
    }
    Ok(Method { responses: parsed })
}

fn parse_response(value: &Value, location: &str, media_types: &[String]) -> Result<Response, RamlError> {
    let Some(response) = as_mapping(value, "response", location)? else {
        return Ok(Response::default());
    };

    let mut headers = Vec::new();
    if let Some(declared) = response.get("headers") {
        if let Some(declared) = as_mapping(declared, "headers", location)? {
            for (name, param) in declared {
                let Some(name) = key_str(name) else { continue };
                headers.push((name.to_string(), deserialize_or_default(param, location)?));
            }
        }
    }

    let mut bodies = Vec::new();
    if let Some(body) = response.get("body") {
        for (media_type, decl) in body_entries(body, media_types) {
            bodies.push((media_type, deserialize_or_default(decl, location)?));
        }
    }

    Ok(Response { headers, bodies })
}

fn deserialize_or_default<T>(value: &Value, location: &str) -> Result<T, RamlError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(value.clone())
        .map_err(|e| RamlError::invalid("declaration", location, e.to_string()))
}

impl ApiShape for Raml08Document {
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
            .map(|(media_type, body)| BodyDecl {
                media_type: media_type.clone(),
                example: self.body_source(body),
            })
            .collect()
    }

    fn headers(&self, response: &Response) -> Vec<HeaderDecl> {
        response
            .headers
            .iter()
            .map(|(name, param)| HeaderDecl {
                name: name.clone(),
                example: ExampleSource {
                    default: param.default.as_ref().and_then(ExampleValue::from_yaml),
                    examples: param
                        .example
                        .as_ref()
                        .and_then(ExampleValue::from_yaml)
                        .map(Examples::Single)
                        .unwrap_or_default(),
                    properties: Vec::new(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Raml08Document {
        let root: Mapping = serde_yaml::from_str(text).unwrap();
        Raml08Document::from_mapping(&root).unwrap()
    }

    const DOC: &str = r#"
title: Example
baseUri: http://example.com/{version}
version: v1
schemas:
  - resource: |
      {
        "type": "object",
        "properties": {
          "stringProperty": { "type": "string", "example": "foo" },
          "numberProperty": { "type": "number", "example": 23 }
        }
      }
/test:
  get:
    responses:
      200:
        headers:
          X-Rate:
            default: "10"
            example: "20"
        body:
          application/json:
            example: |
              {"success": true}
      404:
/schema:
  get:
    responses:
      200:
        body:
          application/json:
            schema: resource
"#;

    #[test]
    fn parses_responses_in_document_order() {
        let doc = load(DOC);
        assert_eq!(doc.base_path(), "/v1");
        let (_, method) = &doc.resources()[0].methods[0];
        let statuses: Vec<u16> = doc.responses(method).iter().map(|(s, _)| *s).collect();
        assert_eq!(statuses, vec![200, 404]);
    }

    #[test]
    fn body_example_is_kept_raw() {
        let doc = load(DOC);
        let (_, method) = &doc.resources()[0].methods[0];
        let (_, response) = doc.responses(method)[0];
        let body = doc.body(response, "application/json").unwrap();
        assert_eq!(
            body.example.examples,
            Examples::Single(ExampleValue::Raw("{\"success\": true}\n".into()))
        );
    }

    #[test]
    fn header_default_and_example() {
        let doc = load(DOC);
        let (_, method) = &doc.resources()[0].methods[0];
        let (_, response) = doc.responses(method)[0];
        let headers = doc.headers(response);
        assert_eq!(headers[0].name, "X-Rate");
        assert_eq!(headers[0].example.default, Some(ExampleValue::Raw("10".into())));
    }

    #[test]
    fn named_schema_supplies_property_examples() {
        let doc = load(DOC);
        let (_, method) = &doc.resources()[1].methods[0];
        let (_, response) = doc.responses(method)[0];
        let body = doc.body(response, "application/json").unwrap();
        let names: Vec<_> = body.example.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["stringProperty", "numberProperty"]);
    }

    #[test]
    fn malformed_responses_are_rejected() {
        let root: Mapping = serde_yaml::from_str("/x:\n  get:\n    responses: [200]\n").unwrap();
        assert!(Raml08Document::from_mapping(&root).is_err());
    }
}
