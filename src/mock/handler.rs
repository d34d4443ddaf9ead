use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::options::MockOptions;
use crate::http::request::Request;
use crate::raml::shape::{ApiShape, BodyDecl, HeaderDecl};

use super::example::{extract_body, extract_header, ExamplePicker};
use super::negotiate::negotiate;
use super::selector::{select, DeclaredStatus, PreferredResponses, PREFERRED_RESPONSES_HEADER};

/// One declared response with everything a request needs already resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledResponse {
    pub status: u16,
    pub headers: Vec<HeaderDecl>,
    pub bodies: Vec<BodyDecl>,
    /// Declared media types in document order, used for negotiation.
    pub media_types: Vec<String>,
}

impl DeclaredStatus for CompiledResponse {
    fn status(&self) -> u16 {
        self.status
    }
}

impl CompiledResponse {
    fn body_for(&self, media_type: &str) -> Option<&BodyDecl> {
        self.bodies
            .iter()
            .find(|b| b.media_type.eq_ignore_ascii_case(media_type))
    }
}

/// What the transport writes back: status first, then headers, then the
/// optional typed body, possibly after a delay.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub delay: Option<Duration>,
}

/// Canned responses for one operation.
#[derive(Clone, Serialize)]
pub struct MockHandler {
    pub method: String,
    /// Resource path as declared, without the base path.
    pub route: String,
    /// Mount prefix stripped from the concrete path before override lookup.
    pub base_path: String,
    pub responses: Vec<CompiledResponse>,
    #[serde(skip)]
    options: MockOptions,
    #[serde(skip)]
    picker: Arc<dyn ExamplePicker>,
}

impl fmt::Debug for MockHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandler")
            .field("method", &self.method)
            .field("route", &self.route)
            .field("base_path", &self.base_path)
            .field("responses", &self.responses)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MockHandler {
    pub fn build<S: ApiShape>(
        shape: &S,
        method: &str,
        route: &str,
        operation: &S::Method,
        options: &MockOptions,
        picker: Arc<dyn ExamplePicker>,
    ) -> Self {
        let responses = shape
            .responses(operation)
            .into_iter()
            .map(|(status, response)| {
                let mut bodies: Vec<BodyDecl> = Vec::new();
                for body in shape.bodies(response) {
                    if bodies
                        .iter()
                        .any(|b| b.media_type.eq_ignore_ascii_case(&body.media_type))
                    {
                        warn!(%method, %route, media_type = %body.media_type, "duplicate body media type ignored");
                        continue;
                    }
                    bodies.push(body);
                }
                CompiledResponse {
                    status,
                    headers: shape.headers(response),
                    media_types: bodies.iter().map(|b| b.media_type.clone()).collect(),
                    bodies,
                }
            })
            .collect();

        MockHandler {
            method: method.to_ascii_uppercase(),
            route: route.to_string(),
            base_path: String::new(),
            responses,
            options: options.clone(),
            picker,
        }
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.to_string();
        self
    }

    /// Concrete request path below the mount prefix, `/` for the prefix itself.
    fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        match path.strip_prefix(self.base_path.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }

    fn preferred_status(&self, request: &Request) -> Option<u16> {
        if self.options.ignore_preferred_responses {
            return None;
        }
        let preferred = PreferredResponses::parse(request.header(PREFERRED_RESPONSES_HEADER)?)?;
        let concrete = self.relative_path(&request.path);
        preferred.status_for(&self.method, &[self.route.as_str(), concrete])
    }

    /// Never fails: extraction problems degrade to a skipped header or an
    /// empty body.
    pub fn respond(&self, request: &Request) -> MockResponse {
        let selection = select(&self.responses, self.preferred_status(request));
        debug!(method = %self.method, route = %self.route, status = selection.status, "selected response");

        let mut response = MockResponse {
            status: selection.status,
            headers: Vec::new(),
            content_type: None,
            body: None,
            delay: self.options.delay,
        };
        let Some(declared) = selection.response else {
            return response;
        };

        for header in &declared.headers {
            match extract_header(&header.example, self.picker.as_ref()) {
                Ok(Some(value)) => {
                    let value = value.trim_end();
                    if value.contains(|c: char| c == '\r' || c == '\n') {
                        warn!(header = %header.name, route = %self.route, "skipping multi-line header value");
                    } else {
                        response.headers.push((header.name.clone(), value.to_string()));
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(header = %header.name, route = %self.route, "skipping header: {}", e),
            }
        }

        let negotiated = negotiate(
            &declared.media_types,
            request.header("accept"),
            &request.route_params,
        );
        let Some(body) = negotiated.as_deref().and_then(|t| declared.body_for(t)) else {
            debug!(route = %self.route, requested = ?negotiated, "no matching body representation");
            return response;
        };

        response.content_type = Some(body.media_type.clone());
        response.body = match extract_body(&body.example, self.picker.as_ref()) {
            Ok(payload) => payload.map(|p| p.into_string()),
            Err(e) => {
                warn!(route = %self.route, media_type = %body.media_type, "writing empty body: {}", e);
                None
            }
        };
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raml::v08::Raml08Document;
    use crate::raml::v10::Raml10Document;
    use crate::mock::example::ThreadRngPicker;
    use serde_yaml::Mapping;

    fn handler_v10(text: &str, options: MockOptions, picker: Arc<dyn ExamplePicker>) -> MockHandler {
        let root: Mapping = serde_yaml::from_str(text).unwrap();
        let doc = Raml10Document::from_mapping(&root).unwrap();
        let resource = &doc.resources()[0];
        let (method, operation) = &resource.methods[0];
        MockHandler::build(&doc, method, &resource.relative_uri, operation, &options, picker)
    }

    const DOC: &str = r#"
/users:
  get:
    responses:
      200:
        headers:
          X-Id:
            default: test
            example: bar
        body:
          application/json:
            example: |
              {"success": true}
          application/xml:
            example: <success>true</success>
      404:
        body:
          application/json:
            example: {error: missing}
"#;

    fn users() -> MockHandler {
        handler_v10(DOC, MockOptions::default(), Arc::new(ThreadRngPicker))
    }

    #[test]
    fn first_response_and_first_media_type_by_default() {
        let response = users().respond(&Request::new("GET", "/users"));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.body.as_deref(), Some("{\"success\": true}\n"));
        assert_eq!(response.headers, vec![("X-Id".to_string(), "test".to_string())]);
    }

    #[test]
    fn block_scalar_header_values_are_trimmed_or_skipped() {
        let doc = r#"
/tokens:
  get:
    responses:
      200:
        headers:
          X-Token:
            example: |
              abc
          X-Multi:
            example: |
              first
              second
"#;
        let handler = handler_v10(doc, MockOptions::default(), Arc::new(ThreadRngPicker));
        let response = handler.respond(&Request::new("GET", "/tokens"));
        assert_eq!(response.headers, vec![("X-Token".to_string(), "abc".to_string())]);
    }

    #[test]
    fn accept_header_picks_xml_verbatim() {
        let request = Request::new("GET", "/users").with_header("Accept", "application/xml");
        let response = users().respond(&request);
        assert_eq!(response.content_type.as_deref(), Some("application/xml"));
        assert_eq!(response.body.as_deref(), Some("<success>true</success>"));
    }

    #[test]
    fn unmatched_accept_sends_no_body() {
        let request = Request::new("GET", "/users").with_header("accept", "text/html");
        let response = users().respond(&request);
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, None);
        assert_eq!(response.body, None);
    }

    #[test]
    fn preferred_response_header_selects_status() {
        let request = Request::new("GET", "/users")
            .with_header("Mock-Preferred-Responses", r#"{"GET /users": 404}"#);
        let response = users().respond(&request);
        assert_eq!(response.status, 404);
        assert_eq!(response.body.as_deref(), Some(r#"{"error":"missing"}"#));
        assert!(response.headers.is_empty());
    }

    #[test]
    fn undeclared_preferred_status_reuses_first_response() {
        let request = Request::new("GET", "/users")
            .with_header("mock-preferred-responses", r#"{"GET /users": 503}"#);
        let response = users().respond(&request);
        assert_eq!(response.status, 503);
        assert_eq!(response.body.as_deref(), Some("{\"success\": true}\n"));
    }

    #[test]
    fn concrete_override_key_is_relative_to_the_base_path() {
        let handler = users().with_base_path("/api");
        let request = Request::new("GET", "/api/users")
            .with_header("mock-preferred-responses", r#"{"GET /users": 404}"#);
        assert_eq!(handler.respond(&request).status, 404);

        let request = Request::new("GET", "/api/users")
            .with_header("mock-preferred-responses", r#"{"GET /api/users": 404}"#);
        assert_eq!(handler.respond(&request).status, 200);
    }

    #[test]
    fn preferred_responses_can_be_ignored() {
        let options = MockOptions {
            ignore_preferred_responses: true,
            ..MockOptions::default()
        };
        let handler = handler_v10(DOC, options, Arc::new(ThreadRngPicker));
        let request = Request::new("GET", "/users")
            .with_header("mock-preferred-responses", r#"{"GET /users": 404}"#);
        assert_eq!(handler.respond(&request).status, 200);
    }

    #[test]
    fn malformed_override_is_ignored() {
        let request = Request::new("GET", "/users").with_header("mock-preferred-responses", "{nope");
        assert_eq!(users().respond(&request).status, 200);
    }

    #[test]
    fn extension_route_param_forces_media_type() {
        let mut request = Request::new("GET", "/users.xml").with_header("Accept", "application/json");
        request
            .route_params
            .insert("mediaTypeExtension".to_string(), ".xml".to_string());
        let response = users().respond(&request);
        assert_eq!(response.content_type.as_deref(), Some("application/xml"));
    }

    #[test]
    fn no_declared_responses_is_an_empty_200() {
        let handler = handler_v10("/empty:\n  get:\n", MockOptions::default(), Arc::new(ThreadRngPicker));
        let response = handler.respond(&Request::new("GET", "/empty"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, None);
        assert_eq!(response.content_type, None);
    }

    #[test]
    fn injected_picker_selects_exact_example() {
        let doc = r#"
/pick:
  get:
    responses:
      200:
        body:
          application/json:
            examples:
              one: '"first"'
              two: '"second"'
"#;
        let handler = handler_v10(doc, MockOptions::default(), Arc::new(|len: usize| len - 1));
        let response = handler.respond(&Request::new("GET", "/pick"));
        assert_eq!(response.body.as_deref(), Some("\"second\""));
    }

    #[test]
    fn delay_is_carried_on_the_response() {
        let options = MockOptions {
            delay: Some(Duration::from_millis(25)),
            ..MockOptions::default()
        };
        let handler = handler_v10(DOC, options, Arc::new(ThreadRngPicker));
        assert_eq!(
            handler.respond(&Request::new("GET", "/users")).delay,
            Some(Duration::from_millis(25))
        );
    }

    #[test]
    fn works_with_raml_08_shapes() {
        let root: Mapping = serde_yaml::from_str(
            "/noexample:\n  get:\n    responses:\n      201:\n        body:\n          application/json:\n",
        )
        .unwrap();
        let doc = Raml08Document::from_mapping(&root).unwrap();
        let resource = &doc.resources()[0];
        let (method, operation) = &resource.methods[0];
        let handler = MockHandler::build(
            &doc,
            method,
            &resource.relative_uri,
            operation,
            &MockOptions::default(),
            Arc::new(ThreadRngPicker),
        );
        let response = handler.respond(&Request::new("GET", "/noexample"));
        assert_eq!(response.status, 201);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.body, None);
    }
}
