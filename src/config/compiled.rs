use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::mock::{example::ExamplePicker, handler::MockHandler};
use crate::raml::{
    shape::{ApiShape, Resource},
    RamlDocument,
};

use super::options::MockOptions;

#[derive(Clone, Debug, Serialize)]
pub struct CompiledMethod {
    pub method: String,
    pub handler: Arc<MockHandler>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CompiledResource {
    /// Relative URI as declared (`/users`, `/{id}`).
    path: String,
    /// Declared path from the API root, without the base path.
    full_path: String,
    children: Vec<CompiledResource>,
    methods: Vec<CompiledMethod>,
}

impl CompiledResource {
    pub fn get_path(&self) -> &str {
        self.path.as_str()
    }

    pub fn full_path(&self) -> &str {
        self.full_path.as_str()
    }

    pub fn methods(&self) -> &[CompiledMethod] {
        &self.methods
    }

    pub fn children(&self) -> &[CompiledResource] {
        &self.children
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CompiledApi {
    pub title: Option<String>,
    pub base_path: String,
    pub resources: Vec<CompiledResource>,
}

fn compile_resource<S: ApiShape>(
    shape: &S,
    resource: &Resource<S::Method>,
    parent_path: &str,
    base_path: &str,
    options: &MockOptions,
    picker: &Arc<dyn ExamplePicker>,
) -> CompiledResource {
    let full_path = format!("{}{}", parent_path, resource.relative_uri);
    debug!(path = %full_path, "Compiling resource");

    let methods = resource
        .methods
        .iter()
        .map(|(method, operation)| CompiledMethod {
            method: method.to_ascii_uppercase(),
            handler: Arc::new(
                MockHandler::build(
                    shape,
                    method,
                    &full_path,
                    operation,
                    options,
                    Arc::clone(picker),
                )
                .with_base_path(base_path),
            ),
        })
        .collect();

    let children = resource
        .children
        .iter()
        .map(|child| compile_resource(shape, child, &full_path, base_path, options, picker))
        .collect();

    CompiledResource {
        path: resource.relative_uri.clone(),
        full_path,
        children,
        methods,
    }
}

/// Builds one mock handler per declared operation.
pub fn compile_api<S: ApiShape>(
    shape: &S,
    options: &MockOptions,
    picker: Arc<dyn ExamplePicker>,
) -> CompiledApi {
    let base_path = shape.base_path();
    let resources = shape
        .resources()
        .iter()
        .map(|resource| compile_resource(shape, resource, "", &base_path, options, &picker))
        .collect();
    CompiledApi {
        title: shape.title().map(str::to_string),
        base_path,
        resources,
    }
}

/// Dispatches on the document version once; everything after sees `ApiShape`.
pub fn compile_document(
    document: &RamlDocument,
    options: &MockOptions,
    picker: Arc<dyn ExamplePicker>,
) -> CompiledApi {
    match document {
        RamlDocument::V08(doc) => compile_api(doc, options, picker),
        RamlDocument::V10(doc) => compile_api(doc, options, picker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::example::ThreadRngPicker;
    use crate::raml::v10::Raml10Document;
    use serde_yaml::Mapping;

    #[test]
    fn nested_resources_get_full_paths_and_handlers() {
        let root: Mapping = serde_yaml::from_str(
            "baseUri: http://localhost/api\n/users:\n  get:\n  /{id}:\n    get:\n    delete:\n",
        )
        .unwrap();
        let doc = RamlDocument::V10(Raml10Document::from_mapping(&root).unwrap());
        let api = compile_document(&doc, &MockOptions::default(), Arc::new(ThreadRngPicker));

        assert_eq!(api.base_path, "/api");
        let users = &api.resources[0];
        assert_eq!(users.full_path(), "/users");
        let item = &users.children()[0];
        assert_eq!(item.get_path(), "/{id}");
        assert_eq!(item.full_path(), "/users/{id}");
        let methods: Vec<_> = item.methods().iter().map(|m| m.method.as_str()).collect();
        assert_eq!(methods, vec!["GET", "DELETE"]);
        assert_eq!(item.methods()[1].handler.route, "/users/{id}");
        assert_eq!(item.methods()[1].handler.base_path, "/api");
    }

    #[test]
    fn compiled_api_serializes_for_inspection() {
        let root: Mapping = serde_yaml::from_str(
            "/a:\n  get:\n    responses:\n      200:\n        body:\n          application/json:\n            example: {x: 1}\n",
        )
        .unwrap();
        let doc = RamlDocument::V10(Raml10Document::from_mapping(&root).unwrap());
        let api = compile_document(&doc, &MockOptions::default(), Arc::new(ThreadRngPicker));
        let json = serde_json::to_value(&api).unwrap();
        let response = &json["resources"][0]["methods"][0]["handler"]["responses"][0];
        assert_eq!(response["status"], 200);
        assert_eq!(response["media_types"][0], "application/json");
    }
}
