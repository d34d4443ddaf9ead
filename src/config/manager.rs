use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use tracing::info;

use super::compiled::compile_document;
use super::options::{normalize_docs_path, MockOptions};
use crate::http::router::{get_routes_from_api, DocsRoute, RoutesData};
use crate::mock::example::{ExamplePicker, ThreadRngPicker};
use crate::raml::{errors::RamlError, loader::load_raml};

/// Shared, swappable route table. `None` while no document could be loaded.
pub type RoutesHandle = Arc<RwLock<Option<Arc<RoutesData>>>>;

#[derive(Clone)]
pub struct MockManager {
    raml_path: PathBuf,
    root_folder: PathBuf,
    docs_path: Option<String>,
    options: MockOptions,
    picker: Arc<dyn ExamplePicker>,
    routes: RoutesHandle,
}

impl MockManager {
    /// Initial load + compile
    pub fn new(
        raml_path: PathBuf,
        docs_path: Option<&str>,
        options: MockOptions,
    ) -> Result<Self, RamlError> {
        Self::with_picker(raml_path, docs_path, options, Arc::new(ThreadRngPicker))
    }

    pub fn with_picker(
        raml_path: PathBuf,
        docs_path: Option<&str>,
        options: MockOptions,
        picker: Arc<dyn ExamplePicker>,
    ) -> Result<Self, RamlError> {
        let root_folder = raml_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut manager = MockManager {
            raml_path,
            root_folder,
            docs_path: docs_path.map(normalize_docs_path),
            options,
            picker,
            routes: Arc::new(RwLock::new(None)),
        };
        let initial = manager.build_routes()?;
        manager.routes = Arc::new(RwLock::new(Some(Arc::new(initial))));
        Ok(manager)
    }

    fn build_routes(&self) -> Result<RoutesData, RamlError> {
        let loaded = load_raml(&self.raml_path)?;
        let api = compile_document(&loaded.document, &self.options, Arc::clone(&self.picker));
        info!(
            title = api.title.as_deref().unwrap_or("untitled"),
            version = ?loaded.document.version(),
            base_path = %api.base_path,
            "RAML document compiled"
        );
        let docs = self.docs_path.clone().map(|path| DocsRoute {
            path,
            source: loaded.source,
        });
        Ok(get_routes_from_api(&api, docs))
    }

    /// Reload on file change. The previous table stays live on failure.
    pub fn reload(&self) -> Result<(), RamlError> {
        let new_routes = Arc::new(self.build_routes()?);
        match self.routes.write() {
            Ok(mut guard) => *guard = Some(new_routes),
            Err(poisoned) => *poisoned.into_inner() = Some(new_routes),
        }
        info!(path = %self.raml_path.display(), "routes reloaded");
        Ok(())
    }

    pub fn routes_handle(&self) -> RoutesHandle {
        Arc::clone(&self.routes)
    }

    pub fn root_folder(&self) -> &PathBuf {
        &self.root_folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const V1: &str = "#%RAML 1.0\ntitle: t\n/a:\n  get:\n";
    const V2: &str = "#%RAML 1.0\ntitle: t\n/b:\n  get:\n";

    fn snapshot(manager: &MockManager) -> Arc<RoutesData> {
        manager.routes_handle().read().unwrap().clone().unwrap()
    }

    #[test]
    fn reload_swaps_routes_and_keeps_them_on_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.raml");
        fs::write(&path, V1).unwrap();

        let manager = MockManager::new(path.clone(), Some("docs/"), MockOptions::default()).unwrap();
        assert!(snapshot(&manager).static_routes.contains_key("/a"));
        assert_eq!(snapshot(&manager).docs.as_ref().unwrap().path, "/docs");

        fs::write(&path, V2).unwrap();
        manager.reload().unwrap();
        assert!(snapshot(&manager).static_routes.contains_key("/b"));
        assert_eq!(snapshot(&manager).docs.as_ref().unwrap().source, V2);

        fs::write(&path, "not raml").unwrap();
        assert!(manager.reload().is_err());
        assert!(snapshot(&manager).static_routes.contains_key("/b"));
    }

    #[test]
    fn load_errors_surface_at_startup() {
        let dir = tempdir().unwrap();
        let result = MockManager::new(dir.path().join("missing.raml"), None, MockOptions::default());
        assert!(matches!(result, Err(RamlError::NotFound { .. })));
    }
}
