use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Behaviour shared by every mock handler, fixed when the route table is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockOptions {
    /// Pause between writing the headers and writing the body.
    pub delay: Option<Duration>,
    pub ignore_preferred_responses: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub raml_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub cors: bool,
    /// Request path that serves the RAML source.
    pub docs_path: Option<String>,
    pub watch: bool,
    pub mock: MockOptions,
}

impl ServeOptions {
    pub fn new(raml_path: PathBuf) -> Self {
        ServeOptions {
            raml_path,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            cors: false,
            docs_path: None,
            watch: true,
            mock: MockOptions::default(),
        }
    }
}

/// Docs paths are matched against normalized request paths.
pub fn normalize_docs_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_paths_are_rooted() {
        assert_eq!(normalize_docs_path("docs"), "/docs");
        assert_eq!(normalize_docs_path("/api/docs/"), "/api/docs");
        assert_eq!(normalize_docs_path("/"), "/");
    }
}
