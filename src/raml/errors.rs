use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum RamlError {
    #[error("RAML file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse YAML in '{}': {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("'{}' does not start with a '#%RAML <version>' header", path.display())]
    MissingHeader { path: PathBuf },

    #[error("'{}' has unsupported header '{header}' (expected '#%RAML 0.8' or '#%RAML 1.0')", path.display())]
    UnsupportedVersion { path: PathBuf, header: String },

    #[error("'{}' must contain a YAML mapping at the top level", path.display())]
    NotAMapping { path: PathBuf },

    #[error("!include nesting deeper than {limit} levels at '{}'", path.display())]
    IncludeDepth { path: PathBuf, limit: usize },

    #[error("invalid !include in '{}': {reason}", path.display())]
    InvalidInclude { path: PathBuf, reason: String },

    #[error("invalid {what} at {location}: {reason}")]
    Invalid {
        what: &'static str,
        location: String,
        reason: String,
    },
}

impl RamlError {
    pub fn invalid(what: &'static str, location: impl Into<String>, reason: impl Into<String>) -> Self {
        RamlError::Invalid {
            what,
            location: location.into(),
            reason: reason.into(),
        }
    }
}
