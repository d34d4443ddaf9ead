pub mod errors;
pub mod loader;
pub mod merge;
pub mod schema;
pub mod shape;
pub mod v08;
pub mod v10;

use self::{v08::Raml08Document, v10::Raml10Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamlVersion {
    V08,
    V10,
}

impl RamlVersion {
    /// Reads the `#%RAML <version>` comment on the first line. 1.0 fragments
    /// (`#%RAML 1.0 Library`, ...) are not API roots.
    pub fn detect(text: &str) -> Result<RamlVersion, Option<String>> {
        let first = text
            .trim_start_matches('\u{feff}')
            .lines()
            .next()
            .unwrap_or_default()
            .trim();
        let Some(rest) = first.strip_prefix("#%RAML") else {
            return Err(None);
        };
        match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["0.8"] => Ok(RamlVersion::V08),
            ["1.0"] | ["1.1"] => Ok(RamlVersion::V10),
            _ => Err(Some(first.to_string())),
        }
    }
}

/// A parsed API description in one of the supported shapes.
#[derive(Debug, Clone)]
pub enum RamlDocument {
    V08(Raml08Document),
    V10(Raml10Document),
}

impl RamlDocument {
    pub fn version(&self) -> RamlVersion {
        match self {
            RamlDocument::V08(_) => RamlVersion::V08,
            RamlDocument::V10(_) => RamlVersion::V10,
        }
    }
}
