use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::{
    errors::RamlError, merge::apply_templates, v08::Raml08Document, v10::Raml10Document,
    RamlDocument, RamlVersion,
};

pub const MAX_INCLUDE_DEPTH: usize = 16;

/// A loaded document together with the text it was read from.
#[derive(Debug, Clone)]
pub struct LoadedRaml {
    pub path: PathBuf,
    pub source: String,
    pub document: RamlDocument,
}

/// Makes a relative argument absolute against the working directory.
pub fn raml_path_cwd(arg: &str) -> PathBuf {
    let path = Path::new(arg);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolves a reference relative to the directory of the file that made it.
pub fn resolve_path(reference: &str, base: &Path) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn read_file(path: &Path) -> Result<String, RamlError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            RamlError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            RamlError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

fn parse_yaml(text: &str, path: &Path) -> Result<Value, RamlError> {
    serde_yaml::from_str(text).map_err(|e| RamlError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })
}

fn base_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Reads, resolves and shapes a RAML document.
pub fn load_raml(path: &Path) -> Result<LoadedRaml, RamlError> {
    let source = read_file(path)?;
    let version = RamlVersion::detect(&source).map_err(|header| match header {
        Some(header) => RamlError::UnsupportedVersion {
            path: path.to_path_buf(),
            header,
        },
        None => RamlError::MissingHeader {
            path: path.to_path_buf(),
        },
    })?;

    let mut root = parse_yaml(&source, path)?;
    resolve_includes(&mut root, &base_dir(path), 0)?;
    let Value::Mapping(mut root) = root else {
        return Err(RamlError::NotAMapping {
            path: path.to_path_buf(),
        });
    };

    apply_templates(&mut root)?;
    let document = build_document(version, &root)?;
    debug!(path = %path.display(), ?version, "loaded RAML document");

    Ok(LoadedRaml {
        path: path.to_path_buf(),
        source,
        document,
    })
}

fn build_document(version: RamlVersion, root: &Mapping) -> Result<RamlDocument, RamlError> {
    Ok(match version {
        RamlVersion::V08 => RamlDocument::V08(Raml08Document::from_mapping(root)?),
        RamlVersion::V10 => RamlDocument::V10(Raml10Document::from_mapping(root)?),
    })
}

/// Replaces every `!include <path>` node in place. YAML and RAML files are
/// parsed and resolved recursively; anything else is inlined as text.
pub fn resolve_includes(value: &mut Value, base: &Path, depth: usize) -> Result<(), RamlError> {
    if let Some(reference) = include_reference(value, base)? {
        let target = resolve_path(&reference, base);
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(RamlError::IncludeDepth {
                path: target,
                limit: MAX_INCLUDE_DEPTH,
            });
        }
        *value = load_include(&target, depth + 1)?;
        return Ok(());
    }

    match value {
        Value::Tagged(tagged) => resolve_includes(&mut tagged.value, base, depth)?,
        Value::Sequence(items) => {
            for item in items {
                resolve_includes(item, base, depth)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                resolve_includes(item, base, depth)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn include_reference(value: &Value, base: &Path) -> Result<Option<String>, RamlError> {
    let Value::Tagged(tagged) = value else {
        return Ok(None);
    };
    if tagged.tag != "!include" {
        return Ok(None);
    }
    match &tagged.value {
        Value::String(reference) if !reference.trim().is_empty() => {
            Ok(Some(reference.trim().to_string()))
        }
        other => Err(RamlError::InvalidInclude {
            path: base.to_path_buf(),
            reason: format!("expected a file path, found {:?}", other),
        }),
    }
}

fn load_include(path: &Path, depth: usize) -> Result<Value, RamlError> {
    let text = read_file(path)?;
    let structured = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "raml" | "yaml" | "yml"));
    if !structured {
        return Ok(Value::String(text));
    }

    let mut value = parse_yaml(&text, path)?;
    resolve_includes(&mut value, &base_dir(path), depth)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raml::shape::ApiShape;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn includes_are_inlined_by_extension() {
        let dir = tempdir().unwrap();
        write(dir.path(), "example.json", "{\"ok\": true}");
        write(
            dir.path(),
            "body.yaml",
            "application/json:\n  example: !include example.json\n",
        );
        let root = write(
            dir.path(),
            "api.raml",
            "#%RAML 0.8\ntitle: t\n/a:\n  get:\n    responses:\n      200:\n        body: !include body.yaml\n",
        );

        let loaded = load_raml(&root).unwrap();
        let RamlDocument::V08(doc) = &loaded.document else {
            panic!("expected a 0.8 document");
        };
        let (_, method) = &doc.resources()[0].methods[0];
        let (_, response) = doc.responses(method)[0];
        let body = doc.body(response, "application/json").unwrap();
        assert_eq!(
            body.example.examples,
            crate::mock::example::Examples::Single(crate::mock::example::ExampleValue::Raw(
                "{\"ok\": true}".into()
            ))
        );
        assert!(loaded.source.starts_with("#%RAML 0.8"));
    }

    #[test]
    fn include_cycles_are_rejected() {
        let dir = tempdir().unwrap();
        write(dir.path(), "loop.yaml", "next: !include loop.yaml\n");
        let root = write(dir.path(), "api.raml", "#%RAML 1.0\ntitle: t\nx: !include loop.yaml\n");
        assert!(matches!(
            load_raml(&root),
            Err(RamlError::IncludeDepth { .. })
        ));
    }

    #[test]
    fn missing_files_and_headers() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_raml(&dir.path().join("nope.raml")),
            Err(RamlError::NotFound { .. })
        ));

        let no_header = write(dir.path(), "plain.yaml", "title: t\n");
        assert!(matches!(
            load_raml(&no_header),
            Err(RamlError::MissingHeader { .. })
        ));

        let fragment = write(dir.path(), "lib.raml", "#%RAML 1.0 Library\ntypes: {}\n");
        assert!(matches!(
            load_raml(&fragment),
            Err(RamlError::UnsupportedVersion { .. })
        ));

        let missing_include = write(dir.path(), "inc.raml", "#%RAML 1.0\nx: !include gone.json\n");
        assert!(matches!(
            load_raml(&missing_include),
            Err(RamlError::NotFound { .. })
        ));
    }

    #[test]
    fn scalar_documents_are_rejected() {
        let dir = tempdir().unwrap();
        let root = write(dir.path(), "api.raml", "#%RAML 1.0\njust text\n");
        assert!(matches!(load_raml(&root), Err(RamlError::NotAMapping { .. })));
    }
}
