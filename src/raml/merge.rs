//! Applies `resourceTypes` and `traits` to resources and methods.
//!
//! Runs on the raw YAML tree, before a version shape is built. Declarations on
//! the resource or method always win over what a template contributes.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::errors::RamlError;
use super::shape::{key_str, named_entries, scalar_text, HTTP_METHODS};

const MAX_TYPE_CHAIN: usize = 8;

type Templates = HashMap<String, Value>;

struct Context {
    traits: Templates,
    resource_types: Templates,
}

/// Expands `type:` and `is:` references across the whole document.
pub fn apply_templates(root: &mut Mapping) -> Result<(), RamlError> {
    let ctx = Context {
        traits: collect_named(root.get("traits")),
        resource_types: collect_named(root.get("resourceTypes")),
    };
    if ctx.traits.is_empty() && ctx.resource_types.is_empty() {
        return Ok(());
    }
    debug!(
        traits = ctx.traits.len(),
        resource_types = ctx.resource_types.len(),
        "applying RAML templates"
    );

    for (key, value) in root.iter_mut() {
        if let Some(path) = key_str(key).filter(|k| k.starts_with('/')) {
            apply_resource(value, path, &ctx)?;
        }
    }
    Ok(())
}

fn collect_named(value: Option<&Value>) -> Templates {
    named_entries(value).into_iter().collect()
}

fn apply_resource(resource: &mut Value, path: &str, ctx: &Context) -> Result<(), RamlError> {
    if resource.is_null() {
        *resource = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = resource else {
        return Ok(());
    };

    let mut base_params = HashMap::new();
    base_params.insert("resourcePath".to_string(), path.to_string());
    base_params.insert("resourcePathName".to_string(), resource_path_name(path));

    if let Some(type_ref) = map.get("type").cloned() {
        let expanded = expand_resource_type(&type_ref, &base_params, ctx, path, 0)?;
        merge_resource_type(map, &expanded);
    }

    let resource_traits = trait_refs(map.get("is"));
    for method in HTTP_METHODS {
        let Some(method_value) = map.get_mut(method) else {
            continue;
        };
        if method_value.is_null() {
            *method_value = Value::Mapping(Mapping::new());
        }
        let mut refs = resource_traits.clone();
        if let Value::Mapping(method_map) = &*method_value {
            refs.extend(trait_refs(method_map.get("is")));
        }

        let mut params = base_params.clone();
        params.insert("methodName".to_string(), method.to_string());
        for trait_ref in &refs {
            let (name, args) = template_ref(trait_ref);
            let Some(template) = ctx.traits.get(&name) else {
                return Err(RamlError::invalid(
                    "trait reference",
                    format!("{} {}", method.to_ascii_uppercase(), path),
                    format!("unknown trait '{}'", name),
                ));
            };
            let mut all = params.clone();
            all.extend(args);
            merge_missing(method_value, &substitute(template, &all));
        }
    }

    let children: Vec<Value> = map
        .keys()
        .filter(|k| key_str(k).is_some_and(|k| k.starts_with('/')))
        .cloned()
        .collect();
    for key in children {
        let child_path = format!("{}{}", path, key_str(&key).unwrap_or_default());
        if let Some(child) = map.get_mut(&key) {
            apply_resource(child, &child_path, ctx)?;
        }
    }
    Ok(())
}

/// Resolves a resource type, following its own `type:` chain.
fn expand_resource_type(
    type_ref: &Value,
    base_params: &HashMap<String, String>,
    ctx: &Context,
    path: &str,
    depth: usize,
) -> Result<Mapping, RamlError> {
    if depth >= MAX_TYPE_CHAIN {
        return Err(RamlError::invalid(
            "resource type",
            path,
            "resource type chain is too deep or cyclic",
        ));
    }
    let (name, args) = template_ref(type_ref);
    let Some(template) = ctx.resource_types.get(&name) else {
        return Err(RamlError::invalid(
            "resource type reference",
            path,
            format!("unknown resource type '{}'", name),
        ));
    };

    let mut params = base_params.clone();
    params.extend(args);
    let Value::Mapping(mut expanded) = substitute(template, &params) else {
        return Ok(Mapping::new());
    };

    if let Some(parent_ref) = expanded.remove("type") {
        let parent = expand_resource_type(&parent_ref, base_params, ctx, path, depth + 1)?;
        merge_resource_type(&mut expanded, &parent);
    }
    Ok(expanded)
}

/// Optional methods (`get?`) only apply when the resource declares the method.
fn merge_resource_type(target: &mut Mapping, template: &Mapping) {
    for (key, value) in template {
        let Some(name) = key_str(key) else {
            continue;
        };
        if name == "is" {
            let mut combined = trait_refs(Some(value));
            combined.extend(trait_refs(target.get("is")));
            target.insert(Value::from("is"), Value::Sequence(combined));
            continue;
        }
        if let Some(method) = name.strip_suffix('?') {
            if let Some(existing) = target.get_mut(method) {
                merge_missing(existing, value);
            }
            continue;
        }
        match target.get_mut(name) {
            Some(existing) => merge_missing(existing, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn trait_refs(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Sequence(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

/// `name` or `{ name: { param: value } }`.
fn template_ref(value: &Value) -> (String, HashMap<String, String>) {
    match value {
        Value::Mapping(map) => {
            let Some((key, args)) = map.iter().next() else {
                return (String::new(), HashMap::new());
            };
            let mut params = HashMap::new();
            if let Value::Mapping(args) = args {
                for (k, v) in args {
                    if let (Some(k), Some(v)) = (key_str(k), scalar_text(v)) {
                        params.insert(k.to_string(), v);
                    }
                }
            }
            (key_str(key).unwrap_or_default().to_string(), params)
        }
        other => (scalar_text(other).unwrap_or_default(), HashMap::new()),
    }
}

/// Copies entries from `inherited` that `target` does not declare.
pub fn merge_missing(target: &mut Value, inherited: &Value) {
    if target.is_null() {
        *target = inherited.clone();
        return;
    }
    if let (Value::Mapping(target), Value::Mapping(inherited)) = (target, inherited) {
        for (key, value) in inherited {
            match target.get_mut(key) {
                Some(existing) => merge_missing(existing, value),
                None => {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn resource_path_name(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty() && !s.contains('{'))
        .next_back()
        .unwrap_or_default()
        .to_string()
}

fn substitute(value: &Value, params: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, params)),
        Value::Sequence(items) => Value::Sequence(items.iter().map(|v| substitute(v, params)).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (substitute(k, params), substitute(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Replaces `<<name>>` and `<<name | !function>>` occurrences.
fn substitute_str(input: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("<<") {
        let Some(len) = rest[start + 2..].find(">>") else {
            break;
        };
        out.push_str(&rest[..start]);
        let inner = &rest[start + 2..start + 2 + len];
        let mut parts = inner.split('|').map(str::trim);
        let name = parts.next().unwrap_or_default();
        match params.get(name) {
            Some(value) => {
                let transformed = parts.fold(value.clone(), |acc, f| transform(&acc, f));
                out.push_str(&transformed);
            }
            None => out.push_str(&rest[start..start + 4 + len]),
        }
        rest = &rest[start + 4 + len..];
    }
    out.push_str(rest);
    out
}

fn transform(value: &str, function: &str) -> String {
    match function.trim_start_matches('!') {
        "uppercase" => value.to_uppercase(),
        "lowercase" => value.to_lowercase(),
        "singularize" => value.strip_suffix('s').unwrap_or(value).to_string(),
        "pluralize" => format!("{}s", value),
        _ => value.to_string(),
    }
}
