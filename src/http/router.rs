use std::collections::HashMap;
use std::sync::Arc;

use crate::config::compiled::{CompiledApi, CompiledResource};
use crate::mock::handler::MockHandler;
use crate::mock::negotiate::EXTENSION_PARAMS;

pub type MethodHandlers = HashMap<String, Arc<MockHandler>>;

pub type StaticRoutes = HashMap<String, MethodHandlers>;

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Lit(String),
    Param(String),
}

/// One path segment such as `users`, `{id}` or `file{mediaTypeExtension}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPattern {
    parts: Vec<Part>,
}

impl SegmentPattern {
    pub fn parse(segment: &str) -> Self {
        let mut parts = Vec::new();
        let mut rest = segment;
        while !rest.is_empty() {
            match (rest.find('{'), rest.find('}')) {
                (Some(open), Some(close)) if open < close => {
                    if open > 0 {
                        parts.push(Part::Lit(rest[..open].to_string()));
                    }
                    parts.push(Part::Param(rest[open + 1..close].trim().to_string()));
                    rest = &rest[close + 1..];
                }
                _ => {
                    parts.push(Part::Lit(rest.to_string()));
                    rest = "";
                }
            }
        }
        SegmentPattern { parts }
    }

    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Lit(_)))
    }

    /// Binds parameters on success; leaves `params` untouched otherwise.
    pub fn matches(&self, segment: &str, params: &mut HashMap<String, String>) -> bool {
        let mut captured = Vec::new();
        if match_parts(&self.parts, segment, &mut captured) {
            params.extend(captured);
            true
        } else {
            false
        }
    }
}

fn is_extension_param(name: &str) -> bool {
    EXTENSION_PARAMS.contains(&name)
}

fn valid_capture(name: &str, value: &str) -> bool {
    if is_extension_param(name) {
        value.is_empty() || (value.starts_with('.') && !value[1..].contains('.'))
    } else {
        !value.is_empty()
    }
}

/// Shortest captures first, so `{id}{ext}` splits `5.json` as `5` + `.json`.
fn match_parts(parts: &[Part], input: &str, captured: &mut Vec<(String, String)>) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return input.is_empty();
    };
    match first {
        Part::Lit(lit) => input
            .strip_prefix(lit.as_str())
            .is_some_and(|remaining| match_parts(rest, remaining, captured)),
        Part::Param(name) if rest.is_empty() => {
            if valid_capture(name, input) {
                captured.push((name.clone(), input.to_string()));
                true
            } else {
                false
            }
        }
        Part::Param(name) => {
            let boundaries = input
                .char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(input.len()));
            for split in boundaries {
                let (value, remaining) = input.split_at(split);
                if !valid_capture(name, value) {
                    continue;
                }
                let mark = captured.len();
                captured.push((name.clone(), value.to_string()));
                if match_parts(rest, remaining, captured) {
                    return true;
                }
                captured.truncate(mark);
            }
            false
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteNode {
    pub methods: MethodHandlers,
    pub static_children: HashMap<String, Box<RouteNode>>,
    pub dynamic_children: Vec<(SegmentPattern, Box<RouteNode>)>,
}

impl RouteNode {
    pub fn new() -> Self {
        RouteNode::default()
    }
}

/// Serves the RAML source at a fixed path.
#[derive(Debug, Clone)]
pub struct DocsRoute {
    pub path: String,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct RoutesData {
    pub base_path: String,
    pub static_routes: StaticRoutes,
    pub dynamic_root: RouteNode,
    pub docs: Option<DocsRoute>,
}

fn match_static_route(
    static_routes: &StaticRoutes,
    path: &str,
    method: &str,
) -> Option<Arc<MockHandler>> {
    static_routes.get(path)?.get(method).cloned()
}

fn match_dynamic_route(
    node: &RouteNode,
    path_segments: &[&str],
    method: &str,
    route_params: &mut HashMap<String, String>,
) -> Option<Arc<MockHandler>> {
    let Some((seg, rest)) = path_segments.split_first() else {
        return node.methods.get(method).cloned();
    };

    if let Some(child) = node.static_children.get(*seg) {
        if let Some(found) = match_dynamic_route(child, rest, method, route_params) {
            return Some(found);
        }
    }

    for (pattern, child) in &node.dynamic_children {
        let mut params = route_params.clone();
        if !pattern.matches(seg, &mut params) {
            continue;
        }
        if let Some(found) = match_dynamic_route(child, rest, method, &mut params) {
            *route_params = params;
            return Some(found);
        }
    }
    None
}

/// Path below the base path, or `None` when the request is outside it.
fn strip_base_path<'a>(base_path: &str, raw_path: &'a str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(raw_path);
    }
    let rest = raw_path.strip_prefix(base_path)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn find_route(
    routes: &RoutesData,
    raw_path: &str,
    method: &str,
) -> Option<(Arc<MockHandler>, HashMap<String, String>)> {
    let relative = strip_base_path(&routes.base_path, raw_path)?;
    let segments = path_segments(relative);
    let normalized = format!("/{}", segments.join("/"));

    if let Some(handler) = match_static_route(&routes.static_routes, &normalized, method) {
        return Some((handler, HashMap::new()));
    }

    let mut route_params = HashMap::new();
    match_dynamic_route(&routes.dynamic_root, &segments, method, &mut route_params)
        .map(|handler| (handler, route_params))
}

fn insert_dynamic_path(root: &mut RouteNode, path_segments: &[&str], methods: &MethodHandlers) {
    let mut current = root;

    for seg in path_segments {
        let pattern = SegmentPattern::parse(seg);
        current = if pattern.is_static() {
            current
                .static_children
                .entry(seg.to_string())
                .or_insert_with(|| Box::new(RouteNode::new()))
                .as_mut()
        } else {
            let idx = match current.dynamic_children.iter().position(|(p, _)| *p == pattern) {
                Some(idx) => idx,
                None => {
                    current
                        .dynamic_children
                        .push((pattern, Box::new(RouteNode::new())));
                    current.dynamic_children.len() - 1
                }
            };
            current.dynamic_children[idx].1.as_mut()
        };
    }
    for (method, handler) in methods {
        current.methods.insert(method.clone(), Arc::clone(handler));
    }
}

fn process_route_insertion(
    static_routes: &mut StaticRoutes,
    dynamic_root: &mut RouteNode,
    full_path: &str,
    methods: &MethodHandlers,
) {
    let segments = path_segments(full_path);
    let has_dynamic = segments.iter().any(|seg| seg.contains('{'));

    if has_dynamic {
        insert_dynamic_path(dynamic_root, &segments, methods);
    } else {
        let path_with_slash = format!("/{}", segments.join("/"));
        static_routes
            .entry(path_with_slash)
            .or_default()
            .extend(methods.iter().map(|(m, h)| (m.clone(), Arc::clone(h))));
    }
}

fn populate_routes(
    static_routes: &mut StaticRoutes,
    dynamic_root: &mut RouteNode,
    resource: &CompiledResource,
) {
    let methods: MethodHandlers = resource
        .methods()
        .iter()
        .map(|m| (m.method.clone(), Arc::clone(&m.handler)))
        .collect();

    if !methods.is_empty() {
        process_route_insertion(static_routes, dynamic_root, resource.full_path(), &methods);
    }

    for child in resource.children() {
        populate_routes(static_routes, dynamic_root, child);
    }
}

pub fn get_routes_from_api(api: &CompiledApi, docs: Option<DocsRoute>) -> RoutesData {
    let mut static_routes: StaticRoutes = HashMap::new();
    let mut dynamic_root = RouteNode::new();

    for resource in &api.resources {
        populate_routes(&mut static_routes, &mut dynamic_root, resource);
    }

    RoutesData {
        base_path: api.base_path.clone(),
        static_routes,
        dynamic_root,
        docs,
    }
}
