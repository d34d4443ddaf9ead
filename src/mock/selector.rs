use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

/// Request header letting a client force a declared (or undeclared) status code.
pub const PREFERRED_RESPONSES_HEADER: &str = "mock-preferred-responses";

/// Anything that carries the status code it was declared under.
pub trait DeclaredStatus {
    fn status(&self) -> u16;
}

/// Parsed `Mock-Preferred-Responses` value: `"METHOD /path" -> status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferredResponses {
    entries: HashMap<String, u16>,
}

impl PreferredResponses {
    /// Returns `None` when the header is not a JSON object; bad entries are skipped.
    pub fn parse(raw: &str) -> Option<Self> {
        let map = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(header = %raw, "preferred responses header is not a JSON object");
                return None;
            }
            Err(err) => {
                warn!(header = %raw, error = %err, "malformed preferred responses header");
                return None;
            }
        };

        let entries = map
            .into_iter()
            .filter_map(|(key, value)| {
                let status = match value {
                    Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
                    Value::String(s) => s.trim().parse::<u16>().ok(),
                    _ => None,
                };
                match status {
                    Some(status) => Some((normalize_key(&key)?, status)),
                    None => {
                        warn!(%key, "ignoring non-numeric preferred status");
                        None
                    }
                }
            })
            .collect();

        Some(PreferredResponses { entries })
    }

    /// Looks up the first of `paths` that has an entry for `method`.
    pub fn status_for(&self, method: &str, paths: &[&str]) -> Option<u16> {
        let method = method.to_ascii_uppercase();
        paths
            .iter()
            .find_map(|path| self.entries.get(&format!("{} {}", method, path)).copied())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_key(key: &str) -> Option<String> {
    let mut parts = key.trim().splitn(2, char::is_whitespace);
    let method = parts.next()?.to_ascii_uppercase();
    let path = parts.next()?.trim();
    if method.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("{} {}", method, path))
}

/// Outcome of response selection: the status to send and the metadata to use.
#[derive(Debug, PartialEq)]
pub struct Selection<'a, R> {
    pub status: u16,
    pub response: Option<&'a R>,
}

/// Picks exactly one response for a request.
///
/// An override naming an undeclared status keeps the first response's
/// headers and bodies under the requested code.
pub fn select<R: DeclaredStatus>(responses: &[R], preferred: Option<u16>) -> Selection<'_, R> {
    if let Some(status) = preferred {
        if let Some(response) = responses.iter().find(|r| r.status() == status) {
            return Selection {
                status,
                response: Some(response),
            };
        }
        return Selection {
            status,
            response: responses.first(),
        };
    }

    match responses.first() {
        Some(response) => Selection {
            status: response.status(),
            response: Some(response),
        },
        None => Selection {
            status: 200,
            response: None,
        },
    }
}
