use std::collections::HashMap;

/// Route parameters that carry a media type extension such as `.json`.
pub const EXTENSION_PARAMS: [&str; 2] = ["mediaTypeExtension", "ext"];

#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    q: f32,
    order: usize,
}

impl MediaRange {
    fn parse(raw: &str, order: usize) -> Option<Self> {
        let mut parts = raw.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        let (kind, subtype) = essence.split_once('/')?;
        if kind.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut q = 1.0;
        for param in parts {
            if let Some((name, value)) = param.split_once('=') {
                if name.trim().eq_ignore_ascii_case("q") {
                    q = value.trim().parse::<f32>().ok()?.clamp(0.0, 1.0);
                }
            }
        }

        Some(MediaRange {
            kind: kind.trim().to_string(),
            subtype: subtype.trim().to_string(),
            q,
            order,
        })
    }

    /// Specificity of a match against `kind/subtype`, or `None` if it doesn't match.
    fn specificity(&self, kind: &str, subtype: &str) -> Option<u8> {
        if self.kind == "*" && self.subtype == "*" {
            Some(0)
        } else if self.kind == kind && self.subtype == "*" {
            Some(1)
        } else if self.kind == kind && self.subtype == subtype {
            Some(2)
        } else {
            None
        }
    }
}

fn parse_accept(header: &str) -> Vec<MediaRange> {
    header
        .split(',')
        .enumerate()
        .filter_map(|(i, raw)| MediaRange::parse(raw, i))
        .collect()
}

/// Picks one of `available` for an `Accept` header value.
///
/// Without a header the first declared type wins. For each available type the
/// most specific matching range decides its quality; the highest quality wins,
/// ties go to the range listed first in the header and then to declaration order.
pub fn negotiate_accept<'a>(available: &'a [String], accept: Option<&str>) -> Option<&'a str> {
    let accept = match accept.map(str::trim) {
        Some(header) if !header.is_empty() => header,
        _ => return available.first().map(String::as_str),
    };
    let ranges = parse_accept(accept);

    let mut best: Option<(f32, usize, usize, &'a str)> = None;
    for (idx, candidate) in available.iter().enumerate() {
        let essence = candidate
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let Some((kind, subtype)) = essence.split_once('/') else {
            continue;
        };

        let matched = ranges
            .iter()
            .filter_map(|range| range.specificity(kind, subtype).map(|s| (s, range)))
            .max_by(|(sa, ra), (sb, rb)| sa.cmp(sb).then(rb.order.cmp(&ra.order)));
        let Some((_, range)) = matched else {
            continue;
        };
        if range.q <= 0.0 {
            continue;
        }

        let better = match best {
            None => true,
            Some((q, order, best_idx, _)) => {
                range.q > q || (range.q == q && (range.order, idx) < (order, best_idx))
            }
        };
        if better {
            best = Some((range.q, range.order, idx, candidate.as_str()));
        }
    }

    best.map(|(_, _, _, media_type)| media_type)
}

/// Media type forced by a URL extension route parameter (`.json` -> `application/json`).
pub fn extension_override(route_params: &HashMap<String, String>) -> Option<String> {
    EXTENSION_PARAMS
        .iter()
        .find_map(|name| route_params.get(*name))
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!("application/{}", ext.to_ascii_lowercase()))
}

/// Determines the representation for a request. An extension override ignores `Accept`.
pub fn negotiate(
    available: &[String],
    accept: Option<&str>,
    route_params: &HashMap<String, String>,
) -> Option<String> {
    if let Some(forced) = extension_override(route_params) {
        return Some(forced);
    }
    negotiate_accept(available, accept).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_accept_uses_first_declared_type() {
        let available = types(&["application/json", "application/xml"]);
        assert_eq!(negotiate_accept(&available, None), Some("application/json"));
        assert_eq!(negotiate_accept(&available, Some("  ")), Some("application/json"));
    }

    #[test]
    fn exact_match() {
        let available = types(&["application/json", "application/xml"]);
        assert_eq!(
            negotiate_accept(&available, Some("application/xml")),
            Some("application/xml")
        );
    }

    #[test]
    fn quality_values_are_respected() {
        let available = types(&["application/json", "application/xml"]);
        assert_eq!(
            negotiate_accept(&available, Some("application/json;q=0.5, application/xml")),
            Some("application/xml")
        );
    }

    #[test]
    fn wildcards_match() {
        let available = types(&["text/plain", "application/json"]);
        assert_eq!(
            negotiate_accept(&available, Some("application/*")),
            Some("application/json")
        );
        assert_eq!(negotiate_accept(&available, Some("*/*")), Some("text/plain"));
    }

    #[test]
    fn specific_range_overrides_wildcard_quality() {
        let available = types(&["application/json", "application/xml"]);
        assert_eq!(
            negotiate_accept(&available, Some("*/*;q=0.8, application/json;q=0")),
            Some("application/xml")
        );
    }

    #[test]
    fn no_acceptable_type() {
        let available = types(&["application/json"]);
        assert_eq!(negotiate_accept(&available, Some("text/html")), None);
        assert_eq!(negotiate_accept(&[], Some("application/json")), None);
    }

    #[test]
    fn extension_forces_media_type() {
        let available = types(&["application/json", "application/xml"]);
        let mut params = HashMap::new();
        params.insert("mediaTypeExtension".to_string(), ".xml".to_string());
        assert_eq!(
            negotiate(&available, Some("application/json"), &params),
            Some("application/xml".to_string())
        );

        let mut params = HashMap::new();
        params.insert("ext".to_string(), ".json".to_string());
        assert_eq!(
            negotiate(&available, Some("application/xml"), &params),
            Some("application/json".to_string())
        );
    }

    #[test]
    fn empty_extension_falls_back_to_accept() {
        let available = types(&["application/json"]);
        let mut params = HashMap::new();
        params.insert("ext".to_string(), "".to_string());
        assert_eq!(
            negotiate(&available, None, &params),
            Some("application/json".to_string())
        );
    }
}
