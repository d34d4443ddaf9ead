use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub route_params: HashMap<String, String>,
    /// Header names are stored lower-cased.
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Length of the header block including the blank line, once complete.
pub fn header_block_len(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

/// Declared `Content-Length` of a (possibly partial) request.
pub fn content_length(headers_part: &str) -> usize {
    headers_part
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

pub fn parse_http_request(buffer: &[u8]) -> Request {
    let request_str = String::from_utf8_lossy(buffer).to_string();

    let header_end = request_str.find("\r\n\r\n").unwrap_or(request_str.len());
    let headers_part = &request_str[..header_end];

    let mut lines = headers_part.lines();
    let request_line = lines.next().unwrap_or("");

    // "GET /path?query=val HTTP/1.1"; the query plays no part in routing.
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_ascii_uppercase();
    let full_path = parts.next().unwrap_or("/");
    let raw_path = full_path
        .split_once('?')
        .map_or(full_path, |(path, _)| path)
        .to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    debug!(%method, path = %raw_path, "parsed request");
    debug!("Headers: {:?}", headers);

    Request {
        method,
        path: raw_path,
        route_params: HashMap::new(),
        headers,
    }
}
