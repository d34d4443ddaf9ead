use std::sync::Arc;

use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::mock::handler::MockResponse;

use super::request::{content_length, header_block_len, parse_http_request};
use super::router::{find_route, RoutesData};

const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "*"),
    ("Access-Control-Allow-Credentials", "true"),
];

const DOCS_CONTENT_TYPE: &str = "application/raml+yaml";

/// Largest request accepted, headers and body together.
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => "Unknown",
    }
}

async fn read_http_request(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    // Read until we find the header terminator.
    let header_len = loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(data);
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(len) = header_block_len(&data) {
            break len;
        }
        if data.len() > MAX_REQUEST_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request headers too large"));
        }
    };

    let headers_section = String::from_utf8_lossy(&data[..header_len]).to_string();
    let expected = content_length(&headers_section).min(MAX_REQUEST_BYTES);
    let current_body_len = data.len() - header_len;
    if current_body_len < expected {
        let mut body_buf = vec![0; expected - current_body_len];
        stream.read_exact(&mut body_buf).await?;
        data.extend(body_buf);
    }
    Ok(data)
}

/// Status line and header block for a response with a known body length.
fn head(
    status: u16,
    headers: &[(String, String)],
    content_type: Option<&str>,
    length: usize,
    cors: bool,
) -> String {
    let mut out = format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(status));
    if cors {
        for (name, value) in CORS_HEADERS {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
    }
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(content_type) = content_type {
        out.push_str(&format!("Content-Type: {}\r\n", content_type));
    }
    out.push_str(&format!("Content-Length: {}\r\n", length));
    out.push_str("Connection: close\r\n\r\n");
    out
}

async fn write_plain(stream: &mut TcpStream, status: u16, cors: bool) -> io::Result<()> {
    stream.write_all(head(status, &[], None, 0, cors).as_bytes()).await?;
    stream.shutdown().await
}

/// Headers go out before the optional delay; the body only after it.
pub async fn write_mock_response(
    stream: &mut TcpStream,
    response: MockResponse,
    cors: bool,
) -> io::Result<()> {
    let body = response.body.unwrap_or_default();
    let head_block = head(
        response.status,
        &response.headers,
        response.content_type.as_deref(),
        body.len(),
        cors,
    );
    stream.write_all(head_block.as_bytes()).await?;
    stream.flush().await?;

    if let Some(delay) = response.delay {
        sleep(delay).await;
    }
    if !body.is_empty() {
        stream.write_all(body.as_bytes()).await?;
    }
    stream.shutdown().await
}

pub async fn handle_client(
    mut stream: TcpStream,
    routes: Option<Arc<RoutesData>>,
    cors: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_http_request(&mut stream).await?;
    if data.is_empty() {
        return Ok(());
    }
    let mut req = parse_http_request(&data);

    // Permissive preflight answer for browser clients.
    if cors && req.method == "OPTIONS" {
        let max_age = [("Access-Control-Max-Age".to_string(), "86400".to_string())];
        let preflight = head(204, &max_age, None, 0, true);
        stream.write_all(preflight.as_bytes()).await?;
        stream.shutdown().await?;
        return Ok(());
    }

    let Some(routes) = routes else {
        write_plain(&mut stream, 503, cors).await?;
        return Ok(());
    };

    if let Some(docs) = routes.docs.as_ref().filter(|d| req.method == "GET" && d.path == req.path) {
        let head_block = head(200, &[], Some(DOCS_CONTENT_TYPE), docs.source.len(), cors);
        stream.write_all(head_block.as_bytes()).await?;
        stream.write_all(docs.source.as_bytes()).await?;
        stream.shutdown().await?;
        return Ok(());
    }

    match find_route(&routes, &req.path, &req.method) {
        Some((handler, route_params)) => {
            req.route_params = route_params;
            let response = handler.respond(&req);
            info!(method = %req.method, path = %req.path, status = response.status, "mock response");
            write_mock_response(&mut stream, response, cors).await?;
        }
        None => {
            debug!(method = %req.method, path = %req.path, "no route");
            write_plain(&mut stream, 404, cors).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_orders_status_headers_and_framing() {
        let headers = vec![("X-Id".to_string(), "test".to_string())];
        let text = head(201, &headers, Some("application/json"), 2, false);
        assert_eq!(
            text,
            "HTTP/1.1 201 Created\r\nX-Id: test\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn cors_headers_come_first() {
        let text = head(404, &[], None, 0, true);
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\nAccess-Control-Allow-Origin: *\r\n"));
        assert!(!text.contains("Content-Type"));
    }

    #[test]
    fn unknown_status_codes_still_have_a_reason() {
        assert_eq!(reason_phrase(299), "Unknown");
        assert_eq!(reason_phrase(418), "I'm a teapot");
    }
}
