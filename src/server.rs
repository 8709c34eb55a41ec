//! HTTP Server
//!
//! Minimal HTTP/1.1 listener on plain tokio sockets. One task per
//! connection, one request per connection, JSON bodies with permissive
//! CORS headers.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::engine::AnalyticsEngine;
use crate::error::{AnalyticsError, Result};
use crate::views::ViewKind;

/// Requests above this size are dropped unanswered.
const MAX_REQUEST_BYTES: usize = 1_000_000;

pub const MARKETS_ROUTE: &str = "/api/available_markets";
pub const HEALTH_ROUTE: &str = "/health";

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Self::error(&AnalyticsError::Json(e))
            }
        }
    }

    pub fn error(err: &AnalyticsError) -> Self {
        Self {
            status: err.status_code(),
            body: err.to_body().to_string(),
        }
    }

    fn message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }).to_string(),
        }
    }

    /// Full HTTP/1.1 response text.
    pub fn to_http(&self) -> String {
        create_response(self.status, status_text(self.status), &self.body)
    }
}

/// Accept connections until the listener fails.
pub async fn serve(engine: Arc<AnalyticsEngine>, config: &AppConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Analytics API listening on {} (source: {})",
        config.bind_addr,
        engine.source().describe()
    );
    serve_listener(listener, engine, config.read_timeout).await
}

/// Accept loop over an already-bound listener.
pub async fn serve_listener(listener: TcpListener, engine: Arc<AnalyticsEngine>, read_timeout: Duration) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, Arc::clone(&engine), read_timeout));
    }
}

async fn handle_connection(mut stream: TcpStream, engine: Arc<AnalyticsEngine>, read_timeout: Duration) {
    let buffer = match timeout(read_timeout, read_request(&mut stream)).await {
        Ok(Ok(buffer)) => buffer,
        Ok(Err(e)) => {
            warn!("Failed to read from stream: {}", e);
            return;
        }
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
    };

    if buffer.is_empty() {
        return;
    }

    let request = match String::from_utf8(buffer) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to parse request as UTF-8: {}", e);
            return;
        }
    };

    let response = handle_request(&engine, &request).await;
    if let Err(e) = stream.write_all(response.to_http().as_bytes()).await {
        warn!("Failed to write response: {}", e);
    }
}

/// Read until headers plus any declared body have arrived.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    loop {
        let n = stream.read(&mut temp_buf).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&temp_buf[..n]);

        if let Some(headers_end) = find_headers_end(&buffer) {
            let head = String::from_utf8_lossy(&buffer[..headers_end]);
            let content_length = extract_content_length(&head).unwrap_or(0);
            let expected = request_size(headers_end, content_length)
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "request too large"))?;
            if buffer.len() >= expected {
                break;
            }
        }

        if buffer.len() > MAX_REQUEST_BYTES {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "request too large"));
        }
    }

    Ok(buffer)
}

/// Total bytes a request declares, or `None` when it would exceed
/// `MAX_REQUEST_BYTES`.
fn request_size(headers_end: usize, content_length: usize) -> Option<usize> {
    headers_end
        .checked_add(content_length)
        .filter(|total| *total <= MAX_REQUEST_BYTES)
}

fn find_headers_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

/// Parse the request line and dispatch.
pub async fn handle_request(engine: &AnalyticsEngine, request: &str) -> HttpResponse {
    let request_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return HttpResponse::message(400, "Bad Request");
    }

    let method = parts[0];
    let target = parts[1];
    let request_id = Uuid::new_v4();
    let span = info_span!("request", id = %request_id, method = method, target = target);

    async {
        let response = route(engine, method, target).await;
        info!(status = response.status, "Handled request");
        response
    }
    .instrument(span)
    .await
}

/// Route a method and request target (path plus optional query string).
pub async fn route(engine: &AnalyticsEngine, method: &str, target: &str) -> HttpResponse {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let mut path = path.trim_end_matches('/');
    if path.is_empty() {
        path = "/";
    }

    if method.eq_ignore_ascii_case("OPTIONS") {
        return HttpResponse {
            status: 204,
            body: String::new(),
        };
    }

    let known = path == MARKETS_ROUTE || path == HEALTH_ROUTE || ViewKind::from_route(path).is_some();
    if !known {
        return HttpResponse::message(404, "Not found");
    }
    if !method.eq_ignore_ascii_case("GET") {
        return HttpResponse::message(405, "Method not allowed");
    }

    if path == HEALTH_ROUTE {
        return HttpResponse::json(200, &json!({ "status": "ok" }));
    }

    if path == MARKETS_ROUTE {
        return match engine.available_markets().await {
            Ok(markets) => HttpResponse::json(200, &markets),
            Err(err) => HttpResponse::error(&err),
        };
    }

    let Some(kind) = ViewKind::from_route(path) else {
        return HttpResponse::message(404, "Not found");
    };

    let params = parse_query(query.unwrap_or(""));
    let market_id = params.get("market_id").map(String::as_str);
    match engine.view(kind, market_id).await {
        Ok(view) => HttpResponse::json(200, &view),
        Err(err) => HttpResponse::error(&err),
    }
}

/// Decode `application/x-www-form-urlencoded` query pairs. Later
/// duplicates win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
