use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use preflight_explain::ExplainError;
use serde_json::{json, Value};
use tokio::runtime::Handle;

use crate::service::{FlightService, ServiceError};

pub const EVALUATE_PATH: &str = "/api/should-you-fly/evaluate";
pub const HISTORY_PATH: &str = "/api/should-you-fly/history";

/// Largest request body accepted; a FlightContext is well under 1 KiB.
pub const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_HEAD_BYTES: u64 = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal HTTP/1.1 front end. Every connection gets its own thread; async
/// provider work is driven on the shared runtime behind `runtime`.
#[derive(Clone)]
pub struct HttpServer {
    service: Arc<FlightService>,
    runtime: Handle,
}

impl HttpServer {
    pub fn new(service: Arc<FlightService>, runtime: Handle) -> Self {
        Self { service, runtime }
    }

    pub fn serve(&self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!(addr = %listener.local_addr()?, "preflightd http listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    std::thread::spawn(move || {
                        if let Err(err) = server.handle_connection(stream) {
                            tracing::warn!(error = %err, "http request error");
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "http accept error");
                }
            }
        }
        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let response = match read_http_request(&stream)? {
            None => return Ok(()),
            Some(Incoming::Request(req)) => self.dispatch(req),
            Some(Incoming::TooLarge { declared }) => {
                tracing::warn!(declared, limit = MAX_BODY_BYTES, "rejected oversized request body");
                error_response(
                    413,
                    "payload_too_large",
                    &format!("request body of {declared} bytes exceeds {MAX_BODY_BYTES}"),
                )
            }
        };
        write_http_response(&mut stream, response)
    }

    fn dispatch(&self, req: HttpRequest) -> HttpResponse {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/health") => HttpResponse::json(200, json!({"status": "ok"})),
            ("POST", EVALUATE_PATH) => {
                let agent_source = req.query.get("agent_source").map(String::as_str);
                let result = self
                    .runtime
                    .block_on(self.service.evaluate_json(&req.body, agent_source));
                match result {
                    Ok(evaluation) => match serde_json::to_value(&evaluation) {
                        Ok(value) => HttpResponse::json(200, value),
                        Err(err) => error_response(500, "internal_error", &err.to_string()),
                    },
                    Err(err) => service_error_response(&err),
                }
            }
            ("GET", HISTORY_PATH) => match serde_json::to_value(self.service.history()) {
                Ok(value) => HttpResponse::json(200, value),
                Err(err) => error_response(500, "internal_error", &err.to_string()),
            },
            (_, "/health" | EVALUATE_PATH | HISTORY_PATH) => {
                error_response(405, "method_not_allowed", &req.method)
            }
            _ => error_response(404, "not_found", &req.path),
        }
    }
}

fn service_error_response(err: &ServiceError) -> HttpResponse {
    let (status, code) = match err {
        ServiceError::Validation(_) => (422, "validation_error"),
        ServiceError::Explanation(ExplainError::NotConfigured(_)) => (503, "configuration_error"),
        ServiceError::Explanation(_) => (502, "provider_error"),
    };
    if status == 422 {
        tracing::debug!(error = %err, "rejected evaluation request");
    } else {
        tracing::warn!(error = %err, status, "evaluation failed");
    }
    error_response(status, code, &err.to_string())
}

fn error_response(status: u16, code: &str, detail: &str) -> HttpResponse {
    HttpResponse::json(status, json!({"error": code, "detail": detail}))
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

#[derive(Debug)]
enum Incoming {
    Request(HttpRequest),
    TooLarge { declared: usize },
}

struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, value: Value) -> Self {
        let body = serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec());
        Self { status, body }
    }
}

fn read_http_request(stream: &TcpStream) -> io::Result<Option<Incoming>> {
    let head = stream.try_clone()?.take(MAX_HEAD_BYTES);
    let mut reader = io::BufReader::new(head);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let first = line.trim_end_matches(['\r', '\n']);
    if first.is_empty() {
        return Ok(None);
    }

    let mut parts = first.split_whitespace();
    let Some(method) = parts.next() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid http request line (missing method)",
        ));
    };
    let Some(path_with_query) = parts.next() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid http request line (missing path)",
        ));
    };
    let (path, query) = parse_path_query(path_with_query);

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().unwrap_or(0);
            }
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Ok(Some(Incoming::TooLarge {
            declared: content_length,
        }));
    }

    let mut body = vec![0_u8; content_length];
    if content_length > 0 {
        // The head cap no longer applies once the declared length is known.
        reader.get_mut().set_limit(MAX_BODY_BYTES as u64);
        reader.read_exact(&mut body)?;
    }
    Ok(Some(Incoming::Request(HttpRequest {
        method: method.to_string(),
        path,
        query,
        body,
    })))
}

fn write_http_response(stream: &mut TcpStream, response: HttpResponse) -> io::Result<()> {
    let reason = http_reason_phrase(response.status);
    let headers = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.body.len()
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

fn parse_path_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = match raw.split_once('?') {
        Some((p, q)) => (p.to_string(), q),
        None => (raw.to_string(), ""),
    };
    let mut query = HashMap::new();
    for pair in query_str.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if let (Some(k), Some(v)) = (percent_decode(k), percent_decode(v)) {
            query.insert(k, v);
        }
    }
    (path, query)
}

/// Decodes `%XX` escapes and `+`; `None` for malformed escapes or non-UTF-8.
fn percent_decode(value: &str) -> Option<String> {
    if !value.contains(['%', '+']) {
        return Some(value.to_string());
    }

    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = [bytes.next()?, bytes.next()?];
                let hex = std::str::from_utf8(&hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
            }
            other => out.push(other),
        }
    }
    String::from_utf8(out).ok()
}
