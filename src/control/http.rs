//! Minimal HTTP/1.1 support
//!
//! Request parsing and response writing for the control plane. The surface
//! is deliberately small: one request per connection, form-encoded POST
//! bodies, and byte-limited reads so a misbehaving client cannot hold memory
//! hostage.

use std::collections::HashMap;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest accepted request or header line
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Most headers accepted per request
const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

/// One parsed request
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Path with any query string stripped
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Decode the body as `application/x-www-form-urlencoded`
    pub fn form(&self) -> HashMap<String, String> {
        parse_form(&self.body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpReadError {
    /// Peer closed the connection before sending a request
    #[error("connection closed")]
    Closed,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read and parse one request
pub async fn read_request<R>(reader: &mut R, max_body: usize) -> Result<Request, HttpReadError>
where
    R: AsyncBufRead + Unpin,
{
    let request_line = match read_limited_line(reader).await? {
        Some(line) => line,
        None => return Err(HttpReadError::Closed),
    };

    let mut parts = request_line.split_whitespace();
    let method = match parts.next() {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        Some(_) => Method::Other,
        None => return Err(HttpReadError::Malformed("empty request line".to_string())),
    };
    let target = parts
        .next()
        .ok_or_else(|| HttpReadError::Malformed("missing request target".to_string()))?;
    if parts.next().is_none() {
        return Err(HttpReadError::Malformed("missing HTTP version".to_string()));
    }
    if !target.starts_with('/') {
        return Err(HttpReadError::Malformed(format!(
            "unsupported request target {target}"
        )));
    }

    // Query strings are accepted but parameters arrive in POST bodies.
    let path = match target.split_once('?') {
        Some((path, _)) => path.to_string(),
        None => target.to_string(),
    };

    let mut content_length = 0usize;
    let mut content_type = None;
    for _ in 0..MAX_HEADERS {
        let line = match read_limited_line(reader).await? {
            Some(line) => line,
            None => {
                return Err(HttpReadError::Malformed(
                    "connection closed mid-headers".to_string(),
                ))
            }
        };
        if line.is_empty() {
            let body = read_body(reader, content_length, max_body).await?;
            return Ok(Request {
                method,
                path,
                content_type,
                body,
            });
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpReadError::Malformed(format!("bad header line {line}")));
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "content-length" => {
                content_length = value.parse().map_err(|_| {
                    HttpReadError::Malformed(format!("bad content-length {value}"))
                })?;
            }
            "content-type" => content_type = Some(value.to_string()),
            _ => {}
        }
    }

    Err(HttpReadError::Malformed("too many headers".to_string()))
}

/// Read one CRLF-terminated line, bounded by `MAX_LINE_BYTES`
///
/// Returns `None` on a clean EOF before any bytes.
async fn read_limited_line<R>(reader: &mut R) -> Result<Option<String>, HttpReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_line(&mut line)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => {
                HttpReadError::Malformed("request is not valid UTF-8".to_string())
            }
            _ => HttpReadError::Io(e),
        })?;
    if n == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && n as u64 >= MAX_LINE_BYTES {
        return Err(HttpReadError::Malformed("header line too long".to_string()));
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn read_body<R>(
    reader: &mut R,
    content_length: usize,
    max_body: usize,
) -> Result<Vec<u8>, HttpReadError>
where
    R: AsyncBufRead + Unpin,
{
    if content_length == 0 {
        return Ok(Vec::new());
    }
    if content_length > max_body {
        return Err(HttpReadError::Malformed(format!(
            "body of {content_length} bytes exceeds limit"
        )));
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// One response, written with `Connection: close`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    /// Bodyless response
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
        }
    }

    /// 200 with no body
    pub fn ok() -> Self {
        Self::empty(200)
    }

    /// JSON response
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into_bytes(),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}

/// Write one response
///
/// Every response allows cross-origin access; the control plane is driven
/// from browser UIs served elsewhere.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
        response.status,
        reason(response.status),
        response.content_type,
        response.body.len(),
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await
}

/// Decode `application/x-www-form-urlencoded` pairs
///
/// Decoding is lenient: bad percent escapes pass through literally and
/// pairs without `=` are ignored.
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    let text = String::from_utf8_lossy(body);
    let mut form = HashMap::new();
    for pair in text.split('&') {
        if let Some((name, value)) = pair.split_once('=') {
            form.insert(percent_decode(name), percent_decode(value));
        }
    }
    form
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
