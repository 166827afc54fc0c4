//! Handles HTTP request parsing and response writing.

use crate::error::AppError;
use crate::response::{apply_cors_headers, create_error_response};
use crate::router::Router;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::prelude::*;
use std::net::TcpStream;
use std::time::Duration;

/// Maximum size for request headers (8KB) to prevent header buffer overflow
const MAX_HEADERS_SIZE: usize = 8 * 1024;

/// Chunk size used while buffering a request body
const BODY_CHUNK_SIZE: usize = 8192;

/// Represents a parsed incoming HTTP request.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

/// Represents an outgoing HTTP response.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

#[derive(Debug)]
pub enum ResponseBody {
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Text(text) => text.as_bytes(),
            ResponseBody::Binary(bytes) => bytes,
        }
    }
}

impl Request {
    /// Parse a request from the stream, buffering at most `max_body_size` body bytes
    pub fn from_stream(stream: &mut TcpStream, max_body_size: u64) -> Result<Self, AppError> {
        stream.set_read_timeout(Some(Duration::from_secs(30)))?;

        let (headers_data, remaining_bytes) = Self::read_headers_with_remaining(stream)?;
        Self::parse(&headers_data, remaining_bytes, stream, max_body_size)
    }

    /// Parse the request line and headers, then read the body from `reader`
    pub fn parse<R: Read>(
        headers_data: &str,
        remaining_bytes: Vec<u8>,
        reader: &mut R,
        max_body_size: u64,
    ) -> Result<Self, AppError> {
        let mut lines = headers_data.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| AppError::bad_request("Empty request"))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(AppError::bad_request("Malformed request line"));
        }

        let method = parts[0].to_uppercase();
        let path = decode_url(parts[1]);
        let version = parts[2];

        if !version.starts_with("HTTP/1.") {
            return Err(AppError::bad_request("Unsupported HTTP version"));
        }

        let mut headers = HashMap::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                break;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase();
                let value = value.trim().to_string();

                if let Some(existing) = headers.get(&key) {
                    headers.insert(key, format!("{existing}, {value}"));
                } else {
                    headers.insert(key, value);
                }
            }
        }

        let body = Self::read_request_body(reader, &headers, remaining_bytes, max_body_size)?;

        debug!(
            "Parsed request: {} {} (headers: {}, body_size: {})",
            method,
            path,
            headers.len(),
            body.as_ref().map(|b| b.len()).unwrap_or(0)
        );

        Ok(Request {
            method,
            path,
            headers,
            body,
        })
    }

    /// Path without the query string
    pub fn path_only(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Read HTTP headers in chunks and return the bytes already read past them
    fn read_headers_with_remaining(stream: &mut TcpStream) -> Result<(String, Vec<u8>), AppError> {
        let mut buffer = vec![0; MAX_HEADERS_SIZE];
        let mut total_read = 0;

        loop {
            match stream.read(&mut buffer[total_read..]) {
                Ok(0) => {
                    if total_read == 0 {
                        return Err(AppError::bad_request("Connection closed before request"));
                    }
                    break;
                }
                Ok(bytes_read) => {
                    total_read += bytes_read;

                    if let Some((headers_end, body_start)) = find_headers_end(&buffer[..total_read])
                    {
                        let headers_data = std::str::from_utf8(&buffer[..headers_end])
                            .map_err(|_| AppError::bad_request("Request headers are not UTF-8"))?;
                        let remaining_bytes = buffer[body_start..total_read].to_vec();
                        return Ok((headers_data.to_string(), remaining_bytes));
                    }

                    if total_read >= buffer.len() {
                        return Err(AppError::bad_request("Request headers too large"));
                    }
                }
                Err(e) => return Err(AppError::Io(e)),
            }
        }

        match std::str::from_utf8(&buffer[..total_read]) {
            Ok(data) => Ok((data.to_string(), Vec::new())),
            Err(_) => Err(AppError::bad_request("Request headers are not UTF-8")),
        }
    }

    /// Buffer the whole body announced by Content-Length
    fn read_request_body<R: Read>(
        reader: &mut R,
        headers: &HashMap<String, String>,
        remaining_bytes: Vec<u8>,
        max_body_size: u64,
    ) -> Result<Option<Vec<u8>>, AppError> {
        let content_length = match headers.get("content-length") {
            Some(length_str) => length_str
                .parse::<u64>()
                .map_err(|_| AppError::bad_request("Invalid Content-Length"))?,
            None => {
                if let Some(encoding) = headers.get("transfer-encoding")
                    && encoding.to_lowercase().contains("chunked")
                {
                    warn!("Chunked transfer encoding is not supported");
                    return Err(AppError::bad_request(
                        "Chunked transfer encoding is not supported",
                    ));
                }
                return Ok(None);
            }
        };

        if content_length == 0 {
            return Ok(Some(Vec::new()));
        }

        if content_length > max_body_size {
            return Err(AppError::payload_too_large(max_body_size));
        }

        let content_length = content_length as usize;
        let mut body = Vec::with_capacity(content_length);

        let bytes_from_headers = remaining_bytes.len().min(content_length);
        body.extend_from_slice(&remaining_bytes[..bytes_from_headers]);

        let mut buffer = vec![0; BODY_CHUNK_SIZE];
        while body.len() < content_length {
            let to_read = (content_length - body.len()).min(BODY_CHUNK_SIZE);

            match reader.read(&mut buffer[..to_read]) {
                Ok(0) => {
                    return Err(AppError::bad_request("Request body ended early"));
                }
                Ok(n) => body.extend_from_slice(&buffer[..n]),
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock
                    {
                        warn!("Request body read timeout");
                    }
                    return Err(AppError::Io(e));
                }
            }
        }

        debug!("Successfully read request body: {} bytes", body.len());
        Ok(Some(body))
    }
}

/// Locate the blank line ending the header block, CRLF or bare LF
fn find_headers_end(data: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = data.windows(4).position(|window| window == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    data.windows(2)
        .position(|window| window == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

/// Percent-decode a request path; invalid escapes are kept as-is
pub fn decode_url(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

/// Top-level function to handle a client connection.
pub fn handle_client(mut stream: TcpStream, router: &Router, max_body_size: u64) -> bool {
    let log_prefix = match stream.peer_addr() {
        Ok(addr) => format!("[{addr}]"),
        Err(_) => "[unknown]".to_string(),
    };

    let request = match Request::from_stream(&mut stream, max_body_size) {
        Ok(req) => req,
        Err(e) => {
            warn!("{log_prefix} Failed to parse request: {e}");
            send_error_response(&mut stream, &e, &log_prefix);
            return false;
        }
    };

    info!("{log_prefix} {} {}", request.method, request.path_only());

    match router.route(&request) {
        Ok(response) => match send_response(&mut stream, response, &log_prefix) {
            Ok(_) => true,
            Err(e) => {
                error!("{log_prefix} Failed to send response: {e}");
                false
            }
        },
        Err(e) => {
            if e.is_client_error() {
                warn!("{log_prefix} Request rejected: {e}");
            } else {
                error!("{log_prefix} Error processing request: {e}");
            }
            send_error_response(&mut stream, &e, &log_prefix);
            false
        }
    }
}

/// Sends a fully formed `Response` to the client. Returns body bytes written.
pub fn send_response<W: Write>(
    stream: &mut W,
    mut response: Response,
    log_prefix: &str,
) -> Result<u64, std::io::Error> {
    debug!(
        "{} {} {}",
        log_prefix, response.status_code, response.status_text
    );

    apply_cors_headers(&mut response.headers);

    let body = response.body.as_bytes();
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status_code, response.status_text
    );
    head.push_str(concat!("Server: docdrop/", env!("CARGO_PKG_VERSION"), "\r\n"));
    head.push_str("Connection: close\r\n");

    for (key, value) in &response.headers {
        head.push_str(&format!("{key}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));

    stream.write_all(head.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(body.len() as u64)
}

/// Sends the JSON error body for `error`.
fn send_error_response(stream: &mut TcpStream, error: &AppError, log_prefix: &str) {
    let response = create_error_response(error);
    info!(
        "{log_prefix} {} {}",
        response.status_code, response.status_text
    );
    if let Err(e) = send_response(stream, response, log_prefix) {
        error!("{log_prefix} Failed to send error response: {e}");
    }
}
