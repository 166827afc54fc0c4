// SPDX-License-Identifier: MIT

//! Response builders shared by the handlers: JSON envelopes, error bodies,
//! MIME detection and CORS headers.

use crate::error::AppError;
use crate::http::{Response, ResponseBody};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::Path;

/// MIME type for a file, chosen by extension
pub fn get_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Reason phrase for the status codes this server emits
pub fn status_text(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        _ => "Internal Server Error",
    }
}

/// Add the permissive CORS headers every response carries
pub fn apply_cors_headers(headers: &mut HashMap<String, String>) {
    headers
        .entry("Access-Control-Allow-Origin".to_string())
        .or_insert_with(|| "*".to_string());
    headers
        .entry("Access-Control-Allow-Methods".to_string())
        .or_insert_with(|| "GET, POST, DELETE, OPTIONS".to_string());
    headers
        .entry("Access-Control-Allow-Headers".to_string())
        .or_insert_with(|| "Content-Type, Authorization".to_string());
}

pub fn json_response(status_code: u16, value: &Value) -> Response {
    let mut headers = HashMap::new();
    headers.insert(
        "Content-Type".to_string(),
        "application/json; charset=utf-8".to_string(),
    );
    headers.insert("Cache-Control".to_string(), "no-cache".to_string());

    Response {
        status_code,
        status_text: status_text(status_code).to_string(),
        headers,
        body: ResponseBody::Text(value.to_string()),
    }
}

/// `{"success": true, ...fields}` with status 200
pub fn json_success(fields: Value) -> Response {
    let mut envelope = Map::new();
    envelope.insert("success".to_string(), Value::Bool(true));
    if let Value::Object(extra) = fields {
        envelope.extend(extra);
    }
    json_response(200, &Value::Object(envelope))
}

/// `{"success": false, "error": "<message>"}` with the error's status code
pub fn create_error_response(error: &AppError) -> Response {
    let (status_code, _) = error.status();
    let message = if error.is_client_error() {
        error.to_string()
    } else {
        match error {
            AppError::Storage(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    };
    json_response(status_code, &json!({ "success": false, "error": message }))
}

pub fn html_response(status_code: u16, html: String) -> Response {
    let mut headers = HashMap::new();
    headers.insert(
        "Content-Type".to_string(),
        "text/html; charset=utf-8".to_string(),
    );
    Response {
        status_code,
        status_text: status_text(status_code).to_string(),
        headers,
        body: ResponseBody::Text(html),
    }
}

pub fn file_response(path: &Path, content: Vec<u8>) -> Response {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), get_mime_type(path).to_string());
    Response {
        status_code: 200,
        status_text: "OK".to_string(),
        headers,
        body: ResponseBody::Binary(content),
    }
}

pub fn empty_response(status_code: u16) -> Response {
    Response {
        status_code,
        status_text: status_text(status_code).to_string(),
        headers: HashMap::new(),
        body: ResponseBody::Text(String::new()),
    }
}
