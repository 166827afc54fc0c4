// SPDX-License-Identifier: MIT

use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Glob(glob::PatternError),
    AddrParse(std::net::AddrParseError),
    BadRequest(String),
    NotFound(String),
    Forbidden,
    Unauthorized(String),
    MethodNotAllowed,
    InternalServerError(String),
    // Upload-specific errors
    PayloadTooLarge(u64),         // Contains the maximum allowed size
    UnsupportedMediaType(String), // Contains the rejected filename
    InvalidMultipart(String),     // Contains what was missing or malformed
    Storage(String),              // Contains the failed storage operation
    InvalidConfiguration(String), // Contains configuration error details
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "IO error: {err}"),
            AppError::Json(err) => write!(f, "JSON error: {err}"),
            AppError::Glob(err) => write!(f, "Glob pattern error: {err}"),
            AppError::AddrParse(err) => write!(f, "Address parse error: {err}"),
            AppError::BadRequest(msg) => write!(f, "{msg}"),
            AppError::NotFound(msg) => write!(f, "{msg}"),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::Unauthorized(msg) => write!(f, "{msg}"),
            AppError::MethodNotAllowed => write!(f, "Method not allowed"),
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
            AppError::PayloadTooLarge(max_size) => {
                write!(
                    f,
                    "Upload payload too large. Maximum allowed size: {max_size} bytes"
                )
            }
            AppError::UnsupportedMediaType(filename) => {
                write!(f, "File type of '{filename}' is not allowed")
            }
            AppError::InvalidMultipart(msg) => write!(f, "{msg}"),
            AppError::Storage(msg) => write!(f, "Storage error: {msg}"),
            AppError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl From<glob::PatternError> for AppError {
    fn from(err: glob::PatternError) -> Self {
        AppError::Glob(err)
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(err: std::net::AddrParseError) -> Self {
        AppError::AddrParse(err)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn invalid_multipart<S: Into<String>>(msg: S) -> Self {
        AppError::InvalidMultipart(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::Storage(msg.into())
    }

    pub fn payload_too_large(max_size: u64) -> Self {
        AppError::PayloadTooLarge(max_size)
    }

    pub fn unsupported_media_type<S: Into<String>>(filename: S) -> Self {
        AppError::UnsupportedMediaType(filename.into())
    }

    /// HTTP status code and reason phrase for this error
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            AppError::BadRequest(_) | AppError::InvalidMultipart(_) | AppError::Json(_) => {
                (400, "Bad Request")
            }
            AppError::Unauthorized(_) => (401, "Unauthorized"),
            AppError::Forbidden => (403, "Forbidden"),
            AppError::NotFound(_) => (404, "Not Found"),
            AppError::MethodNotAllowed => (405, "Method Not Allowed"),
            AppError::PayloadTooLarge(_) => (413, "Payload Too Large"),
            AppError::UnsupportedMediaType(_) => (415, "Unsupported Media Type"),
            _ => (500, "Internal Server Error"),
        }
    }

    /// Checks if the error was caused by the client's request
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status().0)
    }
}
