//! Route handlers for the document API, uploaded files and the static frontend.
//! Keeps `http.rs` focused on parsing and writing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, trace};
use serde_json::json;

use crate::documents::DocumentService;
use crate::error::AppError;
use crate::http::{Request, Response};
use crate::response::{file_response, html_response, json_success};
use crate::router::Router;
use crate::server::ServerStats;
use crate::utils::{now_millis, resolve_within};

const DOCUMENTS_PATH: &str = "/api/documents";
const UPLOADS_PREFIX: &str = "/uploads/";

/// Register every route the server answers.
pub fn register_routes(
    router: &mut Router,
    documents: Arc<DocumentService>,
    frontend_dir: Arc<PathBuf>,
    stats: Arc<ServerStats>,
) {
    // Health
    let health_docs = documents.clone();
    router.register_exact(
        "GET",
        "/_health",
        Box::new(move |_: &Request| create_health_check_response(&health_docs)),
    );

    // Admin login
    let login_docs = documents.clone();
    router.register_exact(
        "POST",
        "/api/admin/login",
        Box::new(move |req: &Request| -> Result<Response, AppError> {
            login_docs.login(request_body(req))?;
            Ok(json_success(json!({ "message": "Успешный вход" })))
        }),
    );

    // Documents
    let list_docs = documents.clone();
    router.register_exact(
        "GET",
        DOCUMENTS_PATH,
        Box::new(move |_: &Request| -> Result<Response, AppError> {
            let documents = serde_json::to_value(list_docs.list()?)?;
            Ok(json_success(json!({ "documents": documents })))
        }),
    );

    let upload_docs = documents.clone();
    router.register_exact(
        "POST",
        DOCUMENTS_PATH,
        Box::new(move |req: &Request| handle_upload(req, &upload_docs, &stats)),
    );

    let delete_docs = documents.clone();
    router.register_prefix(
        "DELETE",
        format!("{DOCUMENTS_PATH}/"),
        Box::new(move |req: &Request| -> Result<Response, AppError> {
            let id = req
                .path_only()
                .strip_prefix(DOCUMENTS_PATH)
                .unwrap_or_default()
                .trim_matches('/');
            let removed = delete_docs.delete(id)?;
            info!("Deleted document {} ({})", removed.id, removed.name);
            Ok(json_success(json!({ "message": "Документ удален" })))
        }),
    );

    // Uploaded files
    let uploads_docs = documents;
    router.register_prefix(
        "GET",
        UPLOADS_PREFIX,
        Box::new(move |req: &Request| serve_upload(uploads_docs.uploads_dir(), req.path_only())),
    );

    // Everything else is the frontend
    router.set_fallback(Box::new(move |req: &Request| {
        if req.method != "GET" {
            return Err(AppError::not_found("Not found"));
        }
        serve_frontend(&frontend_dir, req.path_only())
    }));
}

fn request_body(req: &Request) -> &[u8] {
    req.body.as_deref().unwrap_or_default()
}

fn handle_upload(
    req: &Request,
    documents: &DocumentService,
    stats: &ServerStats,
) -> Result<Response, AppError> {
    let body = request_body(req);
    let content_type = req.header("content-type").unwrap_or_default();

    let result = if content_type
        .to_ascii_lowercase()
        .contains("multipart/form-data")
    {
        debug!("Multipart upload, {} bytes", body.len());
        documents.upload_multipart(content_type, body)
    } else {
        debug!("JSON upload, {} bytes", body.len());
        documents.upload_json(body)
    };
    stats.record_upload(result.is_ok(), body.len() as u64);

    let document = serde_json::to_value(result?)?;
    Ok(json_success(json!({
        "document": document,
        "message": "Документ успешно загружен"
    })))
}

fn serve_upload(uploads_dir: &Path, path: &str) -> Result<Response, AppError> {
    let filename = path.strip_prefix(UPLOADS_PREFIX).unwrap_or_default();
    let file_path = resolve_within(uploads_dir, filename)?;
    trace!("Upload requested: {}", file_path.display());

    if !file_path.is_file() {
        debug!("Upload not found: {filename}");
        return Err(AppError::not_found("File not found"));
    }
    let content = fs::read(&file_path)?;
    Ok(file_response(&file_path, content))
}

fn serve_frontend(frontend_dir: &Path, path: &str) -> Result<Response, AppError> {
    let requested = if path == "/" { "index.html" } else { path };
    let primary = resolve_within(frontend_dir, requested)?;

    let candidates = [
        primary,
        frontend_dir.join("index.html"),
        frontend_dir.join("admin.html"),
    ];
    for candidate in &candidates {
        if candidate.is_file() {
            trace!("Serving frontend file {}", candidate.display());
            let content = fs::read(candidate)?;
            return Ok(file_response(candidate, content));
        }
    }

    debug!("No frontend file for {path}, serving placeholder page");
    Ok(html_response(200, placeholder_page(path)))
}

fn placeholder_page(path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Document Viewer</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; text-align: center; background: #f0f0f0; }}
        .container {{ max-width: 600px; margin: 0 auto; background: white; padding: 40px; border-radius: 10px; }}
        .error {{ color: #e74c3c; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Document Viewer</h1>
        <p>Server is running.</p>
        <p class="error">File not found: {}</p>
        <p><a href="/index.html">Home</a> | <a href="/admin.html">Admin</a></p>
    </div>
</body>
</html>
"#,
        escape_html(path)
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn create_health_check_response(documents: &DocumentService) -> Result<Response, AppError> {
    Ok(json_success(json!({
        "status": "healthy",
        "service": "docdrop",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": now_millis() as u64,
        "documents": documents.list()?.len()
    })))
}
