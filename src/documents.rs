//! Document upload service.
//!
//! Sits between the HTTP handlers and storage:
//! - decodes multipart bodies with [`crate::multipart`]
//! - validates the uploaded file against size limits and extension globs
//! - writes the file under the uploads directory with a generated name
//! - records the metadata through a [`DocumentStore`]
//!
//! # Example Usage
//! ```rust,no_run
//! use docdrop::documents::DocumentService;
//! use docdrop::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = DocumentService::new("/srv/docdrop/uploads", Arc::new(MemoryStore::new()), "admin123")?
//!     .with_allowed_extensions("*.pdf,*.docx")?
//!     .with_max_upload_size(10 * 1024 * 1024);
//! println!("{} documents", service.list()?.len());
//! # Ok(())
//! # }
//! ```

use crate::error::AppError;
use crate::multipart::{self, FilePart};
use crate::store::{Document, DocumentStore};
use crate::utils::{now_millis, random_token};
use chrono::{SecondsFormat, Utc};
use glob::Pattern;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Temporary file prefix for atomic writes
const TEMP_FILE_PREFIX: &str = ".docdrop_temp_";

pub const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_NAME_PREFIX: &str = "Документ ";
const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Body of a JSON upload. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonUpload {
    document_name: Option<String>,
    document_category: Option<String>,
    original_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    password: String,
}

pub struct DocumentService {
    uploads_dir: PathBuf,
    store: Arc<dyn DocumentStore>,
    admin_password: String,
    /// Allowed file extensions (glob patterns)
    allowed_extensions: Vec<Pattern>,
    /// Form field names that may carry the file, first match wins
    file_fields: Vec<String>,
    max_upload_size: u64,
}

impl DocumentService {
    /// Create a service writing into `uploads_dir`, creating it when missing.
    pub fn new<P: Into<PathBuf>>(
        uploads_dir: P,
        store: Arc<dyn DocumentStore>,
        admin_password: &str,
    ) -> Result<Self, AppError> {
        let uploads_dir = uploads_dir.into();
        Self::ensure_directory_exists(&uploads_dir)?;

        Ok(Self {
            uploads_dir,
            store,
            admin_password: admin_password.to_string(),
            allowed_extensions: vec![Pattern::new("*")?],
            file_fields: vec!["file".to_string(), "documentFile".to_string()],
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        })
    }

    /// Restrict uploads to comma-separated glob patterns such as `*.pdf,*.docx`.
    pub fn with_allowed_extensions(mut self, patterns: &str) -> Result<Self, AppError> {
        self.allowed_extensions = patterns
            .split(',')
            .map(|ext| ext.trim())
            .filter(|ext| !ext.is_empty())
            .map(Pattern::new)
            .collect::<Result<Vec<Pattern>, _>>()?;
        Ok(self)
    }

    pub fn with_file_fields(mut self, fields: Vec<String>) -> Self {
        self.file_fields = fields;
        self
    }

    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    fn ensure_directory_exists(dir: &Path) -> Result<(), AppError> {
        if dir.exists() {
            if !dir.is_dir() {
                return Err(AppError::InvalidConfiguration(format!(
                    "Uploads path is not a directory: {}",
                    dir.display()
                )));
            }
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create uploads directory {}: {e}", dir.display());
            AppError::from(e)
        })?;
        info!("Created uploads directory: {}", dir.display());
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Document>, AppError> {
        let documents = self.store.list()?;
        debug!("Listing {} documents", documents.len());
        Ok(documents)
    }

    /// Store a document sent as `multipart/form-data`.
    pub fn upload_multipart(&self, content_type: &str, body: &[u8]) -> Result<Document, AppError> {
        if body.len() as u64 > self.max_upload_size {
            return Err(AppError::payload_too_large(self.max_upload_size));
        }

        let boundary = multipart::extract_boundary(content_type)
            .ok_or_else(|| AppError::invalid_multipart("No boundary found"))?;

        let mut form = multipart::decode(body, &boundary);
        if form.is_empty() {
            return Err(AppError::invalid_multipart(
                "No parts found in multipart data",
            ));
        }

        let name = form
            .text("documentName")
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let category = form
            .text("documentCategory")
            .filter(|category| !category.is_empty())
            .map(str::to_string);

        let file = self
            .file_fields
            .iter()
            .find_map(|field| form.take_file(field).filter(|file| !file.content.is_empty()))
            .ok_or_else(|| AppError::bad_request("No file received"))?;

        self.validate_file_extension(&file.filename)?;
        self.store_file(file, name, category)
    }

    fn store_file(
        &self,
        file: FilePart,
        name: Option<String>,
        category: Option<String>,
    ) -> Result<Document, AppError> {
        let millis = now_millis();
        let extension = stored_extension(&file.filename);
        let filename = format!("{millis}-{}{extension}", random_token());

        self.write_file_atomically(&self.uploads_dir.join(&filename), &file.content)?;
        info!(
            "Saved upload '{}' as {filename} ({} bytes)",
            file.filename,
            file.content.len()
        );

        let document = Document {
            id: millis.to_string(),
            name: name.unwrap_or_else(|| default_name(millis)),
            original_name: file.filename,
            kind: derive_type(&extension),
            category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            url: format!("/uploads/{filename}"),
            filename,
            upload_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            is_new: true,
        };

        self.store.append(document.clone())?;
        info!("Document added: {} ({})", document.name, document.id);
        Ok(document)
    }

    /// Store a document described by a JSON body. No file bytes are sent, a
    /// short text description is written in their place.
    pub fn upload_json(&self, body: &[u8]) -> Result<Document, AppError> {
        let data: JsonUpload = if body.iter().all(u8::is_ascii_whitespace) {
            JsonUpload::default()
        } else {
            serde_json::from_slice(body).unwrap_or_else(|e| {
                warn!("Invalid JSON upload body, using defaults: {e}");
                JsonUpload::default()
            })
        };

        let millis = now_millis();
        let name = data
            .document_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_name(millis));
        let category = data
            .document_category
            .filter(|category| !category.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let original_name = data
            .original_name
            .filter(|original| !original.is_empty())
            .unwrap_or_else(|| "document.txt".to_string());

        let upload_date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let filename = format!("doc-{millis}.txt");
        let description = format!("Название: {name}\nКатегория: {category}\nДата: {upload_date}");
        self.write_file_atomically(&self.uploads_dir.join(&filename), description.as_bytes())?;

        let document = Document {
            id: millis.to_string(),
            name,
            original_name,
            url: format!("/uploads/{filename}"),
            filename,
            kind: "txt".to_string(),
            category,
            upload_date,
            is_new: true,
        };

        self.store.append(document.clone())?;
        info!("Document added from JSON: {} ({})", document.name, document.id);
        Ok(document)
    }

    /// Delete a document and its stored file.
    pub fn delete(&self, id: &str) -> Result<Document, AppError> {
        let document = self
            .store
            .remove(id)?
            .ok_or_else(|| AppError::not_found("Документ не найден"))?;

        let path = self.uploads_dir.join(&document.filename);
        match fs::remove_file(&path) {
            Ok(()) => info!("Removed file {}", document.filename),
            Err(e) => warn!(
                "Could not remove {} ({e}), deleting the record anyway",
                path.display()
            ),
        }
        Ok(document)
    }

    /// Check an admin login body `{"password": "..."}`.
    pub fn login(&self, body: &[u8]) -> Result<(), AppError> {
        let request: LoginRequest = serde_json::from_slice(body).map_err(|e| {
            debug!("Malformed login body: {e}");
            AppError::bad_request("Неверный формат данных")
        })?;

        if request.password != self.admin_password {
            warn!("Rejected admin login attempt");
            return Err(AppError::Unauthorized("Неверный пароль".to_string()));
        }
        info!("Admin logged in");
        Ok(())
    }

    /// Validate file extension against allowed patterns
    fn validate_file_extension(&self, filename: &str) -> Result<(), AppError> {
        if self.allowed_extensions.is_empty() {
            return Ok(());
        }

        let path = Path::new(filename);
        let matches = self.allowed_extensions.iter().any(|pattern| {
            pattern.matches_path(path) || pattern.matches(&filename.to_lowercase())
        });

        if !matches {
            warn!("Rejected upload with disallowed extension: {filename}");
            return Err(AppError::unsupported_media_type(filename));
        }
        Ok(())
    }

    /// Write file atomically using temporary file and rename
    fn write_file_atomically(&self, target_path: &Path, content: &[u8]) -> Result<(), AppError> {
        let temp_path = self.uploads_dir.join(format!(
            "{TEMP_FILE_PREFIX}{}_{}",
            std::process::id(),
            random_token()
        ));

        let written = File::create(&temp_path).and_then(|mut temp_file| {
            temp_file.write_all(content)?;
            temp_file.sync_all()
        });
        if let Err(e) = written {
            error!("Failed to write temporary file {temp_path:?}: {e}");
            let _ = fs::remove_file(&temp_path);
            return Err(AppError::storage("Failed to save file"));
        }

        fs::rename(&temp_path, target_path).map_err(|e| {
            error!("Failed to rename {temp_path:?} to {target_path:?}: {e}");
            let _ = fs::remove_file(&temp_path);
            AppError::storage("Failed to save file")
        })?;

        debug!("Wrote {} bytes to {target_path:?}", content.len());
        Ok(())
    }
}

fn default_name(millis: u128) -> String {
    format!("{DEFAULT_NAME_PREFIX}{millis}")
}

/// Extension for the stored file, with the leading dot. Falls back to
/// `.bin` when the original has none or it is not plain alphanumeric.
pub fn stored_extension(original: &str) -> String {
    Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".bin".to_string())
}

/// Document type tag from a stored extension: lowercased, no dot,
/// `jpeg` folded into `jpg`.
pub fn derive_type(extension: &str) -> String {
    let kind = extension.trim_start_matches('.').to_lowercase();
    match kind.as_str() {
        "" => "file".to_string(),
        "jpeg" => "jpg".to_string(),
        _ => kind,
    }
}
