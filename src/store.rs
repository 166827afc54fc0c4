// SPDX-License-Identifier: MIT

//! Document catalogue storage.
//!
//! The upload service talks to storage only through [`DocumentStore`]. The
//! on-disk implementation keeps everything in one pretty-printed JSON file
//! and rewrites it on every change:
//!
//! ```json
//! {
//!   "documents": [ { "id": "1709296205123", "name": "Report", ... } ],
//!   "settings": { "adminPassword": "admin123" }
//! }
//! ```

use crate::error::AppError;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Metadata record for one stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub original_name: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub url: String,
    pub upload_date: String,
    pub is_new: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
}

/// Whole database file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub settings: Settings,
}

/// Storage seam between the upload service and persistence.
pub trait DocumentStore: Send + Sync {
    /// All documents, newest first.
    fn list(&self) -> Result<Vec<Document>, AppError>;

    /// Insert a document at the front of the catalogue.
    fn append(&self, document: Document) -> Result<(), AppError>;

    /// Remove a document by id, returning it if it existed.
    fn remove(&self, id: &str) -> Result<Option<Document>, AppError>;

    fn find(&self, id: &str) -> Result<Option<Document>, AppError> {
        Ok(self.list()?.into_iter().find(|doc| doc.id == id))
    }
}

/// Flat JSON file store. Every update is a read-modify-write under a lock.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the database at `path`, creating it when missing.
    pub fn open<P: Into<PathBuf>>(path: P, admin_password: &str) -> Result<Self, AppError> {
        let path = path.into();

        if !path.exists() {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let database = Database {
                documents: Vec::new(),
                settings: Settings {
                    admin_password: Some(admin_password.to_string()),
                },
            };
            write_database(&path, &database)?;
            info!("Created document database at {}", path.display());
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives on disk, a poisoned lock carries nothing stale
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the database; unreadable or corrupt files degrade to empty.
    fn read(&self) -> Database {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to read database {}: {e}", self.path.display());
                return Database::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(database) => database,
            Err(e) => {
                error!("Failed to parse database {}: {e}", self.path.display());
                Database::default()
            }
        }
    }
}

fn write_database(path: &Path, database: &Database) -> Result<(), AppError> {
    let data = serde_json::to_string_pretty(database)?;
    fs::write(path, data).map_err(|e| {
        error!("Failed to write database {}: {e}", path.display());
        AppError::storage("Failed to save to database")
    })
}

impl DocumentStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Document>, AppError> {
        let _guard = self.guard();
        Ok(self.read().documents)
    }

    fn append(&self, document: Document) -> Result<(), AppError> {
        let _guard = self.guard();
        let mut database = self.read();
        debug!("Appending document {} to {}", document.id, self.path.display());
        database.documents.insert(0, document);
        write_database(&self.path, &database)
    }

    fn remove(&self, id: &str) -> Result<Option<Document>, AppError> {
        let _guard = self.guard();
        let mut database = self.read();
        let Some(index) = database.documents.iter().position(|doc| doc.id == id) else {
            warn!("Document {id} not found in {}", self.path.display());
            return Ok(None);
        };
        let removed = database.documents.remove(index);
        write_database(&self.path, &database)?;
        Ok(Some(removed))
    }
}

/// In-memory store, used when the catalogue should not touch disk.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, Vec<Document>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn list(&self) -> Result<Vec<Document>, AppError> {
        Ok(self.documents().clone())
    }

    fn append(&self, document: Document) -> Result<(), AppError> {
        self.documents().insert(0, document);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<Option<Document>, AppError> {
        let mut documents = self.documents();
        Ok(documents
            .iter()
            .position(|doc| doc.id == id)
            .map(|index| documents.remove(index)))
    }
}
