use crate::error::AppError;
use clap::Parser;
use log::warn;
use std::path::PathBuf;

// Command-line interface. Every option except the data directory is optional
// so that environment variables and the INI file can fill the gaps.
#[derive(Parser, Clone, Debug)]
#[command(
    version,
    about = "Document upload server with a JSON catalogue and admin panel backend.",
    long_about = "Serves a document catalogue over HTTP.\n Documents are uploaded as multipart/form-data or JSON, stored under an uploads directory and recorded in a flat JSON database.\n The same server hosts the static frontend and the uploaded files.\n Settings can come from flags, the PORT and ADMIN_PASSWORD environment variables, or an INI file."
)]
pub struct Cli {
    /// Data directory holding uploads, the database and the frontend
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Host address to listen on (e.g. "127.0.0.1" or "0.0.0.0")
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of worker threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Directory where uploaded files are stored (default: <directory>/uploads)
    #[arg(long)]
    pub uploads_dir: Option<PathBuf>,

    /// JSON database file (default: <directory>/database.json)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Static frontend directory (default: <directory>/frontend)
    #[arg(long)]
    pub frontend_dir: Option<PathBuf>,

    /// Password for the admin login endpoint
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Maximum upload size in MB
    #[arg(long, value_parser = validate_upload_size)]
    pub max_upload_size: Option<u64>,

    /// Allowed upload extensions (comma-separated globs like *.pdf,*.docx)
    #[arg(short, long)]
    pub allowed_extensions: Option<String>,

    /// Form fields that may carry the uploaded file (comma-separated)
    #[arg(long)]
    pub file_fields: Option<String>,

    /// Enable verbose logging (log level: debug)
    #[arg(short, long)]
    pub verbose: Option<bool>,

    /// Enable detailed logging (log level: info unless verbose)
    #[arg(long)]
    pub detailed_logging: Option<bool>,

    /// Configuration file path (INI format). Falls back to docdrop.ini in the
    /// current directory, ~/.config/docdrop/config.ini, /etc/docdrop/config.ini
    #[arg(long, value_parser = validate_config_file)]
    pub config_file: Option<String>,
}

/// Validate upload size is within safe bounds (1-10240 MB)
fn validate_upload_size(s: &str) -> Result<u64, String> {
    let size: u64 = s
        .parse()
        .map_err(|_| "Upload size must be a positive number".to_string())?;

    if size == 0 {
        return Err("Upload size must be greater than 0 MB".to_string());
    }

    if size > 10240 {
        return Err("Upload size must not exceed 10240 MB (10 GB)".to_string());
    }

    Ok(size)
}

/// Validate config file path exists and is readable
fn validate_config_file(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("Config file path cannot be empty".to_string());
    }

    let path = PathBuf::from(s);
    if !path.exists() {
        return Err(format!("Config file does not exist: {s}"));
    }
    if !path.is_file() {
        return Err(format!("Config path is not a file: {s}"));
    }

    match std::fs::File::open(&path) {
        Ok(_) => Ok(s.to_string()),
        Err(e) => Err(format!("Cannot read config file {s}: {e}")),
    }
}

impl Cli {
    /// Check the data directory and warn about risky settings
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(max_size) = self.max_upload_size
            && max_size > 2048
        {
            warn!("Large upload size limit configured: {max_size} MB");
        }

        if !self.directory.exists() {
            return Err(AppError::InvalidConfiguration(format!(
                "Data directory does not exist: {}",
                self.directory.display()
            )));
        }

        if !self.directory.is_dir() {
            return Err(AppError::InvalidConfiguration(format!(
                "Data path is not a directory: {}",
                self.directory.display()
            )));
        }

        Ok(())
    }
}
