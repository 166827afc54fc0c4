//! Configuration management for docdrop
//! Supports INI files with environment and CLI argument overrides

pub mod ini_parser;

use crate::cli::Cli;
use crate::error::AppError;
use ini_parser::IniConfig;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub listen: String,
    pub port: u16,
    pub threads: usize,

    // Storage locations
    pub directory: PathBuf,
    pub uploads_dir: PathBuf,
    pub database_path: PathBuf,
    pub frontend_dir: PathBuf,

    // Upload settings
    pub max_upload_size: u64,
    pub allowed_extensions: Vec<String>,
    pub file_fields: Vec<String>,

    pub admin_password: String,

    // Logging settings
    pub verbose: bool,
    pub detailed_logging: bool,
}

impl Config {
    /// Load configuration with precedence: CLI args > ENV > INI file > Defaults
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        let ini = match Self::find_config_file(cli)? {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                IniConfig::load_file(&path)?
            }
            None => {
                log::debug!("No configuration file found, using defaults and overrides");
                IniConfig::new()
            }
        };

        let directory = cli.directory.clone();
        let storage_path = |cli_value: &Option<PathBuf>, key: &str, default: &str| {
            cli_value
                .clone()
                .or_else(|| ini.get_string("storage", key).map(PathBuf::from))
                .unwrap_or_else(|| directory.join(default))
        };

        Ok(Self {
            listen: Self::get_listen(&ini, cli),
            port: Self::get_port(&ini, cli),
            threads: Self::get_threads(&ini, cli),

            uploads_dir: storage_path(&cli.uploads_dir, "uploads_dir", "uploads"),
            database_path: storage_path(&cli.database, "database", "database.json"),
            frontend_dir: storage_path(&cli.frontend_dir, "frontend_dir", "frontend"),
            directory: directory.clone(),

            max_upload_size: Self::get_max_upload_size(&ini, cli),
            allowed_extensions: Self::get_allowed_extensions(&ini, cli),
            file_fields: Self::get_file_fields(&ini, cli),

            admin_password: Self::get_admin_password(&ini, cli),

            verbose: cli
                .verbose
                .unwrap_or_else(|| ini.get_bool("logging", "verbose").unwrap_or(false)),
            detailed_logging: cli
                .detailed_logging
                .unwrap_or_else(|| ini.get_bool("logging", "detailed").unwrap_or(false)),
        })
    }

    /// Find configuration file in order of preference
    fn find_config_file(cli: &Cli) -> Result<Option<PathBuf>, AppError> {
        // 1. Explicit --config-file
        if let Some(ref config_path) = cli.config_file {
            let path = PathBuf::from(config_path);
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(AppError::InvalidConfiguration(format!(
                "Config file specified but not found: {config_path}"
            )));
        }

        // 2. Current directory
        let current_config = PathBuf::from("docdrop.ini");
        if current_config.exists() {
            return Ok(Some(current_config));
        }

        // 3. User config directory
        if let Some(home_dir) = std::env::var_os("HOME") {
            let user_config = Path::new(&home_dir)
                .join(".config")
                .join("docdrop")
                .join("config.ini");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // 4. System config
        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/docdrop/config.ini");
            if system_config.exists() {
                return Ok(Some(system_config));
            }
        }

        Ok(None)
    }

    fn get_listen(ini: &IniConfig, cli: &Cli) -> String {
        cli.listen
            .clone()
            .or_else(|| ini.get_string("server", "listen"))
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    fn get_port(ini: &IniConfig, cli: &Cli) -> u16 {
        if let Some(port) = cli.port {
            return port;
        }

        if let Ok(value) = std::env::var("PORT") {
            match value.trim().parse() {
                Ok(port) => return port,
                Err(_) => log::warn!("Ignoring invalid PORT environment value: {value}"),
            }
        }

        ini.get_u16("server", "port").unwrap_or(DEFAULT_PORT)
    }

    fn get_threads(ini: &IniConfig, cli: &Cli) -> usize {
        cli.threads
            .or_else(|| ini.get_usize("server", "threads"))
            .filter(|threads| *threads > 0)
            .unwrap_or(8)
    }

    fn get_max_upload_size(ini: &IniConfig, cli: &Cli) -> u64 {
        if let Some(size_mb) = cli.max_upload_size {
            return size_mb * 1024 * 1024;
        }

        // INI accepts sizes like "100MB"
        if let Some(size_bytes) = ini.get_file_size("upload", "max_size") {
            return size_bytes;
        }

        DEFAULT_MAX_UPLOAD_MB * 1024 * 1024
    }

    fn get_allowed_extensions(ini: &IniConfig, cli: &Cli) -> Vec<String> {
        let from_cli = cli
            .allowed_extensions
            .as_deref()
            .map(split_list)
            .unwrap_or_default();
        if !from_cli.is_empty() {
            return from_cli;
        }

        let from_ini = ini.get_list("upload", "allowed_extensions");
        if !from_ini.is_empty() {
            return from_ini;
        }

        vec!["*".to_string()]
    }

    fn get_file_fields(ini: &IniConfig, cli: &Cli) -> Vec<String> {
        let from_cli = cli.file_fields.as_deref().map(split_list).unwrap_or_default();
        if !from_cli.is_empty() {
            return from_cli;
        }

        let from_ini = ini.get_list("upload", "file_fields");
        if !from_ini.is_empty() {
            return from_ini;
        }

        vec!["file".to_string(), "documentFile".to_string()]
    }

    fn get_admin_password(ini: &IniConfig, cli: &Cli) -> String {
        if let Some(ref password) = cli.admin_password {
            return password.clone();
        }

        if let Ok(password) = std::env::var("ADMIN_PASSWORD")
            && !password.is_empty()
        {
            return password;
        }

        ini.get_string("auth", "admin_password")
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        log::info!("Configuration Summary:");
        log::info!("  Server: {}:{}", self.listen, self.port);
        log::info!("  Threads: {}", self.threads);
        log::info!("  Data Directory: {}", self.directory.display());
        log::info!("  Uploads Directory: {}", self.uploads_dir.display());
        log::info!("  Database: {}", self.database_path.display());
        log::info!("  Frontend: {}", self.frontend_dir.display());
        log::info!(
            "  Max Upload Size: {} MB",
            self.max_upload_size / (1024 * 1024)
        );
        log::info!("  Allowed Extensions: {:?}", self.allowed_extensions);
        log::info!("  File Fields: {:?}", self.file_fields);
        log::info!(
            "  Admin Password: {}",
            if self.admin_password == DEFAULT_ADMIN_PASSWORD {
                "default"
            } else {
                "********"
            }
        );
        log::info!("  Verbose Logging: {}", self.verbose);
        log::info!("  Detailed Logging: {}", self.detailed_logging);
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_cli(directory: PathBuf) -> Cli {
        Cli {
            directory,
            listen: None,
            // Explicit values keep PORT/ADMIN_PASSWORD from the environment out
            port: Some(DEFAULT_PORT),
            threads: None,
            uploads_dir: None,
            database: None,
            frontend_dir: None,
            admin_password: Some(DEFAULT_ADMIN_PASSWORD.to_string()),
            max_upload_size: None,
            allowed_extensions: None,
            file_fields: None,
            verbose: None,
            detailed_logging: None,
            config_file: None,
        }
    }

    fn with_ini(temp_dir: &TempDir, content: &str) -> Cli {
        let config_file = temp_dir.path().join("test.ini");
        fs::write(&config_file, content).unwrap();
        let mut cli = create_test_cli(temp_dir.path().to_path_buf());
        cli.config_file = Some(config_file.to_string_lossy().to_string());
        cli
    }

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        // Point at an empty INI so a docdrop.ini in the working directory is ignored
        let cli = with_ini(&temp_dir, "");
        let config = Config::load(&cli).unwrap();

        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.port, 10000);
        assert_eq!(config.threads, 8);
        assert_eq!(config.uploads_dir, temp_dir.path().join("uploads"));
        assert_eq!(config.database_path, temp_dir.path().join("database.json"));
        assert_eq!(config.frontend_dir, temp_dir.path().join("frontend"));
        assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec!["*"]);
        assert_eq!(config.file_fields, vec!["file", "documentFile"]);
        assert_eq!(config.admin_password, "admin123");
        assert!(!config.verbose);
        assert!(!config.detailed_logging);
    }

    #[test]
    fn test_config_load_with_ini_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut cli = with_ini(
            &temp_dir,
            r#"
[server]
listen = 127.0.0.1
port = 9000
threads = 16

[storage]
uploads_dir = /srv/docdrop/files
database = /srv/docdrop/db.json

[upload]
max_size = 5MB
allowed_extensions = *.pdf, *.docx
file_fields = attachment

[auth]
admin_password = from-ini

[logging]
verbose = true
detailed = false
"#,
        );
        cli.port = None;
        cli.admin_password = None;

        let config = Config::load(&cli).unwrap();

        assert_eq!(config.listen, "127.0.0.1");
        assert_eq!(config.threads, 16);
        assert_eq!(config.uploads_dir, PathBuf::from("/srv/docdrop/files"));
        assert_eq!(config.database_path, PathBuf::from("/srv/docdrop/db.json"));
        assert_eq!(config.frontend_dir, temp_dir.path().join("frontend"));
        assert_eq!(config.max_upload_size, 5 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec!["*.pdf", "*.docx"]);
        assert_eq!(config.file_fields, vec!["attachment"]);
        assert!(config.verbose);
        assert!(!config.detailed_logging);

        // PORT and ADMIN_PASSWORD may be set by the environment running the tests
        if std::env::var("PORT").is_err() {
            assert_eq!(config.port, 9000);
        }
        if std::env::var("ADMIN_PASSWORD").is_err() {
            assert_eq!(config.admin_password, "from-ini");
        }
    }

    #[test]
    fn test_config_cli_overrides_ini() {
        let temp_dir = TempDir::new().unwrap();
        let mut cli = with_ini(
            &temp_dir,
            "[server]\nlisten = 0.0.0.0\nport = 9000\nthreads = 16\n\n[upload]\nmax_size = 1GB\n",
        );
        cli.listen = Some("192.168.1.1".to_string());
        cli.port = Some(7777);
        cli.max_upload_size = Some(20);
        cli.verbose = Some(true);
        cli.file_fields = Some("doc, file".to_string());

        let config = Config::load(&cli).unwrap();

        assert_eq!(config.listen, "192.168.1.1");
        assert_eq!(config.port, 7777);
        assert_eq!(config.max_upload_size, 20 * 1024 * 1024);
        assert!(config.verbose);
        assert_eq!(config.file_fields, vec!["doc", "file"]);
        // INI still provides what the CLI left out
        assert_eq!(config.threads, 16);
    }

    #[test]
    fn test_config_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let mut cli = create_test_cli(temp_dir.path().to_path_buf());
        cli.config_file = Some("/nonexistent/path.ini".to_string());

        let err = Config::load(&cli).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("Config file specified but not found"));
    }

    #[test]
    fn test_config_invalid_ini() {
        let temp_dir = TempDir::new().unwrap();
        let cli = with_ini(&temp_dir, "[server]\nnot a pair\n");
        assert!(Config::load(&cli).is_err());
    }

    #[test]
    fn test_config_print_summary() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&with_ini(&temp_dir, "")).unwrap();
        config.print_summary();
    }
}
