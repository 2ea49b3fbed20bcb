//! Application configuration.
//!
//! Settings are resolved from environment variables, falling back to
//! defaults. `.env` loading happens in the binary before `load_with_service`.

use std::path::{Path, PathBuf};

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit (1 GiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// Deployment environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    /// Any other value, kept verbatim.
    Other(String),
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" => Environment::Development,
            "production" => Environment::Production,
            _ => Environment::Other(value.trim().to_string()),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
            Environment::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration shared by every handler.
///
/// Read-only after startup; handlers receive it through axum state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name used in logs and health responses.
    pub service_name: String,
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    pub max_upload_size: u64,
    /// Directory holding export artifacts.
    pub export_dir: PathBuf,
    /// Directory holding uploaded SQL files.
    pub upload_dir: PathBuf,
    /// Directory searched for a custom page layout.
    pub template_dir: PathBuf,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    /// Deployment environment.
    pub environment: Environment,
    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = Environment::parse(&get("ENVIRONMENT", "development"));
        let log_format = match lookup("LOG_FORMAT").map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) if v == "text" => LogFormat::Text,
            _ if environment == Environment::Production => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            service_name: service_name.to_string(),
            host: get("HOST", "0.0.0.0"),
            port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            max_upload_size: lookup("MAX_UPLOAD_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE),
            export_dir: PathBuf::from(get("EXPORT_DIR", "./exports")),
            upload_dir: PathBuf::from(get("UPLOAD_DIR", "./uploads")),
            template_dir: PathBuf::from(get("TEMPLATE_DIR", "./templates")),
            static_dir: PathBuf::from(get("STATIC_DIR", "./static")),
            environment,
            log_format,
        }
    }

    /// Returns true when running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Returns true when running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Creates the export and upload directories if they are missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        create_dir(&self.export_dir)?;
        create_dir(&self.upload_dir)
    }
}

fn create_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("failed to create directory {}: {}", path.display(), e),
        )
    })
}
