//! Connection models.
//!
//! Raw form fields as submitted by the browser, and the resolved
//! connection every command is built from.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{AppError, AppResult};

/// Database vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// MySQL server.
    MySQL,
    /// MariaDB server, driven with the MySQL client tools.
    MariaDB,
    /// PostgreSQL server.
    Postgres,
}

impl DbType {
    /// Returns the default port for this database type.
    pub fn default_port(&self) -> u16 {
        match self {
            DbType::MySQL | DbType::MariaDB => 3306,
            DbType::Postgres => 5432,
        }
    }
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::MySQL => write!(f, "mysql"),
            DbType::MariaDB => write!(f, "mariadb"),
            DbType::Postgres => write!(f, "postgres"),
        }
    }
}

impl std::str::FromStr for DbType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DbType::MySQL),
            "mariadb" => Ok(DbType::MariaDB),
            "postgres" => Ok(DbType::Postgres),
            _ => Err(AppError::UnsupportedDatabaseType(s.to_string())),
        }
    }
}

/// Fills an empty port with the vendor default.
///
/// Unknown vendors leave the port untouched; they are rejected later.
pub fn apply_default_port(db_type: &str, port: &mut String) {
    if port.is_empty() {
        if let Ok(db_type) = db_type.parse::<DbType>() {
            *port = db_type.default_port().to_string();
        }
    }
}

/// Resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub db_type: DbType,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// `None` when the form field was left empty.
    pub password: Option<String>,
}

impl ConnectionRequest {
    /// Resolves raw form values into a connection.
    ///
    /// An empty port becomes the vendor default; any other value must be a
    /// valid port number.
    pub fn resolve(
        db_type: &str,
        host: &str,
        port: &str,
        username: &str,
        password: &str,
    ) -> AppResult<Self> {
        let db_type: DbType = db_type.parse()?;
        let port = if port.is_empty() {
            db_type.default_port()
        } else {
            port.trim()
                .parse()
                .map_err(|_| AppError::validation(format!("Invalid port: {}", port), &["port"]))?
        };

        Ok(Self {
            db_type,
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: (!password.is_empty()).then(|| password.to_string()),
        })
    }
}

/// Form data for listing databases on a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ConnectionForm {
    /// Vendor: mysql, mariadb or postgres.
    #[serde(rename = "type")]
    pub db_type: String,
    #[validate(length(min = 1, message = "Host is required"))]
    pub host: String,
    /// Empty means vendor default.
    pub port: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Accepted but never echoed back.
    #[serde(skip_serializing)]
    pub password: String,
}

impl ConnectionForm {
    /// Validates, defaults the port and resolves the connection.
    pub fn resolve(&mut self) -> AppResult<ConnectionRequest> {
        self.validate()?;
        apply_default_port(&self.db_type, &mut self.port);
        ConnectionRequest::resolve(
            &self.db_type,
            &self.host,
            &self.port,
            &self.username,
            &self.password,
        )
    }
}
