//! Database listing and management models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::connection::{apply_default_port, ConnectionForm, ConnectionRequest};
use crate::errors::{AppError, AppResult};

/// Placeholder size; no size query is issued.
pub const SIZE_UNAVAILABLE: &str = "N/A";

/// One database on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DatabaseRecord {
    /// Database name.
    pub name: String,
    /// Always `N/A`.
    pub size: String,
}

impl DatabaseRecord {
    /// Creates a record with the placeholder size.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: SIZE_UNAVAILABLE.to_string(),
        }
    }
}

/// Administrative operation on a single database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Rename,
    Drop,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Rename => write!(f, "rename"),
            OperationKind::Drop => write!(f, "drop"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OperationKind::Create),
            "rename" => Ok(OperationKind::Rename),
            "drop" => Ok(OperationKind::Drop),
            other => Err(AppError::InvalidOperation(other.to_string())),
        }
    }
}

/// Form data for create / rename / drop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct DatabaseOperationForm {
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
    /// Existing database (rename source, drop target).
    pub database: String,
    /// New database name (create target, rename target).
    #[serde(rename = "newDatabase")]
    pub new_database: String,
    /// create, rename or drop.
    #[validate(length(min = 1, message = "Operation is required"))]
    pub operation: String,
}

/// Validated management request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseOperation {
    Create { name: String },
    Rename { from: String, to: String },
    Drop { name: String },
}

impl DatabaseOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            DatabaseOperation::Create { .. } => OperationKind::Create,
            DatabaseOperation::Rename { .. } => OperationKind::Rename,
            DatabaseOperation::Drop { .. } => OperationKind::Drop,
        }
    }

    /// Message shown after the operation succeeds.
    pub fn success_message(&self) -> String {
        match self {
            DatabaseOperation::Create { name } => {
                format!("Database '{}' created successfully", name)
            }
            DatabaseOperation::Rename { from, to } => {
                format!("Database '{}' renamed to '{}' successfully", from, to)
            }
            DatabaseOperation::Drop { name } => format!("Database '{}' dropped successfully", name),
        }
    }
}

impl DatabaseOperationForm {
    /// Validates the fields the chosen operation needs, defaults the port and
    /// resolves the connection.
    pub fn resolve(&mut self) -> AppResult<(ConnectionRequest, DatabaseOperation)> {
        self.validate()?;
        apply_default_port(&self.db_type, &mut self.port);

        let operation = match self.operation.parse::<OperationKind>()? {
            OperationKind::Create => {
                if self.new_database.is_empty() {
                    return Err(AppError::validation(
                        "Please provide a name for the new database",
                        &["newDatabase"],
                    ));
                }
                DatabaseOperation::Create {
                    name: self.new_database.clone(),
                }
            }
            OperationKind::Rename => {
                let mut missing = Vec::new();
                if self.database.is_empty() {
                    missing.push("database");
                }
                if self.new_database.is_empty() {
                    missing.push("newDatabase");
                }
                if !missing.is_empty() {
                    return Err(AppError::validation(
                        "Please provide both source and target database names",
                        &missing,
                    ));
                }
                DatabaseOperation::Rename {
                    from: self.database.clone(),
                    to: self.new_database.clone(),
                }
            }
            OperationKind::Drop => {
                if self.database.is_empty() {
                    return Err(AppError::validation(
                        "Please provide the database name to drop",
                        &["database"],
                    ));
                }
                DatabaseOperation::Drop {
                    name: self.database.clone(),
                }
            }
        };

        let connection = ConnectionRequest::resolve(
            &self.db_type,
            &self.host,
            &self.port,
            &self.username,
            &self.password,
        )?;
        Ok((connection, operation))
    }

    /// Connection part of the form, used to re-list after an operation.
    pub fn connection_form(&self) -> ConnectionForm {
        ConnectionForm {
            db_type: self.db_type.clone(),
            host: self.host.clone(),
            port: self.port.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
