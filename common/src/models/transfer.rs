//! Export and import models.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::connection::{apply_default_port, ConnectionRequest};
use crate::errors::AppResult;

/// Form data for exporting a database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ExportForm {
    /// Vendor: mysql, mariadb or postgres.
    #[serde(rename = "type")]
    pub db_type: String,
    #[validate(length(min = 1, message = "Host is required"))]
    pub host: String,
    /// Empty means vendor default.
    pub port: String,
    /// Database to dump.
    #[validate(length(min = 1, message = "Database is required"))]
    pub database: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Accepted but never echoed back.
    #[serde(skip_serializing)]
    pub password: String,
}

/// Form data for importing a database. The SQL file travels as the
/// `sqlFile` multipart field next to these.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct ImportForm {
    /// Vendor: mysql, mariadb or postgres.
    #[serde(rename = "type")]
    pub db_type: String,
    #[validate(length(min = 1, message = "Host is required"))]
    pub host: String,
    /// Empty means vendor default.
    pub port: String,
    /// Database to load into.
    #[validate(length(min = 1, message = "Database is required"))]
    pub database: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Accepted but never echoed back.
    #[serde(skip_serializing)]
    pub password: String,
}

/// Validated export request.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub connection: ConnectionRequest,
    pub database: String,
}

/// Validated import request.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub connection: ConnectionRequest,
    pub database: String,
    /// Saved upload artifact to feed the client tool.
    pub file_path: PathBuf,
}

impl ExportForm {
    /// Validates, defaults the port and resolves the request.
    pub fn resolve(&mut self) -> AppResult<ExportRequest> {
        self.validate()?;
        apply_default_port(&self.db_type, &mut self.port);
        let connection = ConnectionRequest::resolve(
            &self.db_type,
            &self.host,
            &self.port,
            &self.username,
            &self.password,
        )?;
        Ok(ExportRequest {
            connection,
            database: self.database.clone(),
        })
    }
}

impl ImportForm {
    /// Validates, defaults the port and resolves the request against a
    /// saved upload.
    pub fn resolve(&mut self, file_path: PathBuf) -> AppResult<ImportRequest> {
        self.validate()?;
        apply_default_port(&self.db_type, &mut self.port);
        let connection = ConnectionRequest::resolve(
            &self.db_type,
            &self.host,
            &self.port,
            &self.username,
            &self.password,
        )?;
        Ok(ImportRequest {
            connection,
            database: self.database.clone(),
            file_path,
        })
    }

    /// Assigns one multipart text field by name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "type" => self.db_type = value,
            "host" => self.host = value,
            "port" => self.port = value,
            "database" => self.database = value,
            "username" => self.username = value,
            "password" => self.password = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DbType;

    #[test]
    fn test_export_requires_host_database_username() {
        let mut form = ExportForm {
            db_type: "mysql".into(),
            ..Default::default()
        };
        let err = form.resolve().unwrap_err();
        assert_eq!(
            err.fields(),
            ["database".to_string(), "host".to_string(), "username".to_string()]
        );
    }

    #[test]
    fn test_export_resolves_with_default_port() {
        let mut form = ExportForm {
            db_type: "postgres".into(),
            host: "localhost".into(),
            database: "shop".into(),
            username: "postgres".into(),
            ..Default::default()
        };
        let req = form.resolve().unwrap();
        assert_eq!(req.connection.db_type, DbType::Postgres);
        assert_eq!(req.connection.port, 5432);
        assert_eq!(req.database, "shop");
        assert_eq!(form.port, "5432");
    }

    #[test]
    fn test_import_set_field() {
        let mut form = ImportForm::default();
        form.set_field("type", "mariadb".into());
        form.set_field("host", "10.0.0.5".into());
        form.set_field("database", "crm".into());
        form.set_field("username", "root".into());
        form.set_field("password", "pw".into());
        form.set_field("sqlFile", "ignored".into());

        let req = form.resolve(PathBuf::from("/tmp/upload.sql")).unwrap();
        assert_eq!(req.connection.port, 3306);
        assert_eq!(req.connection.password.as_deref(), Some("pw"));
        assert_eq!(req.file_path, PathBuf::from("/tmp/upload.sql"));
    }
}
