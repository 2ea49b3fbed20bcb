//! Error types shared by all services.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::response::ApiResponse;

/// Result alias used throughout the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed form fields.
    #[error("{message}")]
    Validation {
        message: String,
        /// Names of the offending form fields.
        fields: Vec<String>,
    },

    /// The `type` field named a vendor we have no dialect for.
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// The `operation` field was not create, rename or drop.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The external tool could not be started.
    #[error("failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited with a nonzero status.
    #[error("{program} exited with {status}")]
    ProcessExit {
        program: String,
        status: String,
        stderr: String,
    },

    /// Creating, opening or writing an artifact failed.
    #[error("{context}: {source}")]
    FileIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A handler panicked or another unexpected failure occurred.
    #[error("{0}")]
    Internal(String),

    /// A multi-step rename stopped part way.
    #[error("{step} (reached state: {reached}): {source}")]
    Rename {
        step: String,
        reached: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Builds a validation error for the given fields.
    pub fn validation(message: impl Into<String>, fields: &[&str]) -> Self {
        AppError::Validation {
            message: message.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Wraps an IO error with a description of what was attempted.
    pub fn file_io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::FileIo {
            context: context.into(),
            source,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE_TYPE",
            AppError::InvalidOperation(_) => "INVALID_OPERATION",
            AppError::ProcessSpawn { .. } => "PROCESS_SPAWN_FAILED",
            AppError::ProcessExit { .. } => "PROCESS_EXIT_FAILED",
            AppError::FileIo { .. } => "FILE_IO_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Rename { .. } => "RENAME_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::UnsupportedDatabaseType(_)
            | AppError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Captured stderr of the failing tool, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            AppError::ProcessExit { stderr, .. } if !stderr.trim().is_empty() => Some(stderr),
            AppError::Rename { source, .. } => source.stderr(),
            _ => None,
        }
    }

    /// Form fields to highlight on the page.
    pub fn fields(&self) -> &[String] {
        match self {
            AppError::Validation { fields, .. } => fields,
            _ => &[],
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        AppError::Validation {
            message: "Please fill in all required fields".to_string(),
            fields,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = match self.stderr() {
            Some(stderr) => ApiResponse::err_with_details(
                self.code(),
                self.to_string(),
                serde_json::json!({ "stderr": stderr }),
            ),
            None => ApiResponse::err(self.code(), self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
