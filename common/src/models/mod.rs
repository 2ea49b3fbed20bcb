//! Request and record models shared by handlers and services.

pub mod connection;
pub mod database;
pub mod transfer;

// Re-export commonly used types
pub use connection::{ConnectionForm, ConnectionRequest, DbType};
pub use database::{DatabaseOperation, DatabaseOperationForm, DatabaseRecord, OperationKind};
pub use transfer::{ExportForm, ExportRequest, ImportForm, ImportRequest};
