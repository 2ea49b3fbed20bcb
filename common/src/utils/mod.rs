//! Utility functions and helpers.

pub mod artifact_name;
pub mod sql_identifier;

// Re-export commonly used types
pub use artifact_name::ArtifactName;
pub use sql_identifier::SqlIdentifier;
