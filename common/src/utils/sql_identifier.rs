//! SQL identifier quoting.
//!
//! Database names are interpolated into statements passed to the client
//! tools, so each vendor's quote character is doubled inside the name.

/// Quotes identifiers for inline statements.
pub struct SqlIdentifier;

impl SqlIdentifier {
    /// MySQL / MariaDB: `` `name` ``
    pub fn mysql(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// PostgreSQL: `"name"`
    pub fn postgres(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
