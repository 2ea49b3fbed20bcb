//! Vendor dialects.
//!
//! Each dialect knows the command-line conventions of one vendor's client
//! tools: which program to run, how credentials are passed, how inline
//! statements are quoted and what the listing output looks like. The
//! dialect is selected once per request from the resolved [`DbType`].

mod mysql;
mod postgres;

use std::path::Path;

use common::models::{ConnectionRequest, DatabaseRecord, DbType};

use crate::rename::RenamePlan;
use crate::runner::CommandSpec;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

/// Builds client-tool invocations for one vendor.
pub trait Dialect: Send + Sync {
    /// Lists databases on the server.
    fn list_command(&self, conn: &ConnectionRequest) -> CommandSpec;

    /// Creates `name`.
    fn create_command(&self, conn: &ConnectionRequest, name: &str) -> CommandSpec;

    /// Drops `name`.
    fn drop_command(&self, conn: &ConnectionRequest, name: &str) -> CommandSpec;

    /// Renames `from` to `to`, atomically or as a copy-and-drop sequence.
    fn rename_plan(&self, conn: &ConnectionRequest, from: &str, to: &str) -> RenamePlan;

    /// Dumps `database` into `output`.
    fn export_command(&self, conn: &ConnectionRequest, database: &str, output: &Path)
        -> CommandSpec;

    /// Loads `input` into `database`.
    fn import_command(&self, conn: &ConnectionRequest, database: &str, input: &Path)
        -> CommandSpec;

    /// Databases hidden from listings.
    fn system_databases(&self) -> &'static [&'static str];

    /// Turns listing stdout into records.
    ///
    /// Blank lines, `Database` headers, `----` separators and system
    /// databases (case-insensitive) are skipped.
    fn parse_list_output(&self, stdout: &str) -> Vec<DatabaseRecord> {
        let system = self.system_databases();
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with("Database") && !line.starts_with("----"))
            .filter(|line| !system.iter().any(|sys| sys.eq_ignore_ascii_case(line)))
            .map(DatabaseRecord::new)
            .collect()
    }
}

static MYSQL: MySqlDialect = MySqlDialect;
static POSTGRES: PostgresDialect = PostgresDialect;

/// Returns the dialect for `db_type`. MariaDB uses the MySQL tools.
pub fn dialect_for(db_type: DbType) -> &'static dyn Dialect {
    match db_type {
        DbType::MySQL | DbType::MariaDB => &MYSQL,
        DbType::Postgres => &POSTGRES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: Vec<DatabaseRecord>) -> Vec<String> {
        records.into_iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_mysql_listing_skips_header_and_system_databases() {
        let stdout = "Database\ninformation_schema\nmysql\nperformance_schema\nsys\nshop\ncrm\n";
        let parsed = dialect_for(DbType::MySQL).parse_list_output(stdout);
        assert_eq!(names(parsed.clone()), ["shop", "crm"]);
        assert!(parsed.iter().all(|r| r.size == "N/A"));
    }

    #[test]
    fn test_system_databases_filtered_case_insensitively() {
        let stdout = "INFORMATION_SCHEMA\nMySQL\nSys\nanalytics\n";
        let parsed = dialect_for(DbType::MariaDB).parse_list_output(stdout);
        assert_eq!(names(parsed), ["analytics"]);
    }

    #[test]
    fn test_postgres_tuples_only_output() {
        let stdout = " postgres\n shop\n Template1\n inventory\n\n\n";
        let parsed = dialect_for(DbType::Postgres).parse_list_output(stdout);
        assert_eq!(names(parsed), ["shop", "inventory"]);
    }

    #[test]
    fn test_separator_and_blank_lines_never_produce_records() {
        let stdout = "  datname  \n----------\n   \n\t\nDatabase (mysql)\nreports\n";
        let parsed = dialect_for(DbType::Postgres).parse_list_output(stdout);
        assert_eq!(names(parsed), ["datname", "reports"]);
    }

    #[test]
    fn test_vendor_system_lists_differ() {
        // "mysql" is only a system database on the MySQL side.
        let parsed = dialect_for(DbType::Postgres).parse_list_output("mysql\n");
        assert_eq!(names(parsed), ["mysql"]);
        let parsed = dialect_for(DbType::MySQL).parse_list_output("postgres\n");
        assert_eq!(names(parsed), ["postgres"]);
    }
}
