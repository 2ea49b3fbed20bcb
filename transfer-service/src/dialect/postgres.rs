//! PostgreSQL dialect (`psql`, `pg_dump`).

use std::path::Path;

use common::models::ConnectionRequest;
use common::utils::SqlIdentifier;

use super::Dialect;
use crate::rename::RenamePlan;
use crate::runner::CommandSpec;

const CLIENT: &str = "psql";
const DUMP: &str = "pg_dump";
const PASSWORD_ENV: &str = "PGPASSWORD";

/// PostgreSQL client tools. The password is passed through `PGPASSWORD`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn base(&self, program: &str, conn: &ConnectionRequest) -> CommandSpec {
        let spec = CommandSpec::new(program).args([
            "-h".to_string(),
            conn.host.clone(),
            "-p".to_string(),
            conn.port.to_string(),
            "-U".to_string(),
            conn.username.clone(),
        ]);
        match &conn.password {
            Some(password) => spec.env(PASSWORD_ENV, password.clone()),
            None => spec,
        }
    }

    fn execute(&self, conn: &ConnectionRequest, statement: String) -> CommandSpec {
        self.base(CLIENT, conn).arg("-c").arg(statement)
    }
}

impl Dialect for PostgresDialect {
    fn list_command(&self, conn: &ConnectionRequest) -> CommandSpec {
        self.base(CLIENT, conn)
            .arg("-t")
            .arg("-c")
            .arg("SELECT datname FROM pg_database WHERE datistemplate = false;")
    }

    fn create_command(&self, conn: &ConnectionRequest, name: &str) -> CommandSpec {
        self.execute(
            conn,
            format!("CREATE DATABASE {};", SqlIdentifier::postgres(name)),
        )
    }

    fn drop_command(&self, conn: &ConnectionRequest, name: &str) -> CommandSpec {
        self.execute(
            conn,
            format!("DROP DATABASE {};", SqlIdentifier::postgres(name)),
        )
    }

    fn rename_plan(&self, conn: &ConnectionRequest, from: &str, to: &str) -> RenamePlan {
        RenamePlan::Atomic(self.execute(
            conn,
            format!(
                "ALTER DATABASE {} RENAME TO {};",
                SqlIdentifier::postgres(from),
                SqlIdentifier::postgres(to)
            ),
        ))
    }

    fn export_command(
        &self,
        conn: &ConnectionRequest,
        database: &str,
        output: &Path,
    ) -> CommandSpec {
        self.base(DUMP, conn).arg(database).stdout_file(output)
    }

    fn import_command(
        &self,
        conn: &ConnectionRequest,
        database: &str,
        input: &Path,
    ) -> CommandSpec {
        self.base(CLIENT, conn)
            .arg("-d")
            .arg(database)
            .arg("-f")
            .arg(input.to_string_lossy())
    }

    fn system_databases(&self) -> &'static [&'static str] {
        &["postgres", "template0", "template1"]
    }
}
