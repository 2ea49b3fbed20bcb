//! MySQL / MariaDB dialect (`mysql`, `mysqldump`).

use std::path::Path;

use common::models::ConnectionRequest;
use common::utils::SqlIdentifier;

use super::Dialect;
use crate::rename::RenamePlan;
use crate::runner::CommandSpec;

const CLIENT: &str = "mysql";
const DUMP: &str = "mysqldump";

/// MySQL-family client tools.
///
/// The password travels as a single `-p<password>` argument; the tools
/// reject a separate token.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// `<program> -h <host> -P <port> -u <user> [-p<password>]`
    fn base(&self, program: &str, conn: &ConnectionRequest) -> CommandSpec {
        let spec = CommandSpec::new(program).args([
            "-h".to_string(),
            conn.host.clone(),
            "-P".to_string(),
            conn.port.to_string(),
            "-u".to_string(),
            conn.username.clone(),
        ]);
        match &conn.password {
            Some(password) => spec.secret_arg(format!("-p{}", password)),
            None => spec,
        }
    }

    fn execute(&self, conn: &ConnectionRequest, statement: String) -> CommandSpec {
        self.base(CLIENT, conn).arg("-e").arg(statement)
    }
}

impl Dialect for MySqlDialect {
    fn list_command(&self, conn: &ConnectionRequest) -> CommandSpec {
        self.execute(conn, "SHOW DATABASES;".to_string())
    }

    fn create_command(&self, conn: &ConnectionRequest, name: &str) -> CommandSpec {
        self.execute(conn, format!("CREATE DATABASE {};", SqlIdentifier::mysql(name)))
    }

    fn drop_command(&self, conn: &ConnectionRequest, name: &str) -> CommandSpec {
        self.execute(conn, format!("DROP DATABASE {};", SqlIdentifier::mysql(name)))
    }

    fn rename_plan(&self, conn: &ConnectionRequest, from: &str, to: &str) -> RenamePlan {
        RenamePlan::CopyAndDrop {
            create: self.create_command(conn, to),
            dump: self.base(DUMP, conn).arg(from),
            import: self.base(CLIENT, conn).arg(to),
            drop: self.drop_command(conn, from),
        }
    }

    fn export_command(
        &self,
        conn: &ConnectionRequest,
        database: &str,
        output: &Path,
    ) -> CommandSpec {
        // --databases keeps the CREATE DATABASE / USE preamble in the dump.
        self.base(DUMP, conn)
            .arg("--column-statistics=0")
            .arg("--databases")
            .arg(database)
            .stdout_file(output)
    }

    fn import_command(
        &self,
        conn: &ConnectionRequest,
        database: &str,
        input: &Path,
    ) -> CommandSpec {
        self.base(CLIENT, conn)
            .arg("--max_allowed_packet=1G")
            .arg(database)
            .stdin_file(input)
    }

    fn system_databases(&self) -> &'static [&'static str] {
        &["information_schema", "mysql", "performance_schema", "sys"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{StdinSource, StdoutTarget};
    use common::models::DbType;
    use std::path::PathBuf;

    fn conn(password: Option<&str>) -> ConnectionRequest {
        ConnectionRequest {
            db_type: DbType::MySQL,
            host: "db.internal".into(),
            port: 3306,
            username: "root".into(),
            password: password.map(String::from),
        }
    }

    #[test]
    fn test_list_without_password() {
        let spec = MySqlDialect.list_command(&conn(None));
        assert_eq!(spec.program, "mysql");
        assert_eq!(
            spec.args,
            ["-h", "db.internal", "-P", "3306", "-u", "root", "-e", "SHOW DATABASES;"]
        );
        assert!(spec.envs.is_empty());
    }

    #[test]
    fn test_password_is_one_concatenated_argument() {
        let spec = MySqlDialect.list_command(&conn(Some("s3cret")));
        assert_eq!(spec.args[6], "-ps3cret");
        assert!(!spec.args.iter().any(|a| a == "s3cret"));
        assert!(!spec.display().contains("s3cret"));
    }

    #[test]
    fn test_export_command() {
        let out = PathBuf::from("/exports/shop_20240101_000000.sql");
        let spec = MySqlDialect.export_command(&conn(Some("pw")), "shop", &out);
        assert_eq!(spec.program, "mysqldump");
        assert_eq!(
            spec.args,
            [
                "-h",
                "db.internal",
                "-P",
                "3306",
                "-u",
                "root",
                "-ppw",
                "--column-statistics=0",
                "--databases",
                "shop"
            ]
        );
        assert_eq!(spec.stdout, StdoutTarget::File(out));
    }

    #[test]
    fn test_import_streams_file_on_stdin() {
        let input = PathBuf::from("/uploads/20240101_000000_dump.sql");
        let spec = MySqlDialect.import_command(&conn(None), "shop", &input);
        assert_eq!(spec.program, "mysql");
        assert_eq!(&spec.args[6..], ["--max_allowed_packet=1G", "shop"]);
        assert_eq!(spec.stdin, StdinSource::File(input));
    }

    #[test]
    fn test_create_and_drop_quote_names() {
        let spec = MySqlDialect.create_command(&conn(None), "new`db");
        assert_eq!(spec.args.last().unwrap(), "CREATE DATABASE `new``db`;");
        let spec = MySqlDialect.drop_command(&conn(None), "old");
        assert_eq!(spec.args.last().unwrap(), "DROP DATABASE `old`;");
    }

    #[test]
    fn test_rename_is_copy_and_drop() {
        match MySqlDialect.rename_plan(&conn(None), "old", "new") {
            RenamePlan::CopyAndDrop {
                create,
                dump,
                import,
                drop,
            } => {
                assert_eq!(create.args.last().unwrap(), "CREATE DATABASE `new`;");
                assert_eq!(dump.program, "mysqldump");
                assert_eq!(dump.args.last().unwrap(), "old");
                assert_eq!(import.program, "mysql");
                assert_eq!(import.args.last().unwrap(), "new");
                assert_eq!(drop.args.last().unwrap(), "DROP DATABASE `old`;");
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }
}
