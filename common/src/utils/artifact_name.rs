//! Artifact file naming.
//!
//! Export and upload files are named with a second-resolution local
//! timestamp. Client-supplied names are reduced to their last path
//! component so they can never address anything outside the artifact
//! directory.

use chrono::{DateTime, TimeZone};

/// Timestamp layout used in artifact names, e.g. `20240131_235959`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Builds artifact file names.
pub struct ArtifactName;

impl ArtifactName {
    /// Formats `at` the way artifact names expect.
    pub fn timestamp<Tz>(at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `<database>_<timestamp>.sql`
    pub fn export(database: &str, timestamp: &str) -> String {
        format!("{}_{}.sql", Self::basename(database).unwrap_or_default(), timestamp)
    }

    /// `<timestamp>_<originalFilename>`
    pub fn upload(timestamp: &str, original: &str) -> String {
        match Self::basename(original) {
            Some(name) => format!("{}_{}", timestamp, name),
            None => format!("{}_upload.sql", timestamp),
        }
    }

    /// Strips every `/` or `\` separated prefix.
    ///
    /// Returns `None` when nothing usable is left (empty, `.` or `..`).
    pub fn basename(name: &str) -> Option<String> {
        let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
        match last {
            "" | "." | ".." => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_timestamp_format() {
        let at = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 1, 31)
                .unwrap()
                .and_hms_opt(23, 5, 9)
                .unwrap(),
        );
        assert_eq!(ArtifactName::timestamp(&at), "20240131_230509");
    }

    #[test]
    fn test_export_and_upload_names() {
        assert_eq!(ArtifactName::export("shop", "20240131_230509"), "shop_20240131_230509.sql");
        assert_eq!(
            ArtifactName::upload("20240131_230509", "backup.sql"),
            "20240131_230509_backup.sql"
        );
    }

    #[test]
    fn test_basename_strips_traversal() {
        assert_eq!(ArtifactName::basename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(ArtifactName::basename("..\\..\\boot.ini").as_deref(), Some("boot.ini"));
        assert_eq!(ArtifactName::basename("/abs/path/dump.sql").as_deref(), Some("dump.sql"));
        assert_eq!(ArtifactName::basename("plain.sql").as_deref(), Some("plain.sql"));
    }

    #[test]
    fn test_basename_rejects_empty_components() {
        assert_eq!(ArtifactName::basename(""), None);
        assert_eq!(ArtifactName::basename("../"), None);
        assert_eq!(ArtifactName::basename(".."), None);
        assert_eq!(ArtifactName::upload("20240131_230509", "dir/"), "20240131_230509_upload.sql");
    }
}
