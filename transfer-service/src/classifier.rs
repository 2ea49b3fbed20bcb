//! Remediation hints for client-tool failures.

/// Turns tool stderr into advice appended to the user-facing message.
pub trait ErrorClassifier: Send + Sync {
    /// Returns the hint text to append. Empty when nothing applies.
    fn hints(&self, stderr: &str) -> String;

    /// `message` followed by any hints for `stderr`.
    fn enrich(&self, message: &str, stderr: &str) -> String {
        format!("{}{}", message, self.hints(stderr))
    }
}

/// Matches well-known phrases in the tool output.
///
/// Every matching rule contributes its paragraph, in rule order.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    rules: Vec<(&'static str, &'static str)>,
}

const ACCESS_DENIED: &str = "\n\nSuggestions:\n\
- Check your username and password\n\
- Ensure the user has permission to access the database";

const UNKNOWN_DATABASE: &str = "\n\nSuggestions:\n\
- Check if the database name is correct\n\
- Ensure the database exists on the server";

const CONNECTION_REFUSED: &str = "\n\nSuggestions:\n\
- Check if the host and port are correct\n\
- Ensure the database server is running and accessible";

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                ("Access denied", ACCESS_DENIED),
                ("Unknown database", UNKNOWN_DATABASE),
                ("Connection refused", CONNECTION_REFUSED),
            ],
        }
    }
}

impl ErrorClassifier for SubstringClassifier {
    fn hints(&self, stderr: &str) -> String {
        self.rules
            .iter()
            .filter(|(needle, _)| stderr.contains(needle))
            .map(|(_, hint)| *hint)
            .collect()
    }
}
