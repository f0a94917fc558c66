use thiserror::Error;

/// Core error types for portman
#[derive(Debug, Error)]
pub enum Error {
    /// Port or proto argument rejected before any document work
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Rules file does not have the shape the engine relies on
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// iptables-restore execution failed
    #[error("iptables-restore error: {message}")]
    Restore {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Privilege check failed
    #[error(transparent)]
    Elevation(#[from] crate::elevation::ElevationError),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Layout problems in an iptables-save document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("missing *filter table")]
    MissingFilter,

    #[error("missing COMMIT inside *filter")]
    MissingCommit,

    #[error("invalid managed block: only BEGIN or END found")]
    UnbalancedBlock,
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Known iptables-restore failure messages and their translations
pub struct RestoreErrorPattern;

impl RestoreErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        if lower.contains("permission denied") || lower.contains("operation not permitted") {
            return ErrorTranslation::new("Insufficient permissions to load firewall rules")
                .with_suggestion("Run portman as root: sudo portman ...")
                .with_suggestion("Check if CAP_NET_ADMIN capability is available");
        }

        if lower.contains("couldn't load match") || lower.contains("couldn't load target") {
            return ErrorTranslation::new("A rule references an unavailable match or target")
                .with_suggestion("Check kernel modules: lsmod | grep xt_")
                .with_suggestion("Verify the protocol is spelled tcp or udp");
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("iptables-restore is not installed or not found in PATH")
                .with_suggestion("Install iptables: sudo apt install iptables  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install iptables  (Fedora/RHEL)")
                .with_suggestion("Or set restore_command in the portman config");
        }

        if lower.contains("line") && lower.contains("failed") {
            return ErrorTranslation::new("The rules file was rejected by iptables-restore")
                .with_suggestion("Open the reported line in the rules file and check its syntax")
                .with_suggestion("Restore the backup written next to the rules file if needed");
        }

        if lower.contains("resource temporarily unavailable") || lower.contains("xtables lock") {
            return ErrorTranslation::new("Another process holds the xtables lock")
                .with_suggestion("Wait a moment and try again")
                .with_suggestion(
                    "Check for conflicting firewall managers: sudo systemctl status firewalld ufw",
                );
        }

        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Validate the file manually: iptables-restore -t < rules.v4")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
