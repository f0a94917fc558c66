/// Audit logging for rules file changes
///
/// Every write to a rules file, every backup and every validate/apply run
/// is recorded as one JSON object per line in `audit.log` under the state
/// directory. Audit failures are logged and never abort the operation.
use crate::core::rule::Proto;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OpenPort,
    ClosePort,
    WriteBackup,
    VerifyRules,
    ApplyRules,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Type of event
    pub event_type: EventType,

    /// Whether the operation succeeded
    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Opens the audit log in the state directory, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined or created
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::ensure_state_dir()?.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    /// Audit log at an explicit location
    pub fn at(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    /// Appends an event to the audit log
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: &AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(event)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads the most recent events from the log, newest first
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        Ok(content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

/// Hex SHA-256 of `content`
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Writes `event` to the default audit log when `enabled`, warning on failure.
pub async fn record(enabled: bool, event: AuditEvent) {
    if !enabled {
        return;
    }
    match AuditLog::new() {
        Ok(audit) => {
            if let Err(e) = audit.log(&event).await {
                tracing::warn!("Failed to write audit log: {}", e);
            }
        }
        Err(e) => tracing::warn!("Audit log unavailable: {}", e),
    }
}

/// Builds the event for an open/close rewrite of `file`.
pub fn change_event(
    event_type: EventType,
    file: &Path,
    port: u16,
    protos: &[Proto],
    before: &[u8],
    after: &[u8],
    error: Option<String>,
) -> AuditEvent {
    AuditEvent::new(
        event_type,
        error.is_none(),
        serde_json::json!({
            "file": file.display().to_string(),
            "port": port,
            "protos": protos,
            "sha256_before": checksum(before),
            "sha256_after": checksum(after),
        }),
        error,
    )
}

/// Builds the event for a backup copy of `file`.
pub fn backup_event(file: &Path, backup: &Path) -> AuditEvent {
    AuditEvent::new(
        EventType::WriteBackup,
        true,
        serde_json::json!({
            "file": file.display().to_string(),
            "backup": backup.display().to_string(),
        }),
        None,
    )
}

/// Builds the event for a validate or apply run against `file`.
pub fn restore_event(event_type: EventType, file: &Path, error: Option<String>) -> AuditEvent {
    AuditEvent::new(
        event_type,
        error.is_none(),
        serde_json::json!({
            "file": file.display().to_string(),
        }),
        error,
    )
}
