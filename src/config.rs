use crate::utils::get_config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Rules file used when neither `--file` nor the config names one.
///
/// Distro packagers can override it at build time.
pub const DEFAULT_RULES_FILE: &str = match option_env!("PORTMAN_DEFAULT_RULES_FILE") {
    Some(path) => path,
    None => "/etc/iptables/rules.v4",
};

/// Restore binary used for `--apply`
pub const DEFAULT_RESTORE_COMMAND: &str = "iptables-restore";

/// Persistent settings read from `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default target for `--file`
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
    /// Program invoked for validate/apply (`PORTMAN_RESTORE_COMMAND` wins over this)
    #[serde(default = "default_restore_command")]
    pub restore_command: String,
    /// Print a diff of the pending change on `--dry-run`
    #[serde(default = "default_true")]
    pub show_diff: bool,
    /// Append open/close/apply events to the audit log
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules_file: default_rules_file(),
            restore_command: default_restore_command(),
            show_diff: true,
            audit_log: true,
        }
    }
}

fn default_rules_file() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_FILE)
}

fn default_restore_command() -> String {
    DEFAULT_RESTORE_COMMAND.to_string()
}

fn default_true() -> bool {
    true
}

/// Path of `config.json` in the XDG config directory.
pub fn config_path() -> Option<PathBuf> {
    get_config_dir().map(|mut path| {
        path.push("config.json");
        path
    })
}

/// Loads the app config from disk, or returns default if not found.
pub async fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path).await,
        None => AppConfig::default(),
    }
}

/// Loads config from an explicit path; a missing file yields defaults and a
/// malformed one yields defaults plus a warning.
pub async fn load_config_from(path: &Path) -> AppConfig {
    let Ok(json) = tokio::fs::read_to_string(path).await else {
        return AppConfig::default();
    };

    match serde_json::from_str::<AppConfig>(&json) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring malformed config {}: {e}", path.display());
            AppConfig::default()
        }
    }
}
