//! Privilege checks and construction of the `iptables-restore` command
//!
//! portman never escalates on its own. Operations that rewrite system rules
//! files or load rules into the kernel require the process to already run as
//! root; everything else works unprivileged (e.g. editing a copy under
//! `/tmp` with `--file`).
//!
//! # Environment Variables
//!
//! - `PORTMAN_RESTORE_COMMAND`: Replace the `iptables-restore` binary (takes
//!   precedence over the config file). Tests point this at a mock script.

use std::path::Path;
use tokio::process::Command;

/// Environment variable overriding the restore binary
pub const RESTORE_COMMAND_ENV: &str = "PORTMAN_RESTORE_COMMAND";

/// Paths under this prefix are treated as system configuration
const SYSTEM_CONFIG_PREFIX: &str = "/etc/";

/// Error type for privilege and tool availability checks
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// Operation needs root but the process is unprivileged
    #[error("run as root (sudo) to modify rules and apply iptables-restore")]
    NotRoot,

    /// `--apply` requested on a platform without iptables
    #[error("--apply is only supported on Linux")]
    ApplyUnsupported,

    /// Restore binary could not be found in PATH
    #[error("'{0}' is not available (binary not found)")]
    BinaryNotFound(String),
}

/// Whether the current process runs with uid 0.
///
/// Off Linux there is no iptables to protect, so every caller counts as
/// privileged.
pub fn is_root() -> bool {
    if cfg!(target_os = "linux") {
        nix::unistd::getuid().is_root()
    } else {
        true
    }
}

/// Whether a mutating operation on `path` (optionally followed by an apply)
/// needs root.
pub fn requires_root(path: &Path, apply: bool) -> bool {
    cfg!(target_os = "linux") && (apply || path.starts_with(SYSTEM_CONFIG_PREFIX))
}

/// Fails early when a mutating operation needs privileges the process lacks.
///
/// # Errors
///
/// Returns `ApplyUnsupported` for `--apply` off Linux and `NotRoot` when root
/// is required but missing.
pub fn check_privileges(path: &Path, apply: bool) -> Result<(), ElevationError> {
    if apply && !cfg!(target_os = "linux") {
        return Err(ElevationError::ApplyUnsupported);
    }
    if requires_root(path, apply) && !is_root() {
        return Err(ElevationError::NotRoot);
    }
    Ok(())
}

/// Checks if a binary exists in PATH
///
/// Names containing a `/` are checked as paths directly.
fn binary_exists(name: &str) -> bool {
    if name.contains('/') {
        return Path::new(name).is_file();
    }

    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Resolves which restore binary to run: the environment override, else the
/// configured one.
pub fn resolve_restore_program(configured: &str) -> String {
    std::env::var(RESTORE_COMMAND_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Creates an `iptables-restore` command with the specified arguments
///
/// Arguments are passed directly without shell interpretation.
///
/// # Errors
///
/// Returns `BinaryNotFound` if the resolved program does not exist.
pub fn create_restore_command(configured: &str, args: &[&str]) -> Result<Command, ElevationError> {
    let program = resolve_restore_program(configured);
    if !binary_exists(&program) {
        return Err(ElevationError::BinaryNotFound(program));
    }

    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}
