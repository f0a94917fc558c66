/// Validation and application of a rules file through `iptables-restore`
///
/// Both phases feed the file's bytes to the tool on stdin. Validation uses
/// `iptables-restore -t`, which parses the whole file without committing it.
use crate::core::error::{Error, Result};
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Result of a rules-file validation
#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub success: bool,
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Creates a successful verification result
    pub fn success() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    /// Creates a failed verification result with errors
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// Validates the rules file at `path` with `iptables-restore -t`.
///
/// A rejected file is reported through [`VerifyResult`], not as `Err`.
///
/// # Errors
///
/// Returns `Err` if:
/// - the file cannot be read
/// - the restore binary is missing or cannot be spawned
/// - communication with the process fails
pub async fn test_rules(restore_program: &str, path: &Path) -> Result<VerifyResult> {
    info!("Validating {} via iptables-restore -t", path.display());

    let output = run_restore(restore_program, &["-t"], path).await?;

    if output.status.success() {
        info!("Rules file validation passed");
        Ok(VerifyResult::success())
    } else {
        let stderr = combined_output(&output);
        warn!("Rules file validation failed: {}", stderr);
        Ok(VerifyResult::failure(parse_restore_errors(&stderr)))
    }
}

/// Loads the rules file at `path` into the kernel with `iptables-restore`.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read, the process cannot run, or the
/// tool exits unsuccessfully.
pub async fn apply_rules(restore_program: &str, path: &Path) -> Result<()> {
    info!("Applying {} via iptables-restore", path.display());

    let output = run_restore(restore_program, &[], path).await?;

    if output.status.success() {
        info!("Rules applied");
        Ok(())
    } else {
        let stderr = combined_output(&output);
        warn!("iptables-restore failed: {}", stderr);
        Err(Error::Restore {
            message: parse_restore_errors(&stderr).join("; "),
            stderr: Some(stderr),
            exit_code: output.status.code(),
        })
    }
}

async fn run_restore(restore_program: &str, args: &[&str], path: &Path) -> Result<Output> {
    let content = tokio::fs::read(path).await?;

    let mut child = crate::elevation::create_restore_command(restore_program, args)?
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Internal(format!("Failed to spawn iptables-restore: {e}")))?;

    if let Some(mut stdin) = child.stdin.take()
        && let Err(e) = stdin.write_all(&content).await
    {
        drop(stdin);
        if let Err(kill_err) = child.kill().await {
            warn!("Failed to reap iptables-restore: {kill_err}");
        }
        return Err(Error::Internal(format!(
            "Failed to write to iptables-restore stdin: {e}"
        )));
    }
    // stdin is dropped by now so the tool sees EOF

    Ok(child.wait_with_output().await?)
}

/// Stdout and stderr together, as iptables-restore splits diagnostics across both.
fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, _) => stderr.into_owned(),
        (false, true) => stdout.into_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

/// Parses iptables-restore output into user-facing messages
fn parse_restore_errors(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("Try `iptables-restore -h'"))
        .map(|line| line.trim_start_matches("iptables-restore: ").to_string())
        .collect()
}
