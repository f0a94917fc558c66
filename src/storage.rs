//! Rules file persistence: timestamped backups and atomic rewrites
//!
//! Before a changed rules file is overwritten, the original bytes are copied
//! to `<name>.bak-YYYYMMDD-HHMMSS` next to it. The new content is written to a
//! temporary sibling and renamed over the target, keeping the original file
//! mode so `/etc/iptables/rules.v4` stays `0644`.

use crate::core::error::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// chrono format of the backup suffix
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Highest numeric suffix tried for backups taken within the same second
const MAX_BACKUP_SUFFIX: u32 = 99;

/// Mode used for new files when the target's mode can't be read
#[cfg(unix)]
const DEFAULT_MODE: u32 = 0o644;

/// Returns the backup path for `original` at time `now`.
///
/// # Examples
///
/// ```
/// use chrono::TimeZone;
/// use std::path::Path;
///
/// let now = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// let bak = portman::storage::backup_path(Path::new("/etc/iptables/rules.v4"), now);
/// assert_eq!(bak, Path::new("/etc/iptables/rules.v4.bak-20240309-140507"));
/// ```
pub fn backup_path(original: &Path, now: DateTime<Local>) -> PathBuf {
    let base = original
        .file_name()
        .map_or_else(|| "rules".into(), |name| name.to_string_lossy());
    let name = format!("{base}.bak-{}", now.format(BACKUP_TIMESTAMP_FORMAT));
    original.with_file_name(name)
}

/// Copies the original content of `original` into a new timestamped backup.
///
/// An existing backup is never overwritten: a second backup within the same
/// second gets a `.1`, `.2`, ... suffix.
///
/// # Errors
///
/// Returns `Err` if the backup file cannot be written or every suffix up to
/// `MAX_BACKUP_SUFFIX` is taken.
pub async fn write_backup(original: &Path, content: &[u8]) -> Result<PathBuf> {
    write_backup_at(original, content, Local::now()).await
}

async fn write_backup_at(original: &Path, content: &[u8], now: DateTime<Local>) -> Result<PathBuf> {
    let base = backup_path(original, now);
    let mode = current_mode(original).await;

    for suffix in 0..=MAX_BACKUP_SUFFIX {
        let path = if suffix == 0 {
            base.clone()
        } else {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!(".{suffix}"));
            PathBuf::from(name)
        };

        match write_with_mode(&path, content, mode, true).await {
            Ok(()) => {
                info!("Wrote backup {}", path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("too many backups named {}", base.display()),
    )
    .into())
}

/// Replaces `path` with `content` using an atomic write pattern.
/// 1. Writes to a temporary file next to the target.
/// 2. Applies the target's current permissions.
/// 3. Atomically renames to the target path.
///
/// # Errors
///
/// Returns `Err` if the temporary file cannot be written or renamed.
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    temp_name.push(".portman.tmp");
    let temp_path = path.with_file_name(temp_name);

    write_with_mode(&temp_path, content, current_mode(path).await, false).await?;

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot write rules file. Free up space and try again.",
            )
            .into()
        } else {
            e.into()
        });
    }

    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(unix)]
async fn current_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::metadata(path)
        .await
        .map_or(DEFAULT_MODE, |meta| meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
async fn current_mode(_path: &Path) -> u32 {
    0
}

/// Writes `content` to `path` with `mode`. With `exclusive`, fails with
/// `AlreadyExists` instead of replacing an existing file.
async fn write_with_mode(
    path: &Path,
    content: &[u8],
    mode: u32,
    exclusive: bool,
) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true);
    if exclusive {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }

    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::PermissionsExt;

        let file = options.mode(mode).open(path).await?;
        // mode() is filtered through the umask; set it explicitly
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .await?;
        file
    };

    #[cfg(not(unix))]
    let mut file = {
        let _ = mode;
        options.open(path).await?
    };

    file.write_all(content).await?;
    file.sync_all().await?;
    Ok(())
}
