//! Directory naming, filename generation, and collision-safe image writes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// How many fresh names to try before giving up on a write.
const MAX_NAME_ATTEMPTS: u32 = 8;

/// Replaces path-hostile characters so a keyword can name a directory or file.
///
/// Unicode letters and digits are kept (keywords are often non-Latin); runs of
/// separators collapse into a single `_`. An input with nothing usable maps to `_`.
#[must_use]
pub fn sanitize_path_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Generates `<unix-seconds>_<8 hex digits>.<extension>`.
#[must_use]
pub fn unique_image_filename(extension: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..=u32::MAX);
    format!("{timestamp}_{suffix:08x}.{extension}")
}

/// Writes `bytes` into `dir` under a freshly generated name, never overwriting.
///
/// The directory is created on demand. Files are opened with create-new
/// semantics, so two writers racing on the same name cannot clobber each
/// other; the loser simply draws another name.
///
/// # Errors
///
/// Returns the I/O error from directory creation or writing, or
/// `AlreadyExists` if every generated name was taken.
pub async fn write_unique(dir: &Path, extension: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(unique_image_filename(extension));
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "name collision, drawing another");
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = write_all_and_sync(&mut file, bytes).await {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        return Ok(path);
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free filename in {} after {MAX_NAME_ATTEMPTS} attempts", dir.display()),
    ))
}

async fn write_all_and_sync(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
