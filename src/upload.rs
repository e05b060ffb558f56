// Upload orchestration. Each flow runs strictly in sequence: validate the
// declared name (and size) first, stage the bytes to a transient local
// file, derive the final remote name from the existing listing, then
// create or update through the drive client. The staging handle removes
// the local copy on every exit path, errors included.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::MAX_UPLOAD_BYTES;
use crate::drive::DriveClient;
use crate::versioning;

/// Terminal result of one upload flow.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file_id: String,
    pub final_name: String,
    pub updated_existing: bool,
}

/// Versioned-name flow: the declared filename must already carry the
/// `<base>_V<n>` suffix and the archive must fit under the byte ceiling;
/// both checks run before any staging or remote call. Existing remote
/// versions force the next number.
pub fn upload_versioned<F>(
    drive: &DriveClient,
    base_name: &str,
    folder_id: &str,
    source: &Path,
    progress: F,
) -> Result<UploadOutcome>
where
    F: FnMut(u64, u64),
{
    let declared = file_name_of(source)?;
    if versioning::parse_versioned_name(base_name, &declared).is_none() {
        bail!(
            "Filename must be {base}_V<number>.zip. Example: {base}_V1.zip",
            base = base_name
        );
    }
    let size = fs::metadata(source)
        .with_context(|| format!("Failed to read {}", source.display()))?
        .len();
    check_size(size)?;

    let staged = stage(source)?;
    let existing = drive
        .list_files_containing(folder_id, base_name)
        .context("Listing existing versions")?;
    let names: Vec<&str> = existing.iter().map(|f| f.name.as_str()).collect();
    let final_name = versioning::versioned_filename(base_name, &names, &declared);
    if final_name != declared {
        info!(declared = %declared, renamed = %final_name, "existing versions found, renaming upload");
    }
    send(drive, folder_id, &final_name, staged.path(), progress)
}

/// Folder-named flow: the archive's stem must equal the destination
/// folder's name and an uploader tag is required. The final remote name is
/// always synthesized with the next folder-scoped version and a timestamp.
pub fn upload_folder_named<F>(
    drive: &DriveClient,
    folder_name: &str,
    folder_id: &str,
    uploader_tag: &str,
    source: &Path,
    progress: F,
) -> Result<UploadOutcome>
where
    F: FnMut(u64, u64),
{
    let declared = file_name_of(source)?;
    if !versioning::stem_matches_folder(folder_name, &declared) {
        bail!(
            "Archive must be named after the destination folder: expected {}.zip, got {}",
            folder_name,
            declared
        );
    }
    let tag = uploader_tag.trim();
    if tag.is_empty() {
        bail!("Uploader tag is required");
    }

    let staged = stage(source)?;
    let existing = drive
        .list_files_containing(folder_id, folder_name)
        .context("Listing existing versions")?;
    let names: Vec<&str> = existing.iter().map(|f| f.name.as_str()).collect();
    let version = versioning::next_folder_version(folder_name, &names);
    let now = chrono::Utc::now().with_timezone(&versioning::timestamp_zone());
    let final_name = versioning::folder_scoped_filename(folder_name, version, tag, now);
    send(drive, folder_id, &final_name, staged.path(), progress)
}

/// Reject archives over the ceiling before any bytes move.
pub fn check_size(len: u64) -> Result<()> {
    if len > MAX_UPLOAD_BYTES {
        bail!(
            "File too large ({:.2} GB). Max 50 GB allowed.",
            len as f64 / (1024.0 * 1024.0 * 1024.0)
        );
    }
    Ok(())
}

/// Copy the accepted archive into a transient local file.
fn stage(source: &Path) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix("drivezip-")
        .suffix(".zip")
        .tempfile()
        .context("Failed to create staging file")?;
    let mut input = fs::File::open(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;
    let copied = io::copy(&mut input, staged.as_file_mut()).context("Failed to stage archive")?;
    debug!(bytes = copied, staged = %staged.path().display(), "archive staged");
    Ok(staged)
}

/// Create-or-update routing: same final name already present in the folder
/// means the payload is replaced in place.
fn send<F>(
    drive: &DriveClient,
    folder_id: &str,
    final_name: &str,
    staged: &Path,
    progress: F,
) -> Result<UploadOutcome>
where
    F: FnMut(u64, u64),
{
    let existing = drive
        .find_file_by_name(folder_id, final_name)
        .context("Checking for an existing remote file")?;
    let (record, updated_existing) = match existing {
        Some(remote) => {
            info!(name = final_name, id = %remote.id, "replacing existing remote file");
            (drive.update_file(&remote.id, staged, progress)?, true)
        }
        None => (
            drive.create_file(final_name, folder_id, staged, progress)?,
            false,
        ),
    };
    Ok(UploadOutcome {
        file_id: record.id,
        final_name: final_name.to_string(),
        updated_existing,
    })
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("Path has no usable file name: {}", path.display()))
}
