//! Zip extraction with a directory-traversal guard.
//!
//! Every entry name is validated before anything is written: a single entry
//! that would land outside the destination (parent references, absolute paths,
//! drive prefixes) fails the whole extraction with nothing extracted. Both `/`
//! and `\` count as separators so archives built on Windows are checked the
//! same way everywhere.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::core::UpdateError;

/// Relative path an entry name maps to, or `None` if it would escape the destination.
///
/// `.` and empty segments are dropped. A name made only of those maps to an empty
/// path, which callers treat as the destination root.
#[must_use]
pub fn safe_entry_path(name: &str) -> Option<PathBuf> {
    if name.starts_with(['/', '\\']) {
        return None;
    }

    let mut relative = PathBuf::new();
    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return None,
            // Drive letters and alternate data streams.
            s if s.contains(':') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

/// Extract every entry of `archive` into `destination`, creating it if needed.
///
/// Returns the number of files written (directories are not counted).
///
/// # Errors
///
/// [`UpdateError::Extraction`] when the archive cannot be read, an entry name
/// escapes `destination`, or a file cannot be written.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<usize, UpdateError> {
    let fail = |reason: String| UpdateError::Extraction {
        archive: archive.display().to_string(),
        reason,
    };

    let file = File::open(archive).map_err(|e| fail(format!("cannot open archive: {e}")))?;
    let mut zip = ZipArchive::new(file).map_err(|e| fail(format!("not a valid zip archive: {e}")))?;

    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(|e| fail(format!("unreadable entry #{index}: {e}")))?;
        let name = entry.name().to_string();
        let Some(relative) = safe_entry_path(&name) else {
            return Err(fail(format!("entry '{name}' escapes the extraction directory")));
        };
        entries.push((index, relative, entry.is_dir()));
    }

    fs::create_dir_all(destination)
        .map_err(|e| fail(format!("cannot create {}: {e}", destination.display())))?;

    let mut written = 0;
    for (index, relative, is_dir) in entries {
        let out_path = destination.join(&relative);

        if is_dir || relative.as_os_str().is_empty() {
            fs::create_dir_all(&out_path)
                .map_err(|e| fail(format!("cannot create {}: {e}", out_path.display())))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| fail(format!("cannot create {}: {e}", parent.display())))?;
        }

        let mut entry = zip.by_index(index).map_err(|e| fail(format!("unreadable entry #{index}: {e}")))?;
        let mut out = File::create(&out_path)
            .map_err(|e| fail(format!("cannot create {}: {e}", out_path.display())))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| fail(format!("cannot write {}: {e}", out_path.display())))?;

        apply_mode(&out_path, entry.unix_mode())
            .map_err(|e| fail(format!("cannot set mode on {}: {e}", out_path.display())))?;

        written += 1;
    }

    debug!("Extracted {} files from {} into {}", written, archive.display(), destination.display());
    Ok(written)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
