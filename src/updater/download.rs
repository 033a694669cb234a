//! Artifact retrieval into a per-attempt staging area.
//!
//! Every update attempt gets its own [`StagingArea`], a uniquely named directory
//! under the configured staging root:
//!
//! ```text
//! autoupdate_XXXXXX/
//! ├── update.zip     downloaded artifact
//! ├── extracted/     archive contents
//! └── update.sh      replace-and-restart helper (update.bat on Windows)
//! ```
//!
//! The staging area is never removed by this process. On success the helper
//! deletes it once the copy is done; on failure it stays behind for inspection.

use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::http::{HttpClient, describe};
use crate::config::FallbackScheme;
use crate::constants::{ARTIFACT_FILE_NAME, EXTRACTED_DIR_NAME, STAGING_PREFIX};
use crate::core::UpdateError;
use crate::utils::progress::DownloadProgress;

/// Uniquely named scratch directory owned by one update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create a fresh staging directory inside `parent`, creating `parent` if needed.
    ///
    /// The directory is detached from `tempfile`'s cleanup: it outlives this
    /// process so the helper can copy from it and delete it afterwards.
    pub fn create_in(parent: &Path) -> Result<Self, UpdateError> {
        std::fs::create_dir_all(parent)
            .map_err(|e| UpdateError::io("create staging root", parent, &e))?;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| UpdateError::io("create staging area", parent, &e))?;

        let root = dir.keep();
        debug!("Created staging area {}", root.display());
        Ok(Self { root })
    }

    /// Root of the staging area.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact is downloaded to.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.root.join(ARTIFACT_FILE_NAME)
    }

    /// Where the archive is extracted to.
    #[must_use]
    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join(EXTRACTED_DIR_NAME)
    }
}

/// Derive the artifact URL when the manifest does not name one.
///
/// Keeps the manifest URL's host (and port) and every path segment except the
/// last, then appends `/releases/<prefix>_v<version>.zip`. Query and fragment are
/// dropped. The scheme is always `scheme`, whatever the manifest URL used.
///
/// # Examples
///
/// ```rust
/// use autoupdater_cli::config::FallbackScheme;
/// use autoupdater_cli::updater::download::fallback_download_url;
///
/// let url = fallback_download_url(
///     "https://raw.example.com/org/repo/main/latest.json",
///     "2.0.0",
///     "fisher",
///     FallbackScheme::Https,
/// )
/// .unwrap();
/// assert_eq!(url, "https://raw.example.com/org/repo/main/releases/fisher_v2.0.0.zip");
/// ```
pub fn fallback_download_url(
    manifest_url: &str,
    version: &str,
    prefix: &str,
    scheme: FallbackScheme,
) -> Result<String, UpdateError> {
    let parsed = Url::parse(manifest_url).map_err(|e| UpdateError::Fetch {
        url: manifest_url.to_string(),
        reason: format!("invalid manifest URL: {e}"),
    })?;

    let host = parsed.host_str().ok_or_else(|| UpdateError::Fetch {
        url: manifest_url.to_string(),
        reason: "manifest URL has no host".to_string(),
    })?;
    let netloc = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let path = parsed.path();
    let base = path.rsplit_once('/').map_or("", |(dir, _)| dir);

    Ok(format!("{scheme}://{netloc}{base}/releases/{prefix}_v{version}.zip"))
}

/// Artifact written to disk by [`PackageRetriever::retrieve`].
#[derive(Debug, Clone)]
pub struct RetrievedArtifact {
    /// URL the artifact was downloaded from.
    pub url: String,
    /// Staging area holding the artifact.
    pub staging: StagingArea,
    /// Path of the downloaded file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Streams an artifact into a new staging area.
#[derive(Debug, Clone)]
pub struct PackageRetriever {
    client: HttpClient,
    show_progress: bool,
}

impl PackageRetriever {
    #[must_use]
    pub const fn new(client: HttpClient, show_progress: bool) -> Self {
        Self {
            client,
            show_progress,
        }
    }

    /// Download `url` into a fresh staging area under `staging_root`.
    ///
    /// The body is written chunk by chunk as it arrives; the whole artifact is
    /// never held in memory. Each wait for the next chunk is bounded by the
    /// download timeout.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Download`] on transport failure, idle timeout, non-success
    /// status, a short body, or any local write failure. A staging area that was
    /// already created is left in place.
    pub async fn retrieve(
        &self,
        url: &str,
        staging_root: &Path,
    ) -> Result<RetrievedArtifact, UpdateError> {
        let download_error = |reason: String| UpdateError::Download {
            url: url.to_string(),
            reason,
        };

        let staging = StagingArea::create_in(staging_root).map_err(|e| download_error(e.to_string()))?;
        let path = staging.artifact_path();

        info!("Downloading update from {}", url);
        let mut response = self.client.get_artifact(url).await?;
        let expected_len = response.content_length();

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| download_error(format!("cannot create {}: {e}", path.display())))?;

        let progress = DownloadProgress::new(expected_len, self.show_progress);
        progress.set_prefix(ARTIFACT_FILE_NAME);

        let idle = self.client.download_timeout();
        let mut written: u64 = 0;
        loop {
            let chunk = match tokio::time::timeout(idle, response.chunk()).await {
                Err(_) => {
                    progress.abandon();
                    return Err(download_error(format!(
                        "no data received for {idle:?} after {written} bytes"
                    )));
                }
                Ok(Err(e)) => {
                    progress.abandon();
                    return Err(download_error(describe(&e)));
                }
                Ok(Ok(None)) => break,
                Ok(Ok(Some(chunk))) => chunk,
            };

            if let Err(e) = file.write_all(&chunk).await {
                progress.abandon();
                return Err(download_error(format!("cannot write {}: {e}", path.display())));
            }
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }

        file.flush()
            .await
            .map_err(|e| download_error(format!("cannot write {}: {e}", path.display())))?;

        if let Some(expected) = expected_len {
            if written != expected {
                progress.abandon();
                return Err(download_error(format!(
                    "body ended after {written} of {expected} bytes"
                )));
            }
        }

        progress.finish(format!("{written} bytes"));
        debug!("Wrote {} bytes to {}", written, path.display());

        Ok(RetrievedArtifact {
            url: url.to_string(),
            staging,
            path,
            bytes: written,
        })
    }
}
