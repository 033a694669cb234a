//! Global constants used throughout the updater.
//!
//! Timeouts, chunk sizes and staging-layout names that are shared between
//! the pipeline stages live here so the numbers stay discoverable.

use std::time::Duration;

/// Default timeout for the manifest GET (8 seconds).
pub const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Default idle timeout for the artifact download (30 seconds).
///
/// Applied to connection establishment and to the wait for each body chunk,
/// so a slow but steadily progressing download is never cut off.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of seconds between two check cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Lower bound for the poll interval.
///
/// Requests below this value are clamped so a misconfigured interval cannot
/// hammer the manifest host in a tight loop.
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Chunk size used when hashing files (8 KiB).
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Seconds the helper script waits before touching the target directory.
pub const HELPER_GRACE_PERIOD_SECS: u64 = 2;

/// Prefix of every staging directory name.
pub const STAGING_PREFIX: &str = "autoupdate_";

/// File name of the downloaded artifact inside a staging area.
pub const ARTIFACT_FILE_NAME: &str = "update.zip";

/// Directory name of the extracted contents inside a staging area.
pub const EXTRACTED_DIR_NAME: &str = "extracted";

/// Default artifact name prefix used by the fallback download URL.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "app";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("autoupdater/", env!("CARGO_PKG_VERSION"));
