//! Validated, immutable updater configuration.

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_ARTIFACT_PREFIX, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_MANIFEST_TIMEOUT,
    DEFAULT_POLL_INTERVAL_SECS, MIN_POLL_INTERVAL_SECS,
};
use crate::core::UpdateError;

/// Requested delay between two check cycles.
///
/// The requested value is kept as given; [`PollInterval::effective`] applies the
/// floor of [`MIN_POLL_INTERVAL_SECS`] seconds.
///
/// ```rust
/// use autoupdater_cli::config::PollInterval;
/// use std::time::Duration;
///
/// assert_eq!(PollInterval::from_secs(2).effective(), Duration::from_secs(5));
/// assert_eq!(PollInterval::from_secs(90).effective(), Duration::from_secs(90));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(u64);

impl PollInterval {
    /// Wrap a requested number of seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Seconds as requested by the operator.
    #[must_use]
    pub const fn requested_secs(self) -> u64 {
        self.0
    }

    /// Interval actually slept between cycles: `max(MIN_POLL_INTERVAL_SECS, requested)`.
    #[must_use]
    pub fn effective(self) -> Duration {
        Duration::from_secs(self.0.max(MIN_POLL_INTERVAL_SECS))
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(DEFAULT_POLL_INTERVAL_SECS)
    }
}

/// Scheme used when the download URL is derived from the manifest URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FallbackScheme {
    /// Always derive an `https://` URL.
    #[default]
    Https,
    /// Derive a plain `http://` URL. Only useful against local test servers.
    Http,
}

impl FallbackScheme {
    /// Scheme name without the `://` separator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for FallbackScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete configuration of one updater process.
///
/// Built once at startup by [`PartialSettings::resolve`](super::PartialSettings::resolve)
/// (or [`UpdateConfig::new`] in tests) and never mutated afterwards. The target
/// directory is absolute and existed at construction time.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    current_version: String,
    manifest_url: String,
    target_dir: PathBuf,
    restart_command: Option<String>,
    poll_interval: PollInterval,
    run_once: bool,
    skip_verification: bool,
    artifact_prefix: String,
    fallback_scheme: FallbackScheme,
    manifest_timeout: Duration,
    download_timeout: Duration,
    staging_root: Option<PathBuf>,
    show_progress: bool,
}

impl UpdateConfig {
    /// Create a configuration with defaults for every optional setting.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Config`] if the version is empty or the manifest URL is
    ///   not an absolute `http`/`https` URL with a host
    /// - [`UpdateError::TargetDirMissing`] if the target directory does not exist
    pub fn new(
        current_version: impl Into<String>,
        manifest_url: &str,
        target_dir: &str,
    ) -> Result<Self, UpdateError> {
        let current_version = current_version.into();
        if current_version.trim().is_empty() {
            return Err(UpdateError::Config {
                message: "current version must not be empty".to_string(),
            });
        }

        validate_manifest_url(manifest_url)?;
        let target_dir = resolve_target_dir(target_dir)?;

        Ok(Self {
            current_version,
            manifest_url: manifest_url.to_string(),
            target_dir,
            restart_command: None,
            poll_interval: PollInterval::default(),
            run_once: false,
            skip_verification: false,
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            fallback_scheme: FallbackScheme::default(),
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            staging_root: None,
            show_progress: true,
        })
    }

    /// Set the restart command handed to the helper script.
    #[must_use]
    pub fn with_restart_command(mut self, command: Option<String>) -> Self {
        self.restart_command = command;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: PollInterval) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Select single-shot mode.
    #[must_use]
    pub const fn with_run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    /// Skip digest verification.
    #[must_use]
    pub const fn with_skip_verification(mut self, skip: bool) -> Self {
        self.skip_verification = skip;
        self
    }

    /// Set the artifact name prefix of the fallback download URL.
    #[must_use]
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.artifact_prefix = prefix.into();
        self
    }

    /// Set the scheme of the fallback download URL.
    #[must_use]
    pub const fn with_fallback_scheme(mut self, scheme: FallbackScheme) -> Self {
        self.fallback_scheme = scheme;
        self
    }

    /// Set the manifest request timeout.
    #[must_use]
    pub const fn with_manifest_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_timeout = timeout;
        self
    }

    /// Set the download idle timeout.
    #[must_use]
    pub const fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the parent directory of staging areas. `None` means the system temp dir.
    #[must_use]
    pub fn with_staging_root(mut self, root: Option<PathBuf>) -> Self {
        self.staging_root = root;
        self
    }

    /// Enable or disable the download progress bar.
    #[must_use]
    pub const fn with_show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    #[must_use]
    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }

    /// Absolute path of the application directory.
    #[must_use]
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    #[must_use]
    pub fn restart_command(&self) -> Option<&str> {
        self.restart_command.as_deref()
    }

    #[must_use]
    pub const fn poll_interval(&self) -> PollInterval {
        self.poll_interval
    }

    #[must_use]
    pub const fn run_once(&self) -> bool {
        self.run_once
    }

    #[must_use]
    pub const fn skip_verification(&self) -> bool {
        self.skip_verification
    }

    #[must_use]
    pub fn artifact_prefix(&self) -> &str {
        &self.artifact_prefix
    }

    #[must_use]
    pub const fn fallback_scheme(&self) -> FallbackScheme {
        self.fallback_scheme
    }

    #[must_use]
    pub const fn manifest_timeout(&self) -> Duration {
        self.manifest_timeout
    }

    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    /// Parent directory for staging areas; falls back to [`std::env::temp_dir`].
    #[must_use]
    pub fn staging_root(&self) -> PathBuf {
        self.staging_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub const fn show_progress(&self) -> bool {
        self.show_progress
    }
}

/// Expand `~`, make the path absolute and require that it is an existing directory.
///
/// # Errors
///
/// Returns [`UpdateError::TargetDirMissing`] carrying the resolved absolute path
/// when nothing exists there, or when the path is not a directory.
pub fn resolve_target_dir(raw: &str) -> Result<PathBuf, UpdateError> {
    let expanded = shellexpand::tilde(raw).into_owned();
    let absolute = std::path::absolute(&expanded).map_err(|e| UpdateError::Config {
        message: format!("cannot make target directory '{raw}' absolute: {e}"),
    })?;

    if !absolute.is_dir() {
        return Err(UpdateError::TargetDirMissing {
            path: absolute.display().to_string(),
        });
    }

    Ok(absolute)
}

fn validate_manifest_url(url: &str) -> Result<(), UpdateError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| UpdateError::Config {
        message: format!("invalid manifest URL '{url}': {e}"),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UpdateError::Config {
            message: format!("manifest URL must use http or https: {url}"),
        });
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UpdateError::Config {
            message: format!("manifest URL has no host: {url}"),
        });
    }

    Ok(())
}
