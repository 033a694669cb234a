//! Layered settings for the updater.
//!
//! [`PartialSettings`] is the shape shared by every configuration layer: the
//! TOML file, the environment (through clap's `env` support) and the command
//! line. Every field is optional so layers can be merged field by field before
//! the result is validated once into an immutable [`UpdateConfig`].
//!
//! # File Location
//!
//! - `--config <path>` or `AUTOUPDATER_CONFIG` (the file must exist)
//! - otherwise `<config dir>/autoupdater/config.toml` when present, where the
//!   config dir comes from [`dirs::config_dir`]
//!
//! # File Format
//!
//! ```toml
//! current_version = "1.1.0"
//! manifest_url = "https://raw.example.com/org/repo/main/latest.json"
//! target_dir = "~/apps/fisher"
//! restart_command = "\"fisher.exe\" --minimized"
//! poll_interval = 300
//! artifact_prefix = "fisher"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::update_config::{FallbackScheme, PollInterval, UpdateConfig};
use crate::constants::{
    DEFAULT_ARTIFACT_PREFIX, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_MANIFEST_TIMEOUT,
    DEFAULT_POLL_INTERVAL_SECS,
};
use crate::core::UpdateError;

/// One configuration layer with every setting optional.
///
/// Field names double as TOML keys. Unknown keys are rejected so a typo in the
/// config file fails loudly at startup instead of being silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialSettings {
    /// Version string of the currently installed application.
    pub current_version: Option<String>,
    /// URL of the remote update manifest.
    pub manifest_url: Option<String>,
    /// Directory holding the application's files. `~` is expanded.
    pub target_dir: Option<String>,
    /// Command started by the helper after the copy, kept verbatim.
    pub restart_command: Option<String>,
    /// Requested seconds between cycles (clamped to the floor).
    pub poll_interval: Option<u64>,
    /// Run a single cycle and return.
    pub run_once: Option<bool>,
    /// Skip digest verification even when the manifest announces one.
    pub skip_verification: Option<bool>,
    /// `<artifact-name-prefix>` used by the fallback download URL.
    pub artifact_prefix: Option<String>,
    /// Scheme of the fallback download URL.
    pub fallback_scheme: Option<FallbackScheme>,
    /// Timeout of the manifest GET, in seconds.
    pub manifest_timeout_secs: Option<u64>,
    /// Idle timeout of the artifact download, in seconds.
    pub download_timeout_secs: Option<u64>,
    /// Parent directory for staging areas. `~` is expanded.
    pub staging_root: Option<String>,
    /// Disable the download progress bar.
    pub no_progress: Option<bool>,
}

impl PartialSettings {
    /// Merge two layers; values set in `self` win over values in `lower`.
    #[must_use]
    pub fn merge(self, lower: PartialSettings) -> PartialSettings {
        PartialSettings {
            current_version: self.current_version.or(lower.current_version),
            manifest_url: self.manifest_url.or(lower.manifest_url),
            target_dir: self.target_dir.or(lower.target_dir),
            restart_command: self.restart_command.or(lower.restart_command),
            poll_interval: self.poll_interval.or(lower.poll_interval),
            run_once: self.run_once.or(lower.run_once),
            skip_verification: self.skip_verification.or(lower.skip_verification),
            artifact_prefix: self.artifact_prefix.or(lower.artifact_prefix),
            fallback_scheme: self.fallback_scheme.or(lower.fallback_scheme),
            manifest_timeout_secs: self.manifest_timeout_secs.or(lower.manifest_timeout_secs),
            download_timeout_secs: self.download_timeout_secs.or(lower.download_timeout_secs),
            staging_root: self.staging_root.or(lower.staging_root),
            no_progress: self.no_progress.or(lower.no_progress),
        }
    }

    /// Default location of the settings file, if the platform has a config dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("autoupdater").join("config.toml"))
    }

    /// Load settings from an explicit path, or from the default location when present.
    ///
    /// An explicit path that does not exist is an error; a missing default file
    /// simply yields an empty layer.
    pub fn load_with_optional(path: Option<&Path>) -> Result<Self, UpdateError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load settings from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, UpdateError> {
        debug!("Loading settings from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| UpdateError::Config {
            message: format!("Failed to read config file {}: {e}", path.display()),
        })?;

        toml::from_str(&content).map_err(|e| UpdateError::Config {
            message: format!("Failed to parse config file {}: {e}", path.display()),
        })
    }

    /// Validate the merged layers into an [`UpdateConfig`].
    ///
    /// This is where the startup-fatal checks happen: required settings, manifest
    /// URL shape and the existence of the target directory. Nothing here touches
    /// the network.
    pub fn resolve(self) -> Result<UpdateConfig, UpdateError> {
        let current_version = required(self.current_version, "--current")?;
        let manifest_url = required(self.manifest_url, "--latest-url")?;
        let target_dir = required(self.target_dir, "--target-dir")?;

        let mut config = UpdateConfig::new(current_version, &manifest_url, &target_dir)?
            .with_restart_command(self.restart_command.filter(|c| !c.trim().is_empty()))
            .with_poll_interval(PollInterval::from_secs(
                self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ))
            .with_run_once(self.run_once.unwrap_or(false))
            .with_skip_verification(self.skip_verification.unwrap_or(false))
            .with_artifact_prefix(
                self.artifact_prefix.unwrap_or_else(|| DEFAULT_ARTIFACT_PREFIX.to_string()),
            )
            .with_fallback_scheme(self.fallback_scheme.unwrap_or_default())
            .with_manifest_timeout(timeout(
                self.manifest_timeout_secs,
                DEFAULT_MANIFEST_TIMEOUT,
                "--manifest-timeout",
            )?)
            .with_download_timeout(timeout(
                self.download_timeout_secs,
                DEFAULT_DOWNLOAD_TIMEOUT,
                "--download-timeout",
            )?)
            .with_show_progress(!self.no_progress.unwrap_or(false));

        if let Some(root) = self.staging_root {
            config = config.with_staging_root(Some(PathBuf::from(
                shellexpand::tilde(&root).into_owned(),
            )));
        }

        Ok(config)
    }
}

fn required(value: Option<String>, flag: &str) -> Result<String, UpdateError> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| UpdateError::Config {
        message: format!("missing required setting {flag}"),
    })
}

/// A configured timeout in seconds; zero would fail every request.
fn timeout(secs: Option<u64>, default: Duration, flag: &str) -> Result<Duration, UpdateError> {
    match secs {
        None => Ok(default),
        Some(0) => Err(UpdateError::Config {
            message: format!("{flag} must be at least 1 second"),
        }),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}
