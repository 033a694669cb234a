//! Command-line interface for the updater
//!
//! The binary has no subcommands: it is started next to (or by) the application
//! it keeps up to date, usually as a background service.
//!
//! # Examples
//!
//! ```bash
//! # Check every five minutes, restart the app after an update
//! autoupdater --current 1.1.0 \
//!   --latest-url https://raw.example.com/org/repo/main/latest.json \
//!   --target-dir /opt/fisher \
//!   --restart "./fisher --minimized" \
//!   --interval 300
//!
//! # Single check from a scheduled task
//! autoupdater --once --current 1.1.0 --latest-url https://updates.example.com/latest.txt --target-dir .
//!
//! # Same, with settings from the environment
//! AUTOUPDATER_CURRENT=1.1.0 AUTOUPDATER_TARGET_DIR=/opt/fisher autoupdater --once --latest-url ...
//! ```
//!
//! # Exit Status
//!
//! - `0`: the check(s) ran; failed cycles are logged, not fatal
//! - `1`: startup failed (missing or invalid setting, target directory missing,
//!   helper interpreter not found)
//!
//! After a successful deployment the process exits with `0` while the helper
//! replaces the application files.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{FallbackScheme, PartialSettings, UpdateConfig};
use crate::updater::UpdateAgent;
use crate::updater::deploy::{DetachedLauncher, terminate_for_handoff};
use crate::updater::driver::PollingDriver;

/// Self-updating agent for installed applications.
#[derive(Parser, Debug)]
#[command(
    name = "autoupdater",
    about = "Keep an installed application up to date from a release manifest",
    version,
    long_about = "Polls a release manifest, downloads and verifies new versions, and replaces the \
                  application's files through a detached helper once this process has exited."
)]
pub struct Cli {
    /// Version string of the installed application, compared verbatim with the manifest
    #[arg(long, env = "AUTOUPDATER_CURRENT", value_name = "VERSION")]
    current: Option<String>,

    /// URL of the manifest: a JSON object or a plain-text version
    #[arg(
        long = "latest-url",
        visible_alias = "manifest-url",
        env = "AUTOUPDATER_LATEST_URL",
        value_name = "URL"
    )]
    latest_url: Option<String>,

    /// Directory holding the application's files; must exist
    #[arg(long, env = "AUTOUPDATER_TARGET_DIR", value_name = "DIR")]
    target_dir: Option<String>,

    /// Command started from the target directory after the update, used verbatim
    #[arg(long, env = "AUTOUPDATER_RESTART", value_name = "COMMAND", allow_hyphen_values = true)]
    restart: Option<String>,

    /// Seconds between checks [default: 60, minimum: 5]
    #[arg(long, env = "AUTOUPDATER_INTERVAL", value_name = "SECONDS")]
    interval: Option<u64>,

    /// Run a single check and exit
    #[arg(long)]
    once: bool,

    /// Skip SHA-256 verification of the downloaded artifact (not recommended)
    #[arg(long, visible_alias = "skip-verification")]
    insecure: bool,

    /// Artifact name prefix of the derived download URL `<prefix>_v<version>.zip` [default: app]
    #[arg(long, env = "AUTOUPDATER_ARTIFACT_PREFIX", value_name = "PREFIX")]
    artifact_prefix: Option<String>,

    /// Scheme of the derived download URL [default: https]
    #[arg(long, env = "AUTOUPDATER_FALLBACK_SCHEME", value_enum, value_name = "SCHEME")]
    fallback_scheme: Option<FallbackScheme>,

    /// Timeout of the manifest request in seconds [default: 8]
    #[arg(long, env = "AUTOUPDATER_MANIFEST_TIMEOUT", value_name = "SECONDS")]
    manifest_timeout: Option<u64>,

    /// Seconds the download may stall before it is abandoned [default: 30]
    #[arg(long, env = "AUTOUPDATER_DOWNLOAD_TIMEOUT", value_name = "SECONDS")]
    download_timeout: Option<u64>,

    /// Directory in which staging areas are created [default: system temp dir]
    #[arg(long, env = "AUTOUPDATER_STAGING_ROOT", value_name = "DIR")]
    staging_root: Option<String>,

    /// Disable the download progress bar
    #[arg(long)]
    no_progress: bool,

    /// Path to a TOML settings file
    #[arg(short, long, env = "AUTOUPDATER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug details
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Log level selected by `--verbose` / `--quiet`.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// The command-line (and environment) layer of the settings.
    ///
    /// Boolean flags only contribute when set, so an absent flag never overrides
    /// `true` from the settings file.
    #[must_use]
    pub fn to_settings(&self) -> PartialSettings {
        PartialSettings {
            current_version: self.current.clone(),
            manifest_url: self.latest_url.clone(),
            target_dir: self.target_dir.clone(),
            restart_command: self.restart.clone(),
            poll_interval: self.interval,
            run_once: self.once.then_some(true),
            skip_verification: self.insecure.then_some(true),
            artifact_prefix: self.artifact_prefix.clone(),
            fallback_scheme: self.fallback_scheme,
            manifest_timeout_secs: self.manifest_timeout,
            download_timeout_secs: self.download_timeout,
            staging_root: self.staging_root.clone(),
            no_progress: self.no_progress.then_some(true),
        }
    }

    /// Merge every settings layer and validate the result.
    ///
    /// Runs before any network activity; every error here is startup-fatal.
    pub fn resolve_config(&self) -> Result<UpdateConfig> {
        let file = PartialSettings::load_with_optional(self.config.as_deref())
            .context("Failed to load settings file")?;
        let config = self.to_settings().merge(file).resolve()?;
        Ok(config)
    }

    /// Run the updater until it is done.
    ///
    /// Returns after the single check in `--once` mode. In continuous mode it only
    /// returns on a startup error. After a deployment the process is terminated
    /// here so the helper can take over.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());

        let config = self.resolve_config()?;
        let launcher = DetachedLauncher::new()?;

        info!(
            current = config.current_version(),
            manifest = config.manifest_url(),
            target = %config.target_dir().display(),
            "Starting autoupdater"
        );

        let agent = UpdateAgent::new(config, Arc::new(launcher))?;
        let outcome = PollingDriver::new(agent).run().await;

        if outcome.requires_handoff() {
            terminate_for_handoff();
        }
        Ok(())
    }
}

/// Install the stderr log subscriber. An explicit `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
