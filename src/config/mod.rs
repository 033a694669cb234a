//! Configuration management for the updater
//!
//! Settings come from four layers, highest precedence first:
//!
//! 1. **Command line** flags
//! 2. **Environment** variables named `AUTOUPDATER_*` (wired through clap's `env` support)
//! 3. **Settings file** in TOML, see [`settings`] for its location and format
//! 4. **Built-in defaults** from [`crate::constants`]
//!
//! Each layer is a [`PartialSettings`]. The layers are merged with
//! [`PartialSettings::merge`] and validated once by [`PartialSettings::resolve`]
//! into an immutable [`UpdateConfig`]. Validation is where startup-fatal errors
//! are raised, before any network activity.
//!
//! # Settings
//!
//! | Flag | TOML key | Default |
//! |---|---|---|
//! | `--current` | `current_version` | required |
//! | `--latest-url` | `manifest_url` | required |
//! | `--target-dir` | `target_dir` | required, must exist |
//! | `--restart` | `restart_command` | none |
//! | `--interval` | `poll_interval` | 60 (floor 5) |
//! | `--once` | `run_once` | false |
//! | `--insecure` | `skip_verification` | false |
//! | `--artifact-prefix` | `artifact_prefix` | `app` |
//! | `--fallback-scheme` | `fallback_scheme` | `https` |
//! | `--manifest-timeout` | `manifest_timeout_secs` | 8 |
//! | `--download-timeout` | `download_timeout_secs` | 30 |
//! | `--staging-root` | `staging_root` | system temp dir |
//! | `--no-progress` | `no_progress` | false |
//!
//! # Example
//!
//! ```rust,no_run
//! use autoupdater_cli::config::PartialSettings;
//!
//! # fn example() -> Result<(), autoupdater_cli::core::UpdateError> {
//! let cli = PartialSettings {
//!     current_version: Some("1.1.0".to_string()),
//!     manifest_url: Some("https://updates.example.com/latest.json".to_string()),
//!     target_dir: Some("/opt/fisher".to_string()),
//!     ..PartialSettings::default()
//! };
//! let file = PartialSettings::load_with_optional(None)?;
//! let config = cli.merge(file).resolve()?;
//! println!("checking every {:?}", config.poll_interval().effective());
//! # Ok(())
//! # }
//! ```

pub mod settings;
pub mod update_config;

pub use settings::PartialSettings;
pub use update_config::{FallbackScheme, PollInterval, UpdateConfig, resolve_target_dir};
