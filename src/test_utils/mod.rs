//! Test utilities for the updater
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests:
//! - [`init_test_logging`] - one-time tracing setup using the test writer
//! - [`ZipFixture`] / [`ManifestFixture`] - release artifacts and manifest bodies
//! - [`RecordingLauncher`] - helper launcher that records instead of spawning
//! - [`TestInstall`] - temporary target directory and staging root
//!
//! # Example
//!
//! ```rust,no_run
//! use autoupdater_cli::test_utils::{TestInstall, ZipFixture};
//!
//! let install = TestInstall::new().unwrap();
//! let release = ZipFixture::app_release("1.2.0").unwrap();
//! assert_eq!(release.sha256().len(), 64);
//! assert!(install.target_dir().is_dir());
//! ```

pub mod fixtures;
pub mod launcher;

pub use fixtures::{ManifestFixture, ZipFixture, ZipFixtureBuilder};
pub use launcher::RecordingLauncher;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::UpdateConfig;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG` when set, otherwise no logging.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// A throwaway installation: an application directory and a staging root.
pub struct TestInstall {
    _root: TempDir,
    target_dir: PathBuf,
    staging_root: PathBuf,
}

impl TestInstall {
    /// Create the directories, with an installed `app.bin` of version 1.1.0.
    pub fn new() -> Result<Self> {
        let root = TempDir::new()?;
        let target_dir = root.path().join("app");
        let staging_root = root.path().join("staging");
        std::fs::create_dir_all(&target_dir)?;
        std::fs::create_dir_all(&staging_root)?;
        std::fs::write(target_dir.join("app.bin"), "app 1.1.0")?;

        Ok(Self {
            _root: root,
            target_dir,
            staging_root,
        })
    }

    #[must_use]
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    #[must_use]
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Staging areas currently present under the staging root.
    pub fn staging_areas(&self) -> Result<Vec<PathBuf>> {
        let mut areas = Vec::new();
        for entry in std::fs::read_dir(&self.staging_root)? {
            let path = entry?.path();
            if path.is_dir() {
                areas.push(path);
            }
        }
        Ok(areas)
    }

    /// A configuration for this install: single-shot, no progress bar, plain-HTTP fallback.
    pub fn config(&self, current_version: &str, manifest_url: &str) -> Result<UpdateConfig> {
        let config = UpdateConfig::new(
            current_version,
            manifest_url,
            &self.target_dir.display().to_string(),
        )?
        .with_run_once(true)
        .with_show_progress(false)
        .with_fallback_scheme(crate::config::FallbackScheme::Http)
        .with_staging_root(Some(self.staging_root.clone()));
        Ok(config)
    }
}
