//! Helper launcher that records instead of spawning.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::core::UpdateError;
use crate::updater::deploy::HelperLauncher;
use crate::updater::helper_script::ReplaceHelperScript;

/// Records every launch request. Optionally fails them all.
///
/// Share it through an `Arc` with the agent and inspect it afterwards:
///
/// ```rust,no_run
/// use autoupdater_cli::test_utils::RecordingLauncher;
/// use std::sync::Arc;
///
/// let launcher = Arc::new(RecordingLauncher::new());
/// // UpdateAgent::new(config, launcher.clone())
/// assert!(launcher.launched().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<ReplaceHelperScript>>,
    fail: bool,
}

impl RecordingLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose every launch fails with [`UpdateError::Deployment`].
    #[must_use]
    pub fn failing() -> Self {
        Self {
            launched: Mutex::default(),
            fail: true,
        }
    }

    /// Scripts launched so far, oldest first.
    #[must_use]
    pub fn launched(&self) -> Vec<ReplaceHelperScript> {
        self.launched.lock().map(|scripts| scripts.clone()).unwrap_or_default()
    }

    /// Paths of the scripts launched so far.
    #[must_use]
    pub fn launched_paths(&self) -> Vec<PathBuf> {
        self.launched().iter().map(|script| script.path().to_path_buf()).collect()
    }
}

impl HelperLauncher for RecordingLauncher {
    fn launch(&self, script: &ReplaceHelperScript) -> Result<(), UpdateError> {
        if self.fail {
            return Err(UpdateError::Deployment {
                reason: format!("refusing to launch {}", script.path().display()),
            });
        }
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(script.clone());
        }
        Ok(())
    }
}
