//! Deployment of a verified artifact through a detached helper.
//!
//! The orchestrator never writes into the target directory. It extracts the
//! artifact inside the staging area, writes the helper script next to it and
//! starts the helper as a detached process. Control then goes back to the caller,
//! which must end this process with [`terminate_for_handoff`] so the helper can
//! replace files the updater may still hold open.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info};

use super::download::{RetrievedArtifact, StagingArea};
use super::extract::extract_archive;
use super::helper_script::{HelperParams, ReplaceHelperScript, ScriptFlavor};
use crate::constants::HELPER_GRACE_PERIOD_SECS;
use crate::core::UpdateError;

/// File in the staging root's parent that receives the helper's output.
pub const HELPER_LOG_FILE_NAME: &str = "autoupdater-helper.log";

/// Starts a helper script so that it outlives the current process.
///
/// The production implementation is [`DetachedLauncher`]; tests substitute a
/// launcher that only records what it was asked to run.
pub trait HelperLauncher: Send + Sync {
    /// Start `script` without waiting for it.
    fn launch(&self, script: &ReplaceHelperScript) -> Result<(), UpdateError>;
}

/// Launches helpers with the platform interpreter, detached from this process.
///
/// - Unix: `sh <script>` in a new process group with stdin closed
/// - Windows: `cmd /C <script>` with `DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP`
///
/// The helper's stdout and stderr go to [`HELPER_LOG_FILE_NAME`] next
/// to the staging area, so copy failures remain visible after the helper is gone.
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    interpreter: PathBuf,
}

impl DetachedLauncher {
    /// Resolve the interpreter of the native script flavour on `PATH`.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Config`] when the interpreter cannot be found. This is a
    /// startup check: without it no update could ever be deployed.
    pub fn new() -> Result<Self, UpdateError> {
        Self::for_flavor(ScriptFlavor::native())
    }

    /// Resolve the interpreter of `flavor` on `PATH`.
    pub fn for_flavor(flavor: ScriptFlavor) -> Result<Self, UpdateError> {
        let interpreter = which::which(flavor.interpreter()).map_err(|e| UpdateError::Config {
            message: format!("helper interpreter '{}' not found: {e}", flavor.interpreter()),
        })?;
        debug!("Helper interpreter: {}", interpreter.display());
        Ok(Self { interpreter })
    }

    #[must_use]
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }
}

impl HelperLauncher for DetachedLauncher {
    fn launch(&self, script: &ReplaceHelperScript) -> Result<(), UpdateError> {
        let workdir = script.path().parent().and_then(Path::parent).unwrap_or_else(|| Path::new("."));

        let mut command = Command::new(&self.interpreter);
        if script.flavor() == ScriptFlavor::Batch {
            command.arg("/C");
        }
        command.arg(script.path()).current_dir(workdir).stdin(Stdio::null());

        // Truncated per launch: the log only ever holds the latest helper run.
        let log_path = workdir.join(HELPER_LOG_FILE_NAME);
        match OpenOptions::new().create(true).write(true).truncate(true).open(&log_path) {
            Ok(log) => {
                let stderr = log.try_clone().map_or_else(|_| Stdio::null(), Stdio::from);
                command.stdout(Stdio::from(log)).stderr(stderr);
            }
            Err(_) => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        detach(&mut command);

        let child = command.spawn().map_err(|e| UpdateError::Deployment {
            reason: format!("failed to launch helper {}: {e}", script.path().display()),
        })?;
        info!(pid = child.id(), "Launched update helper {}", script.path().display());
        Ok(())
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// What a successful deployment handed over to the helper.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Staging area the helper copies from and deletes.
    pub staging: StagingArea,
    /// Directory holding the extracted artifact.
    pub extracted_dir: PathBuf,
    /// Number of files extracted.
    pub files: usize,
    /// The launched helper script.
    pub script: ReplaceHelperScript,
}

/// Extracts, writes the helper and launches it.
#[derive(Clone)]
pub struct DeploymentOrchestrator {
    launcher: Arc<dyn HelperLauncher>,
    flavor: ScriptFlavor,
    grace_secs: u64,
}

impl DeploymentOrchestrator {
    /// Orchestrator producing native scripts.
    #[must_use]
    pub fn new(launcher: Arc<dyn HelperLauncher>) -> Self {
        Self {
            launcher,
            flavor: ScriptFlavor::native(),
            grace_secs: HELPER_GRACE_PERIOD_SECS,
        }
    }

    /// Produce scripts of a specific flavour.
    #[must_use]
    pub const fn with_flavor(mut self, flavor: ScriptFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Stage `artifact` for replacement of `target_dir` and start the helper.
    ///
    /// On success the caller must terminate; the helper is waiting for it.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Extraction`] if the archive is unreadable or an entry
    ///   escapes the extraction directory
    /// - [`UpdateError::Deployment`] if the script cannot be written or launched
    pub async fn deploy(
        &self,
        artifact: &RetrievedArtifact,
        target_dir: &Path,
        restart_command: Option<&str>,
    ) -> Result<Deployment, UpdateError> {
        let staging = artifact.staging.clone();
        let extracted_dir = staging.extracted_dir();

        let archive = artifact.path.clone();
        let destination = extracted_dir.clone();
        let files = tokio::task::spawn_blocking(move || extract_archive(&archive, &destination))
            .await
            .map_err(|e| UpdateError::Extraction {
                archive: artifact.path.display().to_string(),
                reason: format!("extraction task failed: {e}"),
            })??;
        info!("Extracted {} files into {}", files, extracted_dir.display());

        let script = ReplaceHelperScript::write(
            self.flavor,
            &HelperParams {
                staging_root: staging.root(),
                extracted_dir: &extracted_dir,
                target_dir,
                restart_command,
                grace_secs: self.grace_secs,
            },
        )?;

        self.launcher.launch(&script)?;

        Ok(Deployment {
            staging,
            extracted_dir,
            files,
            script,
        })
    }
}

/// End the process immediately after a successful deployment.
///
/// Uses [`std::process::exit`]: Rust destructors of live values do not run, the
/// tokio runtime is not shut down and no further cycle starts. Process-level exit
/// handlers still run (libc `atexit`, stdio flushing), and the OS releases every
/// file handle. The detached helper is sleeping through its grace period and
/// expects this process to be gone when it wakes up.
pub fn terminate_for_handoff() -> ! {
    info!("Exiting so the update helper can replace the application files");
    std::process::exit(0)
}
