//! The update-application pipeline.
//!
//! One check cycle runs these stages strictly in sequence:
//!
//! ```text
//! ManifestFetcher ──► version gate ──► PackageRetriever ──► ChecksumVerifier ──► DeploymentOrchestrator
//!   (manifest)        (equal: stop)     (staging area)       (digest check)        (extract, helper, launch)
//! ```
//!
//! [`UpdateAgent::check_once`] runs one cycle and returns the first error it hits.
//! [`UpdateAgent::run_cycle`] is the cycle boundary: it is the only place errors
//! are caught, each one is logged once with its stage, and the cycle simply ends.
//! Nothing is retried within a cycle.
//!
//! A [`CycleOutcome::Deployed`] means a helper is now waiting for this process
//! to exit; the [`driver`] ends the process with
//! [`deploy::terminate_for_handoff`] when it sees one.
//!
//! # Modules
//!
//! - [`http`] - shared HTTP client with the request timeouts
//! - [`manifest`] - manifest fetch and the JSON / plain-text grammar
//! - [`version_gate`] - exact-match version comparison
//! - [`download`] - staging areas, fallback URL, streamed download
//! - [`verification`] - chunked SHA-256 verification
//! - [`extract`] - zip extraction with traversal guard
//! - [`helper_script`] - replace-and-restart script templates
//! - [`deploy`] - extraction, helper launch and process handoff
//! - [`driver`] - single-shot and continuous polling

pub mod deploy;
pub mod download;
pub mod driver;
pub mod extract;
pub mod helper_script;
pub mod http;
pub mod manifest;
pub mod verification;
pub mod version_gate;

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::UpdateConfig;
use crate::core::UpdateError;
use deploy::{Deployment, DeploymentOrchestrator, HelperLauncher};
use download::{PackageRetriever, fallback_download_url};
use helper_script::ScriptFlavor;
use http::HttpClient;
use manifest::ManifestFetcher;
use verification::{ChecksumVerifier, Verification};
use version_gate::update_available;

/// Details of an update handed over to the helper.
#[derive(Debug, Clone)]
pub struct DeployedUpdate {
    /// Version that is being installed.
    pub version: String,
    /// URL the artifact came from.
    pub download_url: String,
    /// Outcome of the integrity check.
    pub verification: Verification,
    /// Staging area, extracted files and launched helper.
    pub deployment: Deployment,
}

/// How one check cycle ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The remote version equals the installed one.
    UpToDate {
        /// The version reported by the manifest.
        version: String,
    },
    /// A helper was launched; the process must terminate now.
    Deployed(Box<DeployedUpdate>),
    /// The cycle failed and was abandoned. Already logged.
    Abandoned(UpdateError),
}

impl CycleOutcome {
    /// Whether the caller has to hand over to the helper by exiting.
    #[must_use]
    pub const fn requires_handoff(&self) -> bool {
        matches!(self, Self::Deployed(_))
    }
}

/// Runs check cycles against one immutable configuration.
///
/// All collaborators are built once from the configuration and reused by every
/// cycle. The helper launcher is injected so tests can observe deployments
/// without starting processes.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdater_cli::config::UpdateConfig;
/// use autoupdater_cli::updater::UpdateAgent;
/// use autoupdater_cli::updater::deploy::DetachedLauncher;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), autoupdater_cli::core::UpdateError> {
/// let config = UpdateConfig::new("1.1.0", "https://updates.example.com/latest.json", "/opt/app")?;
/// let agent = UpdateAgent::new(config, Arc::new(DetachedLauncher::new()?))?;
/// let outcome = agent.run_cycle().await;
/// if outcome.requires_handoff() {
///     autoupdater_cli::updater::deploy::terminate_for_handoff();
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateAgent {
    config: UpdateConfig,
    fetcher: ManifestFetcher,
    retriever: PackageRetriever,
    verifier: ChecksumVerifier,
    orchestrator: DeploymentOrchestrator,
}

impl UpdateAgent {
    /// Build an agent with native helper scripts.
    pub fn new(config: UpdateConfig, launcher: Arc<dyn HelperLauncher>) -> Result<Self, UpdateError> {
        let client = HttpClient::from_config(&config)?;
        Ok(Self {
            fetcher: ManifestFetcher::new(client.clone()),
            retriever: PackageRetriever::new(client, config.show_progress()),
            verifier: ChecksumVerifier::new(config.skip_verification()),
            orchestrator: DeploymentOrchestrator::new(launcher),
            config,
        })
    }

    /// Generate helper scripts of `flavor` instead of the native one.
    #[must_use]
    pub fn with_script_flavor(mut self, flavor: ScriptFlavor) -> Self {
        self.orchestrator = self.orchestrator.with_flavor(flavor);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Run one check cycle, stopping at the first failing stage.
    pub async fn check_once(&self) -> Result<CycleOutcome, UpdateError> {
        let config = &self.config;
        let manifest = self.fetcher.fetch(config.manifest_url()).await?;

        if !update_available(config.current_version(), &manifest.version) {
            info!("Already up to date: {}", config.current_version());
            return Ok(CycleOutcome::UpToDate {
                version: manifest.version,
            });
        }

        info!(
            "New version {} available (current {})",
            manifest.version,
            config.current_version()
        );

        let download_url = match manifest.download_url {
            Some(url) => url,
            None => fallback_download_url(
                config.manifest_url(),
                &manifest.version,
                config.artifact_prefix(),
                config.fallback_scheme(),
            )?,
        };

        let artifact = self.retriever.retrieve(&download_url, &config.staging_root()).await?;
        let verification =
            self.verifier.verify(&artifact.path, manifest.content_hash.as_deref()).await?;

        let deployment = self
            .orchestrator
            .deploy(&artifact, config.target_dir(), config.restart_command())
            .await?;

        Ok(CycleOutcome::Deployed(Box::new(DeployedUpdate {
            version: manifest.version,
            download_url,
            verification,
            deployment,
        })))
    }

    /// Run one check cycle and log its failure, if any.
    ///
    /// Never returns an error: a failed cycle is reported as
    /// [`CycleOutcome::Abandoned`] after being logged. Integrity failures are
    /// logged at error level so they stay visible with `--quiet`.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match self.check_once().await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    UpdateError::Integrity {
                        path,
                        expected,
                        actual,
                    } => error!(
                        stage = err.stage(),
                        %path,
                        %expected,
                        %actual,
                        "Checksum verification failed, update abandoned and application left untouched"
                    ),
                    _ => warn!(stage = err.stage(), "Update check failed: {err}"),
                }
                CycleOutcome::Abandoned(err)
            }
        }
    }
}
