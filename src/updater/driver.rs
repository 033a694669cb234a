//! Single-shot and continuous polling.

use std::time::Duration;
use tracing::{debug, info};

use super::{CycleOutcome, UpdateAgent};

/// Owns the check/sleep loop around an [`UpdateAgent`].
///
/// - **single-shot** (`--once`): one cycle, then return its outcome
/// - **continuous**: cycle, sleep `max(5, poll_interval)` seconds, repeat
///
/// Continuous mode only returns once a cycle deployed an update, and the caller
/// is then expected to terminate the process. Failed cycles never end the loop.
pub struct PollingDriver {
    agent: UpdateAgent,
}

impl PollingDriver {
    #[must_use]
    pub const fn new(agent: UpdateAgent) -> Self {
        Self { agent }
    }

    #[must_use]
    pub const fn agent(&self) -> &UpdateAgent {
        &self.agent
    }

    /// Time slept between two cycles in continuous mode.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.agent.config().poll_interval().effective()
    }

    /// Run in the mode selected by the configuration.
    pub async fn run(&self) -> CycleOutcome {
        if self.agent.config().run_once() {
            self.run_once().await
        } else {
            self.run_continuous().await
        }
    }

    /// Run exactly one cycle.
    pub async fn run_once(&self) -> CycleOutcome {
        debug!("Running a single update check");
        self.agent.run_cycle().await
    }

    /// Cycle until an update has been deployed.
    pub async fn run_continuous(&self) -> CycleOutcome {
        let interval = self.interval();
        let requested = self.agent.config().poll_interval().requested_secs();
        if interval.as_secs() != requested {
            info!("Poll interval {}s raised to {}s", requested, interval.as_secs());
        }
        info!("Checking for updates every {}s", interval.as_secs());

        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            debug!(cycle, "Starting update check");

            let outcome = self.agent.run_cycle().await;
            if outcome.requires_handoff() {
                return outcome;
            }

            tokio::time::sleep(interval).await;
        }
    }
}
