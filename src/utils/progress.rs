//! Download progress reporting.
//!
//! Wraps `indicatif` so the retriever does not need to care whether a bar is
//! actually drawn. A bar is hidden when progress is disabled in the
//! configuration, when `AUTOUPDATER_NO_PROGRESS` is set, or when stderr is not
//! a terminal (services, CI, redirected logs).
//!
//! # Examples
//!
//! ```rust
//! use autoupdater_cli::utils::progress::DownloadProgress;
//!
//! let progress = DownloadProgress::new(Some(1024), false);
//! progress.set_prefix("update.zip");
//! progress.inc(512);
//! progress.inc(512);
//! progress.finish("downloaded");
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Checks if progress bars are disabled through the environment.
fn is_progress_disabled() -> bool {
    std::env::var_os("AUTOUPDATER_NO_PROGRESS").is_some()
}

/// Byte-level progress of one artifact download.
#[derive(Clone)]
pub struct DownloadProgress {
    inner: ProgressBar,
}

impl DownloadProgress {
    /// Create a bar for `total` bytes, or a spinner when the size is unknown.
    ///
    /// `enabled` comes from the configuration; the bar is hidden regardless
    /// when the environment or the terminal rule it out.
    #[must_use]
    pub fn new(total: Option<u64>, enabled: bool) -> Self {
        if !enabled || is_progress_disabled() || !std::io::stderr().is_terminal() {
            return Self {
                inner: ProgressBar::hidden(),
            };
        }

        let inner = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(download_style());
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        Self { inner }
    }

    /// Whether anything is drawn at all.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    /// Label shown in front of the bar.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    pub fn inc(&self, bytes: u64) {
        self.inner.inc(bytes);
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Finish and leave `msg` after the bar on screen.
    pub fn finish(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Remove the bar, used when the download is abandoned.
    pub fn abandon(&self) {
        self.inner.finish_and_clear();
    }
}

const BAR_TEMPLATE: &str =
    "{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";
const SPINNER_TEMPLATE: &str = "{prefix:.bold} {spinner:.cyan} {bytes} ({bytes_per_sec}) {msg}";

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
