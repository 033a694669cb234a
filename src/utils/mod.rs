//! Supporting utilities.
//!
//! - [`progress`] - download progress bar built on `indicatif`

pub mod progress;

pub use progress::DownloadProgress;
