//! autoupdater - keep an installed application up to date
//!
//! A small agent that runs next to a desktop or background application, polls a
//! release manifest, and replaces the application's files when a different
//! version is published. Running executables often cannot be overwritten, so the
//! actual replacement is done by a detached helper script after the updater
//! process has exited.
//!
//! # Architecture Overview
//!
//! One check cycle is a strictly sequential pipeline:
//!
//! 1. **Manifest fetch** - one GET of the manifest URL, parsed as JSON or plain text
//! 2. **Version gate** - exact string comparison with the installed version
//! 3. **Download** - stream the artifact into a fresh staging area
//! 4. **Integrity check** - chunked SHA-256 against the manifest's digest
//! 5. **Deployment** - extract, write the helper script, launch it detached, exit
//!
//! Any failure abandons the cycle; it is logged once and the next cycle (or
//! process exit in single-shot mode) is the only recovery.
//!
//! # Core Modules
//!
//! - [`cli`] - command-line surface, logging setup, process exit
//! - [`config`] - layered settings resolved into an immutable `UpdateConfig`
//! - [`core`] - error taxonomy and user-facing error formatting
//! - [`updater`] - the pipeline stages, the cycle boundary and the polling driver
//! - [`utils`] - download progress reporting
//!
//! # Manifest Format
//!
//! ```json
//! {"version": "1.2.0", "url": "https://example.com/app_v1.2.0.zip", "sha256": "9f86d0..."}
//! ```
//!
//! or a plain-text body holding only the version. Without `url`, the artifact is
//! expected at `<manifest directory>/releases/<prefix>_v<version>.zip`.
//!
//! # Persisted State
//!
//! None. The only files left behind are the deployed application files and, after
//! a failed cycle, the staging area of that attempt.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod updater;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
