//! Decides whether a remote version warrants an update.
//!
//! The gate is exact string equality. Any difference, including a remote version
//! that would sort lower than the installed one, counts as an update. This lets
//! an operator force a rollback by publishing an older version string.

/// `true` unless `remote` and `current` are byte-for-byte equal.
///
/// ```rust
/// use autoupdater_cli::updater::version_gate::update_available;
///
/// assert!(!update_available("1.1.0", "1.1.0"));
/// assert!(update_available("1.1.0", "1.2.0"));
/// assert!(update_available("1.1.0", "1.0.9"));
/// ```
#[must_use]
pub fn update_available(current: &str, remote: &str) -> bool {
    remote != current
}
