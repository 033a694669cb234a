//! Error handling for the updater
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** so the polling driver can tell a per-cycle
//!    failure from a startup failure
//! 2. **User-friendly messages** with actionable suggestions for operators
//!
//! # Architecture
//!
//! - [`UpdateError`] - one variant per failure category of a check cycle, plus
//!   the startup categories
//! - [`ErrorContext`] - wrapper adding details and a suggestion for CLI display
//!
//! # Error Categories
//!
//! | Variant | Stage | Raised when |
//! |---|---|---|
//! | [`UpdateError::Fetch`] | fetch | manifest unreachable, non-success status, unparseable body |
//! | [`UpdateError::Manifest`] | manifest | manifest parsed but has no `version` |
//! | [`UpdateError::Download`] | download | artifact unreachable or not writable |
//! | [`UpdateError::Integrity`] | integrity | digest mismatch |
//! | [`UpdateError::Extraction`] | extraction | archive unreadable or path traversal |
//! | [`UpdateError::Deployment`] | deployment | helper script generation or launch failed |
//! | [`UpdateError::TargetDirMissing`] | startup | target directory does not exist |
//! | [`UpdateError::Config`] | startup | invalid or missing setting |
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdater_cli::core::{UpdateError, user_friendly_error};
//!
//! let error = UpdateError::TargetDirMissing {
//!     path: "/opt/app".to_string(),
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display(); // Shows the error with a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for updater operations
///
/// Every failure a check cycle can hit maps to exactly one variant. Variants carry
/// the URL or path involved and a human-readable reason so the single log line
/// written at the cycle boundary is enough to diagnose the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Manifest could not be fetched or its body could not be parsed
    ///
    /// # Fields
    /// - `url`: The manifest URL
    /// - `reason`: Transport error, HTTP status, or parse failure
    #[error("Failed to fetch manifest from {url}: {reason}")]
    Fetch {
        /// The manifest URL
        url: String,
        /// Why the fetch failed
        reason: String,
    },

    /// Manifest was parsed but lacks a usable version
    #[error("Manifest at {url} is invalid: {reason}")]
    Manifest {
        /// The manifest URL
        url: String,
        /// What is missing
        reason: String,
    },

    /// Artifact download failed
    ///
    /// Covers transport failures, non-success statuses and local write failures.
    /// The staging area is left behind for inspection.
    #[error("Failed to download update from {url}: {reason}")]
    Download {
        /// The artifact URL
        url: String,
        /// Why the download failed
        reason: String,
    },

    /// Downloaded artifact does not match the expected digest
    ///
    /// This is the one failure that must always be visible to the operator.
    #[error("Integrity check failed for {path}: expected {expected}, got {actual}")]
    Integrity {
        /// Path to the downloaded artifact
        path: String,
        /// Digest announced by the manifest
        expected: String,
        /// Digest computed from the downloaded file
        actual: String,
    },

    /// Archive could not be read or contains an entry escaping the extraction directory
    #[error("Failed to extract {archive}: {reason}")]
    Extraction {
        /// Path to the archive
        archive: String,
        /// Why extraction failed
        reason: String,
    },

    /// Helper script generation or launch failed
    #[error("Deployment failed: {reason}")]
    Deployment {
        /// Why deployment failed
        reason: String,
    },

    /// Target directory does not exist at startup
    #[error("Target directory does not exist: {path}")]
    TargetDirMissing {
        /// The resolved absolute path
        path: String,
    },

    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Filesystem error outside of a specific pipeline stage
    #[error("I/O error during {operation} on {path}: {reason}")]
    Io {
        /// The operation that failed
        operation: String,
        /// The path involved
        path: String,
        /// The underlying error message
        reason: String,
    },
}

impl UpdateError {
    /// Name of the pipeline stage that produced this error.
    ///
    /// Used as a structured field when the cycle boundary logs the failure.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Manifest { .. } => "manifest",
            Self::Download { .. } => "download",
            Self::Integrity { .. } => "integrity",
            Self::Extraction { .. } => "extraction",
            Self::Deployment { .. } => "deployment",
            Self::TargetDirMissing { .. } | Self::Config { .. } => "startup",
            Self::Io { .. } => "io",
        }
    }

    /// Whether this error can only happen before the first cycle starts.
    #[must_use]
    pub const fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::TargetDirMissing { .. } | Self::Config { .. })
    }

    /// Build an [`UpdateError::Io`] from a [`std::io::Error`].
    pub fn io(operation: &str, path: &std::path::Path, error: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: error.to_string(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// Displayed in the terminal with colors:
/// - Error message: Red and bold
/// - Details: Yellow
/// - Suggestion: Green
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error message
    pub error: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from any displayable error.
    #[must_use]
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`UpdateError`] anywhere in the `anyhow` chain and
/// [`std::io::Error`]; everything else is shown with its full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error);
    }

    for cause in error.chain() {
        if let Some(update_error) = cause.downcast_ref::<UpdateError>() {
            return create_error_context(update_error).with_details(format!("{error:#}"));
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(io_error)
                .with_suggestion("Check that the updater may write to the staging and target directories");
        }
    }

    ErrorContext::new(format!("{error:#}"))
}

fn create_error_context(error: &UpdateError) -> ErrorContext {
    let context = ErrorContext::new(error);
    match error {
        UpdateError::TargetDirMissing { .. } => context
            .with_details("The target directory is resolved to an absolute path before any network activity")
            .with_suggestion("Create the directory or pass the installed application's directory with --target-dir"),
        UpdateError::Config { .. } => context
            .with_suggestion("Run with --help to see the required settings, or check the TOML config file"),
        UpdateError::Fetch { .. } => context
            .with_suggestion("Check the manifest URL and network connectivity"),
        UpdateError::Manifest { .. } => context
            .with_details("A manifest is either a JSON object with a \"version\" field or a plain-text version string")
            .with_suggestion("Publish a non-empty version in the manifest"),
        UpdateError::Download { .. } => context
            .with_suggestion("Check that the release artifact exists at the URL and that the staging root is writable"),
        UpdateError::Integrity { .. } => context
            .with_details("The downloaded artifact was left in place and the application was not touched")
            .with_suggestion("Republish the artifact or correct the sha256 in the manifest"),
        UpdateError::Extraction { .. } => context
            .with_suggestion("Check that the artifact is a valid zip archive with relative entry paths"),
        UpdateError::Deployment { .. } => context
            .with_suggestion("Check that the helper interpreter is available and the staging root is writable"),
        UpdateError::Io { .. } => context,
    }
}
