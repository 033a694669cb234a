//! Core types for the updater
//!
//! This module holds the error taxonomy shared by every pipeline stage and
//! the helpers that turn errors into operator-facing messages.
//!
//! # Modules
//!
//! ## `error` - Error Handling
//!
//! - [`UpdateError`] - one variant per failure category
//! - [`ErrorContext`] - user-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - convert any error to that format
//!
//! # Error Handling Pattern
//!
//! ```rust
//! use autoupdater_cli::core::{UpdateError, user_friendly_error};
//!
//! fn example_operation() -> anyhow::Result<()> {
//!     Err(UpdateError::Config {
//!         message: "missing --current".to_string(),
//!     }
//!     .into())
//! }
//!
//! if let Err(e) = example_operation() {
//!     let friendly = user_friendly_error(e);
//!     assert!(friendly.suggestion.is_some());
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
