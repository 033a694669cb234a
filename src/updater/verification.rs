use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::constants::HASH_CHUNK_SIZE;
use crate::core::UpdateError;

/// Result of an integrity check that allowed deployment to proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The computed digest matched the expected one.
    Verified {
        /// Lowercase hex digest of the artifact
        digest: String,
    },
    /// No check was performed.
    Skipped {
        /// Why the check was bypassed
        reason: SkipReason,
    },
}

/// Why verification was bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The operator disabled verification.
    Disabled,
    /// The manifest did not announce a digest.
    NoExpectedHash,
}

/// Verifies a downloaded artifact against the SHA-256 digest from the manifest.
///
/// Verification is an opt-out trust reduction: when the operator passes
/// `--insecure`, or the manifest carries no `sha256`, the artifact is deployed
/// unchecked and a warning is logged.
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdater_cli::updater::verification::ChecksumVerifier;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), autoupdater_cli::core::UpdateError> {
/// let verifier = ChecksumVerifier::new(false);
/// verifier.verify(Path::new("/tmp/autoupdate_x/update.zip"), Some("9f86d081...")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ChecksumVerifier {
    skip_verification: bool,
}

impl ChecksumVerifier {
    #[must_use]
    pub const fn new(skip_verification: bool) -> Self {
        Self { skip_verification }
    }

    /// Compute the lowercase hex SHA-256 of a file, reading it in fixed-size chunks.
    pub async fn compute_sha256(file_path: &Path) -> Result<String, UpdateError> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = tokio::fs::File::open(file_path)
            .await
            .map_err(|e| UpdateError::io("open artifact", file_path, &e))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|e| UpdateError::io("read artifact", file_path, &e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Check `file_path` against `expected` unless verification is bypassed.
    ///
    /// `expected` is compared case-insensitively and may carry a `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Integrity`] naming both digests on mismatch. The artifact is
    /// left where it is.
    pub async fn verify(
        &self,
        file_path: &Path,
        expected: Option<&str>,
    ) -> Result<Verification, UpdateError> {
        if self.skip_verification {
            warn!("Integrity verification disabled, deploying {} unchecked", file_path.display());
            return Ok(Verification::Skipped {
                reason: SkipReason::Disabled,
            });
        }

        let Some(expected) = expected else {
            warn!("Manifest has no sha256, deploying {} unchecked", file_path.display());
            return Ok(Verification::Skipped {
                reason: SkipReason::NoExpectedHash,
            });
        };

        let expected = normalize_digest(expected);
        let actual = Self::compute_sha256(file_path).await?;

        if !actual.eq_ignore_ascii_case(expected) {
            return Err(UpdateError::Integrity {
                path: file_path.display().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }

        info!("Checksum verification successful");
        Ok(Verification::Verified { digest: actual })
    }
}

fn normalize_digest(expected: &str) -> &str {
    let trimmed = expected.trim();
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("sha256:") => &trimmed[7..],
        _ => trimmed,
    }
}
