//! Remote update manifest: fetching and the dual-format grammar.
//!
//! A manifest is served either as a JSON object or as a bare line of text:
//!
//! ```text
//! {"version": "1.2.0", "url": "https://host/app_v1.2.0.zip", "sha256": "9f86d0..."}
//! ```
//!
//! ```text
//! 1.2.0
//! ```
//!
//! The body is parsed as an object when the response declares a JSON content
//! type, or when the trimmed body starts with `{` and ends with `}`. Anything
//! else is a bare version string without URL or digest.
//!
//! Object fields are permissive: a field that is missing, not a string, or blank
//! after trimming is treated as absent. `download_url` and `content_hash` are
//! accepted as aliases of `url` and `sha256`.

use serde_json::{Map, Value};
use tracing::debug;

use super::http::{HttpClient, describe};
use crate::core::UpdateError;

/// Parsed update descriptor for one check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateManifest {
    /// Remote version string, trimmed. Never empty.
    pub version: String,
    /// Explicit artifact URL, when the manifest provides one.
    pub download_url: Option<String>,
    /// Expected hex SHA-256 of the artifact, when the manifest provides one.
    pub content_hash: Option<String>,
}

/// Whether a `Content-Type` header value denotes structured JSON data.
#[must_use]
pub fn is_structured_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("application/json") || content_type.contains("+json")
}

/// Parse a manifest body.
///
/// # Errors
///
/// - [`UpdateError::Fetch`] when the body is meant to be an object but is not valid JSON,
///   or is valid JSON but not an object
/// - [`UpdateError::Manifest`] when no non-empty version can be extracted
///
/// # Examples
///
/// ```rust
/// use autoupdater_cli::updater::manifest::parse_manifest;
///
/// let url = "https://example.com/latest.txt";
/// let manifest = parse_manifest("  1.2.0\n", "text/plain", url).unwrap();
/// assert_eq!(manifest.version, "1.2.0");
/// assert!(manifest.download_url.is_none());
///
/// let manifest = parse_manifest(r#"{"version":"1.2.0","sha256":"ABC"}"#, "", url).unwrap();
/// assert_eq!(manifest.content_hash.as_deref(), Some("ABC"));
/// ```
pub fn parse_manifest(
    body: &str,
    content_type: &str,
    manifest_url: &str,
) -> Result<UpdateManifest, UpdateError> {
    let text = body.trim();
    let looks_like_object = text.starts_with('{') && text.ends_with('}');

    let manifest = if is_structured_content_type(content_type) || looks_like_object {
        let value: Value = serde_json::from_str(text).map_err(|e| UpdateError::Fetch {
            url: manifest_url.to_string(),
            reason: format!("manifest is not valid JSON: {e}"),
        })?;
        let Value::Object(fields) = value else {
            return Err(UpdateError::Fetch {
                url: manifest_url.to_string(),
                reason: "manifest JSON is not an object".to_string(),
            });
        };

        UpdateManifest {
            version: string_field(&fields, &["version"]).unwrap_or_default(),
            download_url: string_field(&fields, &["url", "download_url"]),
            content_hash: string_field(&fields, &["sha256", "content_hash"]),
        }
    } else {
        UpdateManifest {
            version: text.to_string(),
            download_url: None,
            content_hash: None,
        }
    };

    if manifest.version.is_empty() {
        return Err(UpdateError::Manifest {
            url: manifest_url.to_string(),
            reason: "no version found".to_string(),
        });
    }

    Ok(manifest)
}

/// First of `names` that holds a non-blank string, trimmed.
fn string_field(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| fields.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Retrieves and parses the manifest over HTTP.
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: HttpClient,
}

impl ManifestFetcher {
    #[must_use]
    pub const fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Perform one GET of `manifest_url` and parse the response.
    pub async fn fetch(&self, manifest_url: &str) -> Result<UpdateManifest, UpdateError> {
        let response = self.client.get_manifest(manifest_url).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.text().await.map_err(|e| UpdateError::Fetch {
            url: manifest_url.to_string(),
            reason: format!("failed to read body: {}", describe(&e)),
        })?;

        let manifest = parse_manifest(&body, &content_type, manifest_url)?;
        debug!(
            version = %manifest.version,
            url = ?manifest.download_url,
            has_hash = manifest.content_hash.is_some(),
            "Parsed manifest"
        );
        Ok(manifest)
    }
}
