//! Fixtures for release artifacts and manifests.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// An in-memory zip archive standing in for a release artifact.
#[derive(Debug, Clone)]
pub struct ZipFixture {
    bytes: Vec<u8>,
}

impl ZipFixture {
    /// Start an archive with no entries.
    #[must_use]
    pub fn builder() -> ZipFixtureBuilder {
        ZipFixtureBuilder::default()
    }

    /// A small application release: one binary and one nested data file.
    pub fn app_release(version: &str) -> Result<Self> {
        Self::builder()
            .file("app.bin", format!("app {version}"))
            .dir("data/")
            .file("data/version.txt", version)
            .build()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex SHA-256 of the archive bytes.
    #[must_use]
    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes)
            .with_context(|| format!("Failed to write zip fixture to {}", path.display()))?;
        Ok(path)
    }
}

/// Builder for [`ZipFixture`]. Entry names are written as given, unchecked.
#[derive(Debug, Clone, Default)]
pub struct ZipFixtureBuilder {
    entries: Vec<(String, Option<Vec<u8>>)>,
}

impl ZipFixtureBuilder {
    #[must_use]
    pub fn file(mut self, name: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        self.entries.push((name.into(), Some(contents.as_ref().to_vec())));
        self
    }

    #[must_use]
    pub fn dir(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), None));
        self
    }

    pub fn build(self) -> Result<ZipFixture> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        for (name, contents) in self.entries {
            match contents {
                Some(data) => {
                    writer
                        .start_file(name.as_str(), options)
                        .with_context(|| format!("Failed to start zip entry {name}"))?;
                    writer.write_all(&data)?;
                }
                None => {
                    writer
                        .add_directory(name.as_str(), options)
                        .with_context(|| format!("Failed to add zip directory {name}"))?;
                }
            }
        }

        let cursor = writer.finish().context("Failed to finish zip fixture")?;
        Ok(ZipFixture {
            bytes: cursor.into_inner(),
        })
    }
}

/// Manifest bodies in both supported formats.
pub struct ManifestFixture;

impl ManifestFixture {
    /// JSON manifest with only a version and digest, so the fallback URL is used.
    #[must_use]
    pub fn json_without_url(version: &str, sha256: &str) -> String {
        serde_json::json!({ "version": version, "sha256": sha256 }).to_string()
    }

    /// JSON manifest naming the artifact URL explicitly.
    #[must_use]
    pub fn json_with_url(version: &str, url: &str, sha256: Option<&str>) -> String {
        let mut manifest = serde_json::json!({ "version": version, "url": url });
        if let Some(sha256) = sha256 {
            manifest["sha256"] = serde_json::Value::from(sha256);
        }
        manifest.to_string()
    }

    /// Plain-text manifest.
    #[must_use]
    pub fn text(version: &str) -> String {
        format!("{version}\n")
    }
}
