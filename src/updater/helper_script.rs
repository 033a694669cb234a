//! Generation of the detached replace-and-restart helper.
//!
//! The running application cannot overwrite its own files, so the copy is
//! delegated to a small script that outlives this process. Every script does the
//! same steps in the same order:
//!
//! 1. wait a fixed grace period so the updater can exit and release its locks
//! 2. copy the extracted files over the target directory recursively,
//!    reporting (not aborting on) individual failures
//! 3. start the restart command from inside the target directory, if one was given
//! 4. delete the staging area, script included
//!
//! Two flavours exist: a POSIX `sh` script and a Windows batch file. The one
//! matching the build target is used at run time ([`ScriptFlavor::native`]), but
//! both can be rendered anywhere. The restart command is inserted verbatim; the
//! operator is responsible for quoting it for the target shell. Paths are
//! quoted by the renderer.

use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::core::UpdateError;

const POSIX_TEMPLATE: &str = r#"#!/bin/sh
# Generated by autoupdater {{ updater_version }}. Deletes itself when done.
echo "[update] waiting for the updater to exit..."
sleep {{ grace_secs }}
echo "[update] copying new files into "{{ target_dir }}
if ! cp -Rf {{ extracted_source }} {{ target_dir }}; then
    echo "[update] some files could not be copied, check permissions" >&2
fi
{% if restart_command %}echo "[update] starting application..."
(cd {{ target_dir }} && nohup {{ restart_command }} >/dev/null 2>&1 &)
{% endif %}echo "[update] removing staging area"
rm -rf {{ staging_root }}
exit 0
"#;

const BATCH_TEMPLATE: &str = r#"@echo off
rem Generated by autoupdater {{ updater_version }}. Deletes itself when done.
echo [update] waiting for the updater to exit...
ping -n {{ grace_secs + 1 }} 127.0.0.1 >nul
echo [update] copying new files into {{ target_dir }}
xcopy /E /Y /I /H /R /C {{ extracted_source }} {{ target_dir }} >nul
if errorlevel 1 echo [update] some files could not be copied, check permissions.
{% if restart_command %}echo [update] starting application...
cd /d {{ target_dir }}
start "" {{ restart_command }}
{% endif %}echo [update] removing staging area...
cd /d {{ staging_parent }}
rd /s /q {{ staging_root }} 2>nul & exit
"#;

/// Shell dialect of the generated helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// `/bin/sh` script (`update.sh`)
    Posix,
    /// `cmd.exe` batch file (`update.bat`)
    Batch,
}

impl ScriptFlavor {
    /// Flavour for the platform this binary was built for.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(windows) { Self::Batch } else { Self::Posix }
    }

    /// File name of the script inside the staging area.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Posix => "update.sh",
            Self::Batch => "update.bat",
        }
    }

    /// Program that runs the script.
    #[must_use]
    pub const fn interpreter(self) -> &'static str {
        match self {
            Self::Posix => "sh",
            Self::Batch => "cmd",
        }
    }

    const fn template(self) -> &'static str {
        match self {
            Self::Posix => POSIX_TEMPLATE,
            Self::Batch => BATCH_TEMPLATE,
        }
    }

    fn quote(self, path: &Path) -> String {
        let raw = path.display().to_string();
        match self {
            Self::Posix => format!("'{}'", raw.replace('\'', r"'\''")),
            Self::Batch => format!("\"{}\"", raw.replace('%', "%%")),
        }
    }

    /// Copy source naming the contents of `dir` rather than `dir` itself.
    fn contents_of(self, dir: &Path) -> String {
        match self {
            Self::Posix => self.quote(&dir.join(".")),
            Self::Batch => self.quote(&dir.join("*")),
        }
    }
}

/// Inputs of one helper script.
#[derive(Debug, Clone, Copy)]
pub struct HelperParams<'a> {
    /// Staging area root, deleted at the end.
    pub staging_root: &'a Path,
    /// Directory holding the extracted artifact.
    pub extracted_dir: &'a Path,
    /// Absolute application directory.
    pub target_dir: &'a Path,
    /// Command to start after the copy, inserted verbatim.
    pub restart_command: Option<&'a str>,
    /// Seconds to wait before touching `target_dir`.
    pub grace_secs: u64,
}

/// A rendered helper script written into its staging area.
#[derive(Debug, Clone)]
pub struct ReplaceHelperScript {
    flavor: ScriptFlavor,
    path: PathBuf,
    contents: String,
}

impl ReplaceHelperScript {
    /// Render the script text for `flavor`.
    ///
    /// Batch output uses CRLF line endings.
    pub fn render(flavor: ScriptFlavor, params: &HelperParams<'_>) -> Result<String, UpdateError> {
        let staging_parent = params.staging_root.parent().unwrap_or(params.staging_root);

        let mut context = TeraContext::new();
        context.insert("updater_version", env!("CARGO_PKG_VERSION"));
        context.insert("grace_secs", &params.grace_secs);
        context.insert("staging_root", &flavor.quote(params.staging_root));
        context.insert("staging_parent", &flavor.quote(staging_parent));
        context.insert("extracted_source", &flavor.contents_of(params.extracted_dir));
        context.insert("target_dir", &flavor.quote(params.target_dir));
        context.insert(
            "restart_command",
            &params.restart_command.map(str::trim).filter(|c| !c.is_empty()),
        );

        let rendered = Tera::one_off(flavor.template(), &context, false).map_err(|e| {
            UpdateError::Deployment {
                reason: format!("failed to render helper script: {e}"),
            }
        })?;

        Ok(match flavor {
            ScriptFlavor::Posix => rendered,
            ScriptFlavor::Batch => rendered.replace('\n', "\r\n"),
        })
    }

    /// Render the script and write it into the staging root.
    pub fn write(flavor: ScriptFlavor, params: &HelperParams<'_>) -> Result<Self, UpdateError> {
        let contents = Self::render(flavor, params)?;
        let path = params.staging_root.join(flavor.file_name());

        std::fs::write(&path, &contents).map_err(|e| UpdateError::Deployment {
            reason: format!("cannot write helper script {}: {e}", path.display()),
        })?;
        make_executable(&path).map_err(|e| UpdateError::Deployment {
            reason: format!("cannot mark {} executable: {e}", path.display()),
        })?;

        debug!("Wrote helper script {}", path.display());
        Ok(Self {
            flavor,
            path,
            contents,
        })
    }

    #[must_use]
    pub const fn flavor(&self) -> ScriptFlavor {
        self.flavor
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
