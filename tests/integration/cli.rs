//! Tests of the `autoupdater` binary.

use assert_cmd::Command;
use autoupdater_cli::test_utils::{ManifestFixture, TestInstall};
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn autoupdater() -> Command {
    let mut cmd = Command::cargo_bin("autoupdater").unwrap();
    for var in [
        "RUST_LOG",
        "AUTOUPDATER_CURRENT",
        "AUTOUPDATER_LATEST_URL",
        "AUTOUPDATER_TARGET_DIR",
        "AUTOUPDATER_INTERVAL",
        "AUTOUPDATER_STAGING_ROOT",
        "AUTOUPDATER_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("AUTOUPDATER_NO_PROGRESS", "1");
    cmd
}

#[test]
fn test_help_lists_update_flags() {
    autoupdater()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--current"))
        .stdout(predicate::str::contains("--latest-url"))
        .stdout(predicate::str::contains("--target-dir"))
        .stdout(predicate::str::contains("--restart"))
        .stdout(predicate::str::contains("--interval"))
        .stdout(predicate::str::contains("--once"))
        .stdout(predicate::str::contains("--insecure"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_target_dir_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("not-installed");

    autoupdater()
        .arg("--current")
        .arg("1.0.0")
        .arg("--latest-url")
        .arg(format!("{}/latest.json", server.uri()))
        .arg("--target-dir")
        .arg(&missing)
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Target directory does not exist"))
        .stderr(predicate::str::contains("not-installed"));
}

#[test]
fn test_missing_current_version_fails() {
    let temp = TempDir::new().unwrap();

    autoupdater()
        .arg("--latest-url")
        .arg("https://updates.example.com/latest.json")
        .arg("--target-dir")
        .arg(temp.path())
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--current"));
}

#[test]
fn test_invalid_manifest_url_fails() {
    let temp = TempDir::new().unwrap();

    autoupdater()
        .args(["--current", "1.0.0", "--latest-url", "ftp://updates.example.com/latest"])
        .arg("--target-dir")
        .arg(temp.path())
        .arg("--once")
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_when_up_to_date_exits_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ManifestFixture::text("1.0.0")))
        .expect(1)
        .mount(&server)
        .await;

    let install = TestInstall::new().unwrap();

    autoupdater()
        .arg("--current")
        .arg("1.0.0")
        .arg("--latest-url")
        .arg(format!("{}/latest.json", server.uri()))
        .arg("--target-dir")
        .arg(install.target_dir())
        .arg("--staging-root")
        .arg(install.staging_root())
        .arg("--once")
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("Already up to date"));

    assert!(install.staging_areas().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_exits_zero_after_failed_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let install = TestInstall::new().unwrap();

    autoupdater()
        .arg("--current")
        .arg("1.0.0")
        .arg("--latest-url")
        .arg(format!("{}/latest.json", server.uri()))
        .arg("--target-dir")
        .arg(install.target_dir())
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("fetch"));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_deployment_exits_zero_and_helper_replaces_files() {
    use autoupdater_cli::test_utils::ZipFixture;
    use std::time::{Duration, Instant};

    let server = MockServer::start().await;
    let release = ZipFixture::app_release("1.2.0").unwrap();
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ManifestFixture::json_without_url("1.2.0", &release.sha256()), "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/releases/app_v1.2.0.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(release.bytes().to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let install = TestInstall::new().unwrap();

    autoupdater()
        .arg("--current")
        .arg("1.1.0")
        .arg("--latest-url")
        .arg(format!("{}/latest.json", server.uri()))
        .arg("--target-dir")
        .arg(install.target_dir())
        .arg("--staging-root")
        .arg(install.staging_root())
        .args(["--fallback-scheme", "http", "--once"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Exiting so the update helper"));

    let app = install.target_dir().join("app.bin");
    let deadline = Instant::now() + Duration::from_secs(15);
    while std::fs::read_to_string(&app).unwrap_or_default() != "app 1.2.0"
        || !install.staging_areas().unwrap().is_empty()
    {
        assert!(Instant::now() < deadline, "helper did not replace the files in time");
        std::thread::sleep(Duration::from_millis(100));
    }
    assert_eq!(
        std::fs::read_to_string(install.target_dir().join("data/version.txt")).unwrap(),
        "1.2.0"
    );
}
