//! Check cycles run against a mock release host.

use std::sync::Arc;
use std::time::Duration;

use autoupdater_cli::config::PollInterval;
use autoupdater_cli::core::UpdateError;
use autoupdater_cli::test_utils::{
    ManifestFixture, RecordingLauncher, TestInstall, ZipFixture, init_test_logging,
};
use autoupdater_cli::updater::driver::PollingDriver;
use autoupdater_cli::updater::helper_script::ScriptFlavor;
use autoupdater_cli::updater::verification::{SkipReason, Verification};
use autoupdater_cli::updater::{CycleOutcome, UpdateAgent};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST_PATH: &str = "/updates/latest.json";
const FALLBACK_PATH: &str = "/updates/releases/app_v1.2.0.zip";

fn manifest_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), MANIFEST_PATH)
}

async fn mount_manifest(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(server)
        .await;
}

async fn mount_artifact(server: &MockServer, at: &str, release: &ZipFixture) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(release.bytes().to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_new_version_is_downloaded_verified_and_handed_to_helper() {
    init_test_logging(None);
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &release.sha256())).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone())
        .unwrap()
        .with_script_flavor(ScriptFlavor::Posix);

    let outcome = agent.check_once().await.unwrap();
    let CycleOutcome::Deployed(update) = outcome else {
        panic!("expected a deployment, got {outcome:?}");
    };

    assert_eq!(update.version, "1.2.0");
    assert_eq!(update.download_url, format!("{}{}", server.uri(), FALLBACK_PATH));
    assert_eq!(
        update.verification,
        Verification::Verified {
            digest: release.sha256()
        }
    );

    let deployment = &update.deployment;
    assert!(deployment.staging.root().starts_with(install.staging_root()));
    assert_eq!(
        std::fs::read_to_string(deployment.extracted_dir.join("app.bin")).unwrap(),
        "app 1.2.0"
    );
    assert_eq!(
        std::fs::read_to_string(deployment.extracted_dir.join("data/version.txt")).unwrap(),
        "1.2.0"
    );

    let launched = launcher.launched_paths();
    assert_eq!(launched, vec![deployment.script.path().to_path_buf()]);
    assert!(deployment.script.path().is_file());

    let script = deployment.script.contents();
    assert!(script.contains(&deployment.staging.root().display().to_string()));
    assert!(script.contains(&install.target_dir().display().to_string()));

    // The helper does the replacement; the application is untouched so far.
    assert_eq!(
        std::fs::read_to_string(install.target_dir().join("app.bin")).unwrap(),
        "app 1.1.0"
    );
}

#[tokio::test]
async fn test_checksum_mismatch_abandons_cycle_and_keeps_staging() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();
    let wrong = "0".repeat(64);

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &wrong)).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let outcome = agent.run_cycle().await;
    match outcome {
        CycleOutcome::Abandoned(UpdateError::Integrity { expected, actual, .. }) => {
            assert_eq!(expected, wrong);
            assert_eq!(actual, release.sha256());
        }
        other => panic!("expected an integrity failure, got {other:?}"),
    }

    assert!(launcher.launched().is_empty());
    assert_eq!(
        std::fs::read_to_string(install.target_dir().join("app.bin")).unwrap(),
        "app 1.1.0"
    );

    let areas = install.staging_areas().unwrap();
    assert_eq!(areas.len(), 1);
    assert!(areas[0].join("update.zip").is_file());
    assert!(!areas[0].join("extracted").exists());
}

#[tokio::test]
async fn test_skip_verification_deploys_without_digest() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &"0".repeat(64))).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install
        .config("1.1.0", &manifest_url(&server))
        .unwrap()
        .with_skip_verification(true);
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let CycleOutcome::Deployed(update) = agent.run_cycle().await else {
        panic!("expected a deployment");
    };
    assert_eq!(
        update.verification,
        Verification::Skipped {
            reason: SkipReason::Disabled
        }
    );
    assert_eq!(launcher.launched().len(), 1);
}

#[tokio::test]
async fn test_manifest_without_digest_skips_verification() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    let artifact_url = format!("{}/artifacts/custom-build.zip", server.uri());
    mount_manifest(&server, ManifestFixture::json_with_url("1.2.0", &artifact_url, None)).await;
    mount_artifact(&server, "/artifacts/custom-build.zip", &release).await;
    Mock::given(path(FALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let CycleOutcome::Deployed(update) = agent.run_cycle().await else {
        panic!("expected a deployment");
    };
    assert_eq!(update.download_url, artifact_url);
    assert_eq!(
        update.verification,
        Verification::Skipped {
            reason: SkipReason::NoExpectedHash
        }
    );
}

#[tokio::test]
async fn test_same_version_stops_before_download() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.1.0", &"0".repeat(64))).await;
    Mock::given(path(FALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    match agent.run_cycle().await {
        CycleOutcome::UpToDate { version } => assert_eq!(version, "1.1.0"),
        other => panic!("expected up to date, got {other:?}"),
    }
    assert!(launcher.launched().is_empty());
    assert!(install.staging_areas().unwrap().is_empty());
}

#[tokio::test]
async fn test_older_remote_version_is_still_installed() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.0.0").unwrap();

    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(ManifestFixture::text("1.0.0")))
        .mount(&server)
        .await;
    mount_artifact(&server, "/updates/releases/app_v1.0.0.zip", &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let CycleOutcome::Deployed(update) = agent.run_cycle().await else {
        panic!("expected a deployment of the rolled-back version");
    };
    assert_eq!(update.version, "1.0.0");
    assert_eq!(
        update.verification,
        Verification::Skipped {
            reason: SkipReason::NoExpectedHash
        }
    );
}

#[tokio::test]
async fn test_missing_artifact_is_a_download_failure() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &"0".repeat(64))).await;
    Mock::given(path(FALLBACK_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    match agent.run_cycle().await {
        CycleOutcome::Abandoned(UpdateError::Download { url, reason }) => {
            assert!(url.ends_with(FALLBACK_PATH));
            assert!(reason.contains("404"), "reason: {reason}");
        }
        other => panic!("expected a download failure, got {other:?}"),
    }
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn test_manifest_without_version_is_rejected() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    mount_manifest(&server, r#"{"url": "https://example.com/app.zip"}"#.to_string()).await;

    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, Arc::new(RecordingLauncher::new())).unwrap();

    let err = agent.check_once().await.unwrap_err();
    assert!(matches!(err, UpdateError::Manifest { .. }), "got {err:?}");
    assert_eq!(err.stage(), "manifest");
}

#[tokio::test]
async fn test_unreachable_manifest_is_a_fetch_failure() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    Mock::given(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, Arc::new(RecordingLauncher::new())).unwrap();

    let err = agent.check_once().await.unwrap_err();
    assert!(matches!(err, UpdateError::Fetch { .. }), "got {err:?}");
    assert!(install.staging_areas().unwrap().is_empty());
}

#[tokio::test]
async fn test_archive_escaping_extraction_dir_is_rejected() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::builder()
        .file("app.bin", "app 1.2.0")
        .file("../evil.txt", "owned")
        .build()
        .unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &release.sha256())).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let outcome = agent.run_cycle().await;
    assert!(
        matches!(outcome, CycleOutcome::Abandoned(UpdateError::Extraction { .. })),
        "got {outcome:?}"
    );
    assert!(launcher.launched().is_empty());

    let areas = install.staging_areas().unwrap();
    assert_eq!(areas.len(), 1);
    assert!(!areas[0].join("evil.txt").exists());
    assert!(!install.staging_root().join("evil.txt").exists());
}

#[tokio::test]
async fn test_launch_failure_is_a_deployment_failure() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &release.sha256())).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, Arc::new(RecordingLauncher::failing())).unwrap();

    let outcome = agent.run_cycle().await;
    assert!(
        matches!(outcome, CycleOutcome::Abandoned(UpdateError::Deployment { .. })),
        "got {outcome:?}"
    );
    assert!(!outcome.requires_handoff());
}

#[tokio::test]
async fn test_batch_helper_is_written_with_crlf_line_endings() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &release.sha256())).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install
        .config("1.1.0", &manifest_url(&server))
        .unwrap()
        .with_restart_command(Some("app.exe --background".to_string()));
    let agent = UpdateAgent::new(config, launcher.clone())
        .unwrap()
        .with_script_flavor(ScriptFlavor::Batch);

    let CycleOutcome::Deployed(update) = agent.run_cycle().await else {
        panic!("expected a deployment");
    };
    let script = &update.deployment.script;
    assert_eq!(script.path().file_name().unwrap(), "update.bat");

    let written = std::fs::read_to_string(script.path()).unwrap();
    assert!(written.contains("\r\n"));
    assert!(written.contains("xcopy"));
    assert!(written.contains("app.exe --background"));
}

#[tokio::test]
async fn test_continuous_driver_polls_until_an_update_is_deployed() {
    init_test_logging(None);
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    // First poll: nothing new. Every later poll: 1.2.0.
    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ManifestFixture::json_without_url("1.1.0", &release.sha256()), "application/json"),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &release.sha256())).await;
    mount_artifact(&server, FALLBACK_PATH, &release).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install
        .config("1.1.0", &manifest_url(&server))
        .unwrap()
        .with_run_once(false)
        .with_poll_interval(PollInterval::from_secs(1));
    let driver = PollingDriver::new(UpdateAgent::new(config, launcher.clone()).unwrap());
    assert_eq!(driver.interval(), Duration::from_secs(5));

    let outcome = tokio::time::timeout(Duration::from_secs(30), driver.run())
        .await
        .expect("driver should deploy within two cycles");

    assert!(outcome.requires_handoff());
    assert_eq!(launcher.launched().len(), 1);

    let requests = server.received_requests().await.unwrap();
    let manifest_polls = requests.iter().filter(|r| r.url.path() == MANIFEST_PATH).count();
    assert_eq!(manifest_polls, 2);
}

#[tokio::test]
async fn test_single_shot_driver_returns_after_a_failed_cycle() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    Mock::given(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let driver =
        PollingDriver::new(UpdateAgent::new(config, Arc::new(RecordingLauncher::new())).unwrap());

    let outcome = driver.run().await;
    assert!(matches!(outcome, CycleOutcome::Abandoned(UpdateError::Fetch { .. })));
}

/// Serve one artifact response that announces `declared_len` bytes but only
/// sends `body`, then keeps the connection open for `hold` before closing it.
async fn serve_partial_artifact(declared_len: usize, body: &'static [u8], hold: Duration) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {declared_len}\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(hold).await;
    });
    format!("http://{addr}/releases/app_v1.2.0.zip")
}

#[tokio::test]
async fn test_slow_manifest_is_abandoned_after_the_manifest_timeout() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ManifestFixture::text("1.2.0"))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install
        .config("1.1.0", &manifest_url(&server))
        .unwrap()
        .with_manifest_timeout(Duration::from_secs(1));
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), agent.run_cycle())
        .await
        .expect("the manifest timeout should end the cycle");

    let CycleOutcome::Abandoned(UpdateError::Fetch { reason, .. }) = outcome else {
        panic!("expected an abandoned fetch, got {outcome:?}");
    };
    assert!(reason.contains("timed out"), "{reason}");
    assert!(install.staging_areas().unwrap().is_empty());
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn test_artifact_without_response_is_abandoned_and_staging_kept() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();
    let release = ZipFixture::app_release("1.2.0").unwrap();

    mount_manifest(&server, ManifestFixture::json_without_url("1.2.0", &release.sha256())).await;
    Mock::given(method("GET"))
        .and(path(FALLBACK_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(release.bytes().to_vec())
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install
        .config("1.1.0", &manifest_url(&server))
        .unwrap()
        .with_download_timeout(Duration::from_secs(1));
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), agent.run_cycle())
        .await
        .expect("the download timeout should end the cycle");

    let CycleOutcome::Abandoned(UpdateError::Download { reason, .. }) = outcome else {
        panic!("expected an abandoned download, got {outcome:?}");
    };
    assert!(reason.contains("no response within"), "{reason}");
    assert_eq!(install.staging_areas().unwrap().len(), 1);
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn test_stalled_artifact_body_hits_the_idle_timeout() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    let artifact_url = serve_partial_artifact(1024, b"PK\x03\x04partial", Duration::from_secs(5)).await;
    mount_manifest(&server, ManifestFixture::json_with_url("1.2.0", &artifact_url, None)).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install
        .config("1.1.0", &manifest_url(&server))
        .unwrap()
        .with_download_timeout(Duration::from_secs(1));
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), agent.run_cycle())
        .await
        .expect("the idle timeout should end the cycle");

    let CycleOutcome::Abandoned(UpdateError::Download { reason, .. }) = outcome else {
        panic!("expected an abandoned download, got {outcome:?}");
    };
    assert!(reason.contains("no data received"), "{reason}");

    let areas = install.staging_areas().unwrap();
    assert_eq!(areas.len(), 1);
    assert!(areas[0].join("update.zip").exists());
    assert!(!areas[0].join("extracted").exists());
}

#[tokio::test]
async fn test_truncated_artifact_body_is_abandoned() {
    let server = MockServer::start().await;
    let install = TestInstall::new().unwrap();

    let artifact_url = serve_partial_artifact(1024, b"PK\x03\x04partial", Duration::ZERO).await;
    mount_manifest(&server, ManifestFixture::json_with_url("1.2.0", &artifact_url, None)).await;

    let launcher = Arc::new(RecordingLauncher::new());
    let config = install.config("1.1.0", &manifest_url(&server)).unwrap();
    let agent = UpdateAgent::new(config, launcher.clone()).unwrap();

    let outcome = agent.run_cycle().await;

    assert!(
        matches!(outcome, CycleOutcome::Abandoned(UpdateError::Download { .. })),
        "expected an abandoned download, got {outcome:?}"
    );
    assert_eq!(install.staging_areas().unwrap().len(), 1);
    assert!(launcher.launched().is_empty());
}
