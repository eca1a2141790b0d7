use std::fs;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ytvm_common::{Config, TargetDescriptor, YtvmError};
use ytvm_core::{InstallOutcome, InstallState, Installer};

struct Fixture {
    _root: TempDir,
    config: Config,
}

impl Fixture {
    fn new(release_base_url: &str) -> Self {
        let root = TempDir::new().unwrap();
        let mut config = Config::with_install_root(&root.path().join("vendor"), "1.2.0");
        config.release_base_url = release_base_url.to_string();
        config.staging_root = root.path().join("staging");
        fs::create_dir_all(&config.staging_root).unwrap();
        Self {
            _root: root,
            config,
        }
    }

    fn staging_is_empty(&self) -> bool {
        fs::read_dir(&self.config.staging_root).unwrap().next().is_none()
    }
}

fn linux() -> TargetDescriptor {
    TargetDescriptor::resolve("linux", "x86_64").unwrap()
}

fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn never() -> std::future::Pending<String> {
    std::future::pending()
}

#[tokio::test]
async fn cached_binary_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();
    let binary = installer.paths().binary_path.clone();
    fs::create_dir_all(binary.parent().unwrap()).unwrap();
    fs::write(&binary, b"already here").unwrap();

    assert!(installer.is_installed());
    let outcome = installer.ensure_installed_until(never()).await.unwrap();

    assert_eq!(outcome, InstallOutcome::Cached(binary.clone()));
    assert_eq!(outcome.state(), InstallState::Cached);
    assert_eq!(fs::read(&binary).unwrap(), b"already here");
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn installs_from_nested_tar_gz() {
    let server = MockServer::start().await;
    let archive = tar_gz_bytes(&[
        ("dist/README.md", b"docs"),
        ("dist/linux_amd64/yt-vod-manager", b"#!/bin/sh\nexit 0\n"),
    ]);
    Mock::given(method("GET"))
        .and(path("/v1.2.0/yt-vod-manager_v1.2.0_linux_amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();
    assert!(!installer.is_installed());

    let outcome = installer.ensure_installed_until(never()).await.unwrap();

    let binary = installer.paths().binary_path.clone();
    assert_eq!(outcome, InstallOutcome::Installed(binary.clone()));
    assert!(binary.ends_with("vendor/linux-amd64/yt-vod-manager"));
    assert_eq!(fs::read(&binary).unwrap(), b"#!/bin/sh\nexit 0\n");
    assert!(fixture.staging_is_empty());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    // A second run is served from the cache.
    let again = installer.ensure_installed_until(never()).await.unwrap();
    assert_eq!(again, InstallOutcome::Cached(binary));
}

#[tokio::test]
async fn installs_windows_zip_after_redirect() {
    let server = MockServer::start().await;
    let archive = zip_bytes(&[("yt-vod-manager.exe", b"MZ")]);
    Mock::given(method("GET"))
        .and(path("/v1.2.0/yt-vod-manager_v1.2.0_windows_amd64.zip"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/objects/42"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/objects/42"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let windows = TargetDescriptor::resolve("windows", "x86_64").unwrap();
    let installer = Installer::new(&fixture.config, windows).unwrap();

    let outcome = installer.ensure_installed_until(never()).await.unwrap();

    assert!(outcome.binary_path().ends_with("windows-amd64/yt-vod-manager.exe"));
    assert_eq!(fs::read(outcome.binary_path()).unwrap(), b"MZ");
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn download_failure_cleans_staging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();

    let err = installer.ensure_installed_until(never()).await.unwrap_err();

    assert!(matches!(err, YtvmError::DownloadError(..)), "{err:?}");
    assert_eq!(err.exit_code(), 1);
    assert!(!installer.is_installed());
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn archive_without_binary_is_binary_not_found() {
    let server = MockServer::start().await;
    let archive = tar_gz_bytes(&[("dist/yt-vod-manager-helper", b"nope")]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();

    let err = installer.ensure_installed_until(never()).await.unwrap_err();

    match err {
        YtvmError::BinaryNotFound { name, asset } => {
            assert_eq!(name, "yt-vod-manager");
            assert_eq!(asset, "yt-vod-manager_v1.2.0_linux_amd64.tar.gz");
        }
        other => panic!("expected BinaryNotFound, got {other:?}"),
    }
    assert!(!installer.is_installed());
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn corrupt_archive_cleans_staging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"garbage".to_vec()))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();

    let err = installer.ensure_installed_until(never()).await.unwrap_err();

    assert!(matches!(err, YtvmError::ExtractionError(_)), "{err:?}");
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn interrupt_aborts_and_cleans_staging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();

    let interrupt = async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        "SIGTERM".to_string()
    };
    let err = installer.ensure_installed_until(interrupt).await.unwrap_err();

    assert!(matches!(&err, YtvmError::Interrupted(s) if s == "SIGTERM"), "{err:?}");
    assert_eq!(err.exit_code(), 143);
    assert!(fixture.staging_is_empty());
    assert!(!installer.is_installed());
}

#[tokio::test]
async fn interrupt_during_extraction_cleans_staging() {
    let server = MockServer::start().await;
    let names: Vec<String> = (0..4000).map(|i| format!("dist/data/file-{i:04}")).collect();
    let mut entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), &b"x"[..])).collect();
    entries.push(("dist/yt-vod-manager", &b"binary"[..]));
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tar_gz_bytes(&entries)))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let installer = Installer::new(&fixture.config, linux()).unwrap();

    // Fires as soon as any staging directory has an extraction dir.
    let staging_root = fixture.config.staging_root.clone();
    let interrupt = async move {
        loop {
            let extracting = fs::read_dir(&staging_root)
                .unwrap()
                .filter_map(|e| e.ok())
                .any(|e| e.path().join("extracted").exists());
            if extracting {
                return "SIGINT".to_string();
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    };
    let err = installer.ensure_installed_until(interrupt).await.unwrap_err();

    assert!(matches!(&err, YtvmError::Interrupted(s) if s == "SIGINT"), "{err:?}");
    assert!(fixture.staging_is_empty());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(fixture.staging_is_empty());
    assert!(!installer.is_installed());
}

#[tokio::test]
async fn concurrent_first_runs_converge() {
    let server = MockServer::start().await;
    let archive = tar_gz_bytes(&[("yt-vod-manager", b"binary")]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server.uri());
    let a = Installer::new(&fixture.config, linux()).unwrap();
    let b = Installer::new(&fixture.config, linux()).unwrap();

    let (ra, rb) = tokio::join!(
        a.ensure_installed_until(never()),
        b.ensure_installed_until(never())
    );

    let binary = a.paths().binary_path.clone();
    assert_eq!(ra.unwrap().binary_path(), binary.as_path());
    assert_eq!(rb.unwrap().binary_path(), binary.as_path());
    assert_eq!(fs::read(&binary).unwrap(), b"binary");
    let install_dir = binary.parent().unwrap();
    assert_eq!(fs::read_dir(install_dir).unwrap().count(), 1);
    assert!(fixture.staging_is_empty());
}
