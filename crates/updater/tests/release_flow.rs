//! Check and apply against a mock release server, through the HTTP client.

use node_updater::{
    GithubReleaseClient, Platform, TrustAnchor, UpdatePlan, UpdateTarget, Updater, UpdaterConfig,
    UpdaterError, Url, RELEASE_MEDIA_TYPE,
};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::fs;
use std::io::{Cursor, Write};
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const PRIVATE_KEY: &str = include_str!("fixtures/test-signing.key.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/test-signing.pub.pem");

fn sign(payload: &[u8]) -> Vec<u8> {
    let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY).unwrap();
    SigningKey::<Sha256>::new(key).sign(payload).to_vec()
}

fn archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn release_server(archive_bytes: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    let index = serde_json::json!({
        "tag_name": "v1.3.0",
        "assets": [
            {
                "name": "Node-v1.3.0-darwin-arm64.zip",
                "browser_download_url": format!("{}/download/darwin.zip", server.uri()),
            },
            {
                "name": "Node-v1.3.0-linux-amd64.zip",
                "browser_download_url": format!("{}/download/linux.zip", server.uri()),
            },
        ],
    });
    Mock::given(method("GET"))
        .and(path("/repos/node/releases/latest"))
        .and(header("accept", RELEASE_MEDIA_TYPE))
        .respond_with(ResponseTemplate::new(200).set_body_json(index))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/linux.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive_bytes))
        .mount(&server)
        .await;
    server
}

fn updater(server: &MockServer, install_dir: &std::path::Path) -> Updater<GithubReleaseClient> {
    let url = Url::parse(&format!("{}/repos/node/releases/latest", server.uri())).unwrap();
    let source = GithubReleaseClient::builder().release_url(url).build().unwrap();
    let config = UpdaterConfig::new("1.2.0", install_dir)
        .with_platform(Platform::new("linux", "amd64"))
        .with_plan(UpdatePlan::new([
            UpdateTarget::new("noded"),
            UpdateTarget::new("nodec"),
        ]));
    Updater::new(source, TrustAnchor::from_pem(PUBLIC_KEY).unwrap(), config)
}

#[tokio::test]
async fn release_from_server_is_checked_and_applied() {
    let server = release_server(archive(&[
        ("Node-v1.3.0/noded", b"daemon 1.3.0".to_vec()),
        ("Node-v1.3.0/noded.sig", sign(b"daemon 1.3.0")),
        ("Node-v1.3.0/nodec", b"client 1.3.0".to_vec()),
        ("Node-v1.3.0/nodec.sig", sign(b"client 1.3.0")),
    ]))
    .await;
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("noded"), b"daemon 1.2.0").unwrap();
    fs::write(dir.path().join("nodec"), b"client 1.2.0").unwrap();
    let updater = updater(&server, dir.path());

    let info = updater.check_for_update().await.unwrap();
    assert!(info.available);
    assert_eq!(info.version, "1.3.0");

    let report = updater.apply_latest().await.unwrap();
    let installed: Vec<_> = report.applied.iter().map(|t| t.target.name()).collect();
    assert_eq!(installed, ["noded", "nodec"]);
    assert_eq!(fs::read(dir.path().join("noded")).unwrap(), b"daemon 1.3.0");
    assert_eq!(fs::read(dir.path().join("nodec")).unwrap(), b"client 1.3.0");
}

#[tokio::test]
async fn archive_without_client_signature_changes_nothing() {
    let server = release_server(archive(&[
        ("noded", b"daemon 1.3.0".to_vec()),
        ("noded.sig", sign(b"daemon 1.3.0")),
        ("nodec", b"client 1.3.0".to_vec()),
    ]))
    .await;
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("noded"), b"daemon 1.2.0").unwrap();
    let updater = updater(&server, dir.path());

    let err = updater.apply_latest().await.unwrap_err();
    assert!(matches!(err, UpdaterError::MissingSignature(ref t) if t == "nodec"), "got {err}");
    assert_eq!(fs::read(dir.path().join("noded")).unwrap(), b"daemon 1.2.0");
    assert!(!dir.path().join("nodec").exists());
}
