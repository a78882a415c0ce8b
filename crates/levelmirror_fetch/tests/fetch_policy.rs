//! Fetch client behaviour against scripted backends.

use levelmirror_fetch::{
    ContentKind, FetchClient, FetchConfig, FetchError, MockBackend, MockLeafProbe, MockReply,
    NoopObserver, OriginPolicy, Payload, RetryPolicy, TransferObserver, TrustState,
};
use levelmirror_model::FailureClass;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LEAF_A: &[u8] = include_bytes!("fixtures/leaf_a.der");
const LEAF_B: &[u8] = include_bytes!("fixtures/leaf_b.der");

fn config() -> FetchConfig {
    FetchConfig::new().with_retry(RetryPolicy::new(3).with_delay(Duration::ZERO))
}

fn client(backend: MockBackend) -> FetchClient<MockBackend> {
    FetchClient::new(
        config(),
        backend,
        MockLeafProbe::new().with_leaf("www.trle.net", LEAF_A),
    )
}

#[test]
fn disallowed_origin_never_reaches_backend() {
    let client = client(MockBackend::new());
    let err = client
        .fetch("https://example.com/levels", ContentKind::Html)
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::PolicyViolation);
    assert_eq!(client.backend().request_count(), 0);
}

#[test]
fn content_type_mismatch_is_integrity_failure() {
    let backend = MockBackend::new();
    backend.on_get(
        "https://trcustoms.org/cert.der",
        MockReply::ok("text/html; charset=utf-8", "<html>error</html>"),
    );
    let client = client(backend);

    let err = client
        .fetch("https://trcustoms.org/cert.der", ContentKind::DerCertificate)
        .unwrap_err();
    assert!(matches!(
        &err,
        FetchError::ContentTypeMismatch { expected: "application/pkix-cert", actual, .. }
            if actual == "text/html"
    ));
    assert_eq!(err.class(), FailureClass::IntegrityFailure);
    // Mismatch is not retried.
    assert_eq!(client.backend().request_count(), 1);
}

#[test]
fn missing_content_type_is_mismatch() {
    let backend = MockBackend::new();
    backend.on_get("https://trcustoms.org/a.png", MockReply::status(200));
    let err = client(backend)
        .fetch_image("https://trcustoms.org/a.png", ContentKind::Png)
        .unwrap_err();
    assert!(matches!(err, FetchError::ContentTypeMismatch { ref actual, .. } if actual == "<none>"));
}

#[test]
fn retries_then_succeeds() {
    let backend = MockBackend::new();
    backend
        .on_get("https://trcustoms.org/api/levels/", MockReply::status(503))
        .on_get("https://trcustoms.org/api/levels/", MockReply::transport("connection reset"))
        .on_get(
            "https://trcustoms.org/api/levels/",
            MockReply::ok("application/json", r#"{"results":[]}"#),
        );
    let client = client(backend);

    let value: serde_json::Value = client
        .fetch_json("https://trcustoms.org/api/levels/")
        .unwrap();
    assert_eq!(value["results"], serde_json::json!([]));
    let stats = client.stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.retries, 2);
}

#[test]
fn retries_exhausted_is_fatal() {
    let backend = MockBackend::new();
    backend.on_get("https://trcustoms.org/api/levels/", MockReply::status(502));
    let client = client(backend);

    let err = client
        .fetch("https://trcustoms.org/api/levels/", ContentKind::Json)
        .unwrap_err();
    assert!(matches!(
        &err,
        FetchError::RetriesExhausted { attempts: 3, last_error, .. } if last_error == "status 502"
    ));
    assert_eq!(err.class(), FailureClass::NetworkFailure);
    assert_eq!(client.backend().request_count(), 3);
}

#[test]
fn requests_carry_legacy_headers() {
    let backend = MockBackend::new();
    backend.on_get("https://trle.net/index.php", MockReply::ok("text/html", "<p>hi</p>"));
    let client = client(backend);
    assert_eq!(client.fetch_html("https://trle.net/index.php").unwrap(), "<p>hi</p>");

    let request = &client.backend().requests()[0];
    assert!(request
        .headers
        .iter()
        .any(|(k, v)| k == "User-Agent" && v == "Wget/1.21.1 (linux-gnu)"));
    assert!(request.headers.iter().any(|(k, v)| k == "Accept" && v == "*/*"));
}

#[test]
fn html_falls_back_to_windows_1252() {
    let backend = MockBackend::new();
    backend.on_get(
        "https://trle.net/levels.php",
        MockReply::ok("text/html", vec![b'C', b'a', b'f', 0xE9]),
    );
    let payload = client(backend)
        .fetch("https://trle.net/levels.php", ContentKind::Html)
        .unwrap();
    match payload {
        Payload::Html { text, charset } => {
            assert_eq!(text, "Café");
            assert_eq!(charset.name(), "windows-1252");
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn flagged_host_is_pinned_before_first_request() {
    let backend = MockBackend::new();
    backend.on_get("https://www.trle.net/pFind.php", MockReply::ok("text/html", "ok"));
    let client = client(backend);
    assert_eq!(client.trust_state("www.trle.net"), TrustState::Untrusted);

    client.fetch_html("https://www.trle.net/pFind.php").unwrap();
    client.fetch_html("https://www.trle.net/pFind.php").unwrap();

    let material = client.trust_material("www.trle.net").unwrap();
    let requests = client.backend().requests();
    assert!(requests
        .iter()
        .all(|r| r.pin.as_ref().map(|m| m.pin) == Some(material.pin)));
    // Unflagged hosts are not pinned.
    assert_eq!(client.trust_state("trle.net"), TrustState::Untrusted);
}

#[test]
fn pinned_host_presenting_other_key_fails() {
    let backend = MockBackend::new();
    backend.on_get("https://www.trle.net/pFind.php", MockReply::ok("text/html", "ok"));
    let client = client(backend);
    client.fetch_html("https://www.trle.net/pFind.php").unwrap();

    client.backend().present_leaf("www.trle.net", LEAF_B);
    let err = client
        .fetch_html("https://www.trle.net/pFind.php")
        .unwrap_err();
    assert!(matches!(err, FetchError::PinMismatch { .. }));
    assert_eq!(err.class(), FailureClass::IntegrityFailure);
    // Still pinned to the first key; no fallback.
    assert_eq!(client.trust_state("www.trle.net").name(), "Pinned");
}

#[test]
fn bootstrap_failure_blocks_request() {
    let backend = MockBackend::new();
    let client = FetchClient::new(config(), backend, MockLeafProbe::new());
    let err = client
        .fetch_html("https://www.trle.net/pFind.php")
        .unwrap_err();
    assert!(matches!(err, FetchError::CertificateUnavailable { .. }));
    assert_eq!(client.backend().request_count(), 0);
}

#[test]
fn head_does_not_follow_redirects() {
    let backend = MockBackend::new();
    backend.on_head(
        "https://www.trle.net/scadm/trle_dl.php?lid=3000",
        MockReply::redirect("https://www.trle.net/levels/3000.zip"),
    );
    let client = client(backend);
    let info = client
        .head("https://www.trle.net/scadm/trle_dl.php?lid=3000")
        .unwrap();
    assert_eq!(info.status, 302);
    assert_eq!(
        info.location.as_deref(),
        Some("https://www.trle.net/levels/3000.zip")
    );
    assert!(!client.backend().requests()[0].follow_redirects);
}

#[derive(Default)]
struct CountingObserver {
    bytes: AtomicU64,
}

impl TransferObserver for CountingObserver {
    fn on_progress(&self, _url: &str, transferred: u64, _total: Option<u64>) {
        self.bytes.store(transferred, Ordering::SeqCst);
    }
}

#[test]
fn zip_download_resolves_redirect_and_digests() {
    let start = "https://www.trle.net/scadm/trle_dl.php?lid=3000";
    let target = "https://www.trle.net/levels/levels/2020/3000-Tomb.zip";
    let backend = MockBackend::new();
    backend.on_head(
        start,
        MockReply::status(200)
            .with_url(target)
            .with_header("Content-Type", "application/zip")
            .with_header("Content-Length", "3"),
    );
    backend.on_get(target, MockReply::ok("application/zip", "abc"));
    let client = client(backend);

    let observer = CountingObserver::default();
    let zip = client.download_zip(start, &observer).unwrap();
    assert_eq!(zip.info.name, "3000-Tomb.zip");
    assert_eq!(zip.info.url, target);
    assert_eq!(zip.info.md5, "900150983cd24fb0d6963f7d28e17f72");
    assert_eq!(zip.info.size_mib, 0.0);
    assert_eq!(zip.bytes, b"abc");
    assert_eq!(observer.bytes.load(Ordering::SeqCst), 3);
    assert!(client.backend().requests()[0].follow_redirects);
}

#[test]
fn zip_with_wrong_content_type_rejected() {
    let url = "https://trcustoms.org/files/1.zip";
    let backend = MockBackend::new();
    backend.on_head(url, MockReply::ok("application/zip", ""));
    backend.on_get(url, MockReply::ok("text/html", "<html/>"));
    let err = client(backend).download_zip(url, &NoopObserver).unwrap_err();
    assert!(matches!(err, FetchError::ContentTypeMismatch { .. }));
}

#[test]
fn image_md5_verified() {
    let url = "https://data.trcustoms.org/media/covers/1.jpg";
    let backend = MockBackend::new();
    backend.on_get(url, MockReply::ok("image/jpeg", "abc"));
    let client = client(backend);

    client
        .fetch_image_verified(url, ContentKind::Jpeg, "900150983CD24FB0D6963F7D28E17F72")
        .unwrap();
    let err = client
        .fetch_image_verified(url, ContentKind::Jpeg, "d41d8cd98f00b204e9800998ecf8427e")
        .unwrap_err();
    assert!(matches!(err, FetchError::Md5Mismatch { .. }));
    assert_eq!(err.class(), FailureClass::IntegrityFailure);
}

#[test]
fn image_kind_restricted() {
    let err = client(MockBackend::new())
        .fetch_image("https://trcustoms.org/a", ContentKind::Html)
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::PolicyViolation);
}

#[test]
fn custom_origin_policy() {
    let backend = MockBackend::new();
    backend.on_get("https://mirror.local/x", MockReply::ok("image/png", "png"));
    let client = FetchClient::new(
        config().with_origins(OriginPolicy::new(["https://mirror.local/"])),
        backend,
        MockLeafProbe::new(),
    );
    assert_eq!(
        client
            .fetch_image("https://mirror.local/x", ContentKind::Png)
            .unwrap(),
        b"png"
    );
    assert!(client
        .fetch_html("https://trle.net/")
        .is_err());
}
