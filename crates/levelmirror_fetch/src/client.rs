//! The fetch client session.

use crate::backend::{
    HeadInfo, HttpBackend, HttpRequest, HttpResponse, Method, NoopObserver, TransferObserver,
    UreqBackend,
};
use crate::charset::{decode_html, Charset};
use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::kind::{essence, ContentKind};
use crate::lock::SingletonLock;
use crate::tls::RustlsLeafProbe;
use crate::trust::{LeafProbe, TrustMaterial, TrustState, TrustStore};
use levelmirror_model::ZipFileInfo;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A verified response body.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Decoded HTML.
    Html {
        /// Decoded text.
        text: String,
        /// Charset that decoded it.
        charset: Charset,
    },
    /// Parsed JSON.
    Json(serde_json::Value),
    /// Image bytes.
    Image {
        /// `Jpeg` or `Png`.
        kind: ContentKind,
        /// Encoded image.
        bytes: Vec<u8>,
    },
    /// DER certificate bytes.
    Certificate(Vec<u8>),
    /// Downloaded archive.
    Zip(DownloadedZip),
    /// Headers of a HEAD probe.
    Head(HeadInfo),
}

/// A downloaded level archive and its metadata.
#[derive(Debug, Clone)]
pub struct DownloadedZip {
    /// Name, size, digest and effective URL.
    pub info: ZipFileInfo,
    /// Archive bytes.
    pub bytes: Vec<u8>,
}

/// Request counters of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests sent, including retries.
    pub requests: u64,
    /// Attempts after the first.
    pub retries: u64,
    /// Body bytes received from accepted responses.
    pub bytes: u64,
}

/// Policy-enforcing HTTPS client.
///
/// One client is one session: trust material captured by it lives exactly as
/// long as the client.
pub struct FetchClient<B: HttpBackend = UreqBackend> {
    config: FetchConfig,
    backend: B,
    probe: Box<dyn LeafProbe>,
    trust: TrustStore,
    stats: Mutex<FetchStats>,
}

impl FetchClient<UreqBackend> {
    /// Creates a client talking to the network.
    pub fn connect(config: FetchConfig) -> Self {
        let backend = UreqBackend::new(config.timeout);
        let probe = RustlsLeafProbe::new(config.timeout);
        Self::new(config, backend, probe)
    }
}

impl<B: HttpBackend> FetchClient<B> {
    /// Creates a client over the given backend and leaf probe.
    pub fn new(config: FetchConfig, backend: B, probe: impl LeafProbe + 'static) -> Self {
        Self {
            config,
            backend,
            probe: Box::new(probe),
            trust: TrustStore::new(),
            stats: Mutex::new(FetchStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the request counters.
    pub fn stats(&self) -> FetchStats {
        *self.stats.lock()
    }

    /// Returns the trust state of `host`.
    pub fn trust_state(&self, host: &str) -> TrustState {
        self.trust.state(host)
    }

    /// Returns the pinned trust material of `host`.
    pub fn trust_material(&self, host: &str) -> Option<Arc<TrustMaterial>> {
        self.trust.material(host)
    }

    /// Takes the process-wide singleton lock on the configured port.
    pub fn acquire_lock(&self) -> FetchResult<SingletonLock> {
        SingletonLock::acquire(self.config.lock_port)
    }

    /// Fetches `url` and verifies it is of `kind`.
    pub fn fetch(&self, url: &str, kind: ContentKind) -> FetchResult<Payload> {
        match kind {
            ContentKind::Head => self.head(url).map(Payload::Head),
            ContentKind::Zip => self.download_zip(url, &NoopObserver).map(Payload::Zip),
            ContentKind::Html => {
                let response = self.get(url, kind, &NoopObserver)?;
                let (text, charset) = decode_html(&response.body)
                    .ok_or_else(|| FetchError::UndecodablePayload {
                        url: url.to_string(),
                    })?;
                debug!(url, %charset, "decoded html");
                Ok(Payload::Html { text, charset })
            }
            ContentKind::Json => self.fetch_json(url).map(Payload::Json),
            ContentKind::Jpeg | ContentKind::Png => {
                let bytes = self.get(url, kind, &NoopObserver)?.body;
                Ok(Payload::Image { kind, bytes })
            }
            ContentKind::DerCertificate => self.fetch_certificate(url).map(Payload::Certificate),
        }
    }

    /// Fetches and decodes an HTML page.
    pub fn fetch_html(&self, url: &str) -> FetchResult<String> {
        match self.fetch(url, ContentKind::Html)? {
            Payload::Html { text, .. } => Ok(text),
            _ => Err(FetchError::UndecodablePayload {
                url: url.to_string(),
            }),
        }
    }

    /// Fetches and deserializes a JSON document.
    pub fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> FetchResult<T> {
        let response = self.get(url, ContentKind::Json, &NoopObserver)?;
        serde_json::from_slice(&response.body).map_err(|e| FetchError::MalformedPayload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetches a JPEG or PNG image.
    pub fn fetch_image(&self, url: &str, kind: ContentKind) -> FetchResult<Vec<u8>> {
        if !matches!(kind, ContentKind::Jpeg | ContentKind::Png) {
            return Err(FetchError::DisallowedKind {
                kind: kind.to_string(),
            });
        }
        Ok(self.get(url, kind, &NoopObserver)?.body)
    }

    /// Fetches an image and checks it against an advertised MD5.
    pub fn fetch_image_verified(
        &self,
        url: &str,
        kind: ContentKind,
        md5: &str,
    ) -> FetchResult<Vec<u8>> {
        let bytes = self.fetch_image(url, kind)?;
        let actual = md5_hex(&bytes);
        if !actual.eq_ignore_ascii_case(md5.trim()) {
            return Err(FetchError::Md5Mismatch {
                url: url.to_string(),
                expected: md5.trim().to_ascii_lowercase(),
                actual,
            });
        }
        Ok(bytes)
    }

    /// Fetches a DER certificate.
    pub fn fetch_certificate(&self, url: &str) -> FetchResult<Vec<u8>> {
        Ok(self.get(url, ContentKind::DerCertificate, &NoopObserver)?.body)
    }

    /// Probes `url` with HEAD, without following redirects.
    pub fn head(&self, url: &str) -> FetchResult<HeadInfo> {
        let response = self.send(url, ContentKind::Head, Method::Head, false, &NoopObserver)?;
        Ok(HeadInfo::from(&response))
    }

    /// Downloads a level archive.
    ///
    /// A HEAD request resolves the effective URL and declared size, then the
    /// body is streamed through `observer` and digested once.
    pub fn download_zip(
        &self,
        url: &str,
        observer: &dyn TransferObserver,
    ) -> FetchResult<DownloadedZip> {
        let probe = self.send(url, ContentKind::Head, Method::Head, true, &NoopObserver)?;
        let effective = probe.url.clone();
        let declared = probe.content_length();
        debug!(url, %effective, ?declared, "resolved archive");

        let response = self.get(&effective, ContentKind::Zip, observer)?;
        if response.status != 200 {
            return Err(FetchError::Status {
                url: effective,
                status: response.status,
            });
        }
        if let Some(declared) = declared {
            if declared != response.body.len() as u64 {
                return Err(FetchError::MalformedPayload {
                    url: effective,
                    message: format!(
                        "declared {declared} bytes, received {}",
                        response.body.len()
                    ),
                });
            }
        }

        let info = ZipFileInfo {
            name: file_name(&response.url).to_string(),
            size_mib: ZipFileInfo::size_in_mib(response.body.len() as u64),
            md5: md5_hex(&response.body),
            url: response.url.clone(),
            release: None,
            version: None,
        };
        info!(name = %info.name, size_mib = info.size_mib, md5 = %info.md5, "downloaded archive");
        Ok(DownloadedZip {
            info,
            bytes: response.body,
        })
    }

    fn get(
        &self,
        url: &str,
        kind: ContentKind,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse> {
        self.send(url, kind, Method::Get, true, observer)
    }

    fn send(
        &self,
        url: &str,
        kind: ContentKind,
        method: Method,
        follow_redirects: bool,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse> {
        let origin = self.config.origins.check(url)?;
        let pin = if self.config.origins.requires_bootstrap(&origin.host) {
            Some(
                self.trust
                    .ensure_pinned(&origin.host, origin.port, self.probe.as_ref())?,
            )
        } else {
            None
        };

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers: vec![
                ("User-Agent".to_string(), self.config.user_agent.clone()),
                ("Accept".to_string(), "*/*".to_string()),
            ],
            follow_redirects,
            pin,
        };
        let response = self.with_retry(&request, observer)?;

        if !kind.accepts(response.content_type()) {
            return Err(FetchError::ContentTypeMismatch {
                url: url.to_string(),
                expected: kind.mime().unwrap_or("head"),
                actual: response
                    .content_type()
                    .map_or_else(|| "<none>".to_string(), |ct| essence(ct).to_string()),
            });
        }
        self.stats.lock().bytes += response.body.len() as u64;
        Ok(response)
    }

    fn with_retry(
        &self,
        request: &HttpRequest,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse> {
        let policy = &self.config.retry;
        let mut last_error = String::new();

        for attempt in 0..policy.max_attempts {
            let delay = policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            {
                let mut stats = self.stats.lock();
                stats.requests += 1;
                if attempt > 0 {
                    stats.retries += 1;
                }
            }

            match self.backend.execute(request, observer) {
                Ok(response) if accepted(request.method, response.status) => return Ok(response),
                Ok(response) => {
                    last_error = format!("status {}", response.status);
                }
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }
            warn!(
                url = %request.url,
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                error = %last_error,
                "request failed"
            );
        }

        Err(FetchError::RetriesExhausted {
            url: request.url.clone(),
            attempts: policy.max_attempts,
            last_error,
        })
    }
}

fn accepted(method: Method, status: u16) -> bool {
    match method {
        Method::Head => (200..400).contains(&status),
        Method::Get => (200..300).contains(&status),
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    Md5::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Last path segment of `url`, without query or fragment.
fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}
