//! HTTP backend abstraction.
//!
//! The fetch client is written against [`HttpBackend`] so the policy layer
//! (allow-list, pinning, retry, content checks) can be exercised without a
//! network. [`UreqBackend`] is the production implementation.

use crate::error::{FetchError, FetchResult};
use crate::tls::{pinned_client_config, ViolationSlot};
use crate::trust::TrustMaterial;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum number of redirects followed by downloads.
const MAX_REDIRECTS: u32 = 10;

/// Read buffer size for streamed bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// HEAD.
    Head,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

/// A request as handed to the backend.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Whether redirects are followed.
    pub follow_redirects: bool,
    /// Pinned trust material; when set, only this key is accepted.
    pub pin: Option<Arc<TrustMaterial>>,
}

/// A response as returned by the backend.
///
/// Non-success statuses are returned as responses, not errors.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Effective URL after redirects.
    pub url: String,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Body bytes (empty for HEAD).
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns a header value, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Returns the declared `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of a HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    /// Status code.
    pub status: u16,
    /// Effective URL.
    pub url: String,
    /// `Location` header, for redirects.
    pub location: Option<String>,
    /// Declared body length.
    pub content_length: Option<u64>,
    /// `Content-Type` header.
    pub content_type: Option<String>,
    /// Raw header block, one `Name: value` per line.
    pub raw_headers: String,
}

impl From<&HttpResponse> for HeadInfo {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            url: response.url.clone(),
            location: response.header("Location").map(str::to_owned),
            content_length: response.content_length(),
            content_type: response.content_type().map(str::to_owned),
            raw_headers: response
                .headers
                .iter()
                .map(|(k, v)| format!("{k}: {v}\r\n"))
                .collect(),
        }
    }
}

/// Receives progress of streamed downloads.
pub trait TransferObserver: Send + Sync {
    /// Called after each chunk with the running byte count.
    fn on_progress(&self, url: &str, transferred: u64, total: Option<u64>);

    /// Called once the body has been read completely.
    fn on_complete(&self, _url: &str, _transferred: u64) {}
}

/// Observer that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn on_progress(&self, _url: &str, _transferred: u64, _total: Option<u64>) {}
}

/// Observer that logs progress in 10% steps.
#[derive(Debug, Default)]
pub struct LogObserver {
    last_step: AtomicU64,
}

impl LogObserver {
    /// Creates a new observer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferObserver for LogObserver {
    fn on_progress(&self, url: &str, transferred: u64, total: Option<u64>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        let step = transferred.saturating_mul(10) / total;
        if self.last_step.swap(step, Ordering::Relaxed) != step {
            info!(url, transferred, total, "downloaded {}%", step * 10);
        }
    }

    fn on_complete(&self, url: &str, transferred: u64) {
        self.last_step.store(0, Ordering::Relaxed);
        debug!(url, transferred, "download complete");
    }
}

/// HTTP backend.
///
/// Implementations perform exactly one request: no retries, no content checks.
pub trait HttpBackend: Send + Sync {
    /// Executes a request, streaming the body through `observer`.
    fn execute(
        &self,
        request: &HttpRequest,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse>;
}

/// Production backend built on `ureq` and `rustls`.
#[derive(Debug)]
pub struct UreqBackend {
    timeout: Duration,
    following: ureq::Agent,
    direct: ureq::Agent,
}

impl UreqBackend {
    /// Creates a backend with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            following: Self::builder(timeout, true).build(),
            direct: Self::builder(timeout, false).build(),
        }
    }

    fn builder(timeout: Duration, follow_redirects: bool) -> ureq::AgentBuilder {
        // Per-read timeouts: a large archive may take longer than `timeout` overall.
        ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .redirects(if follow_redirects { MAX_REDIRECTS } else { 0 })
    }

    fn agent(&self, request: &HttpRequest, violation: &ViolationSlot) -> FetchResult<ureq::Agent> {
        match &request.pin {
            Some(material) => Ok(Self::builder(self.timeout, request.follow_redirects)
                .tls_config(pinned_client_config(material, Arc::clone(violation))?)
                .build()),
            None if request.follow_redirects => Ok(self.following.clone()),
            None => Ok(self.direct.clone()),
        }
    }

    fn read_response(
        response: ureq::Response,
        method: Method,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse> {
        let status = response.status();
        let url = response.get_url().to_string();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect::<Vec<_>>();
        let total = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse().ok());

        let mut body = Vec::new();
        if method == Method::Get {
            let mut reader = response.into_reader();
            let mut chunk = vec![0u8; CHUNK_SIZE];
            loop {
                let n = reader
                    .read(&mut chunk)
                    .map_err(|e| FetchError::transport_retryable(format!("reading {url}: {e}")))?;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
                observer.on_progress(&url, body.len() as u64, total);
            }
            observer.on_complete(&url, body.len() as u64);
        }

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

impl Default for UreqBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HttpBackend for UreqBackend {
    fn execute(
        &self,
        request: &HttpRequest,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse> {
        let violation = ViolationSlot::default();
        let agent = self.agent(request, &violation)?;

        let mut call = agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        debug!(method = request.method.as_str(), url = %request.url, "sending request");

        match call.call() {
            Ok(response) | Err(ureq::Error::Status(_, response)) => {
                Self::read_response(response, request.method, observer)
            }
            Err(ureq::Error::Transport(transport)) => {
                if let Some(v) = violation.lock().take() {
                    let expected = request
                        .pin
                        .as_ref()
                        .map(|m| m.pin.to_string())
                        .unwrap_or_default();
                    return Err(FetchError::PinMismatch {
                        host: v.host,
                        expected,
                        presented: v.presented,
                    });
                }
                Err(FetchError::transport_retryable(transport.to_string()))
            }
        }
    }
}
