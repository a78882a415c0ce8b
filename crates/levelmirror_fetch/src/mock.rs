//! Scripted backends for testing without a network.

use crate::backend::{HttpBackend, HttpRequest, HttpResponse, Method, TransferObserver};
use crate::error::{FetchError, FetchResult};
use crate::trust::{LeafProbe, PublicKeyPin};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A response, returned as-is.
    Response(HttpResponse),
    /// A retryable transport failure.
    TransportError(String),
}

impl MockReply {
    /// A 200 response with the given Content-Type and body.
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        MockReply::Response(HttpResponse {
            status: 200,
            url: String::new(),
            headers: vec![
                ("Content-Type".to_string(), content_type.to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            body,
        })
    }

    /// An empty response with the given status.
    pub fn status(status: u16) -> Self {
        MockReply::Response(HttpResponse {
            status,
            ..HttpResponse::default()
        })
    }

    /// A 302 redirect to `location`.
    pub fn redirect(location: &str) -> Self {
        MockReply::status(302).with_header("Location", location)
    }

    /// A transport failure.
    pub fn transport(message: &str) -> Self {
        MockReply::TransportError(message.to_string())
    }

    /// Adds a header to a response.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let MockReply::Response(response) = &mut self {
            response.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Sets the effective URL reported by a response.
    pub fn with_url(mut self, url: &str) -> Self {
        if let MockReply::Response(response) = &mut self {
            response.url = url.to_string();
        }
        self
    }
}

/// Scripted [`HttpBackend`].
///
/// Replies are queued per method and URL and consumed in order; the last
/// queued reply repeats. Unscripted URLs answer 404. When a request carries a
/// pin and a leaf has been set for the host with [`MockBackend::present_leaf`],
/// the handshake is simulated and a different key fails with
/// [`FetchError::PinMismatch`].
#[derive(Debug, Default)]
pub struct MockBackend {
    replies: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    presented: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for `GET url`.
    pub fn on_get(&self, url: &str, reply: MockReply) -> &Self {
        self.push(Method::Get, url, reply)
    }

    /// Queues a reply for `HEAD url`.
    pub fn on_head(&self, url: &str, reply: MockReply) -> &Self {
        self.push(Method::Head, url, reply)
    }

    fn push(&self, method: Method, url: &str, reply: MockReply) -> &Self {
        self.replies
            .lock()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Sets the leaf certificate `host` presents in simulated handshakes.
    pub fn present_leaf(&self, host: &str, der: &[u8]) {
        self.presented.lock().insert(host.to_string(), der.to_vec());
    }

    /// Returns every request executed so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn handshake(&self, request: &HttpRequest) -> FetchResult<()> {
        let Some(material) = &request.pin else {
            return Ok(());
        };
        let Some(leaf) = self.presented.lock().get(&material.host).cloned() else {
            return Ok(());
        };
        let presented = PublicKeyPin::from_leaf_der(&material.host, &leaf)?;
        if presented != material.pin {
            return Err(FetchError::PinMismatch {
                host: material.host.clone(),
                expected: material.pin.to_string(),
                presented: presented.to_string(),
            });
        }
        Ok(())
    }

    fn next_reply(&self, request: &HttpRequest) -> MockReply {
        let mut replies = self.replies.lock();
        match replies.get_mut(&(request.method, request.url.clone())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| MockReply::status(404)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| MockReply::status(404)),
            None => MockReply::status(404),
        }
    }
}

impl HttpBackend for MockBackend {
    fn execute(
        &self,
        request: &HttpRequest,
        observer: &dyn TransferObserver,
    ) -> FetchResult<HttpResponse> {
        self.requests.lock().push(request.clone());
        self.handshake(request)?;

        match self.next_reply(request) {
            MockReply::TransportError(message) => Err(FetchError::transport_retryable(message)),
            MockReply::Response(mut response) => {
                if response.url.is_empty() {
                    response.url = request.url.clone();
                }
                if request.method == Method::Head {
                    response.body.clear();
                } else {
                    let len = response.body.len() as u64;
                    observer.on_progress(&response.url, len, response.content_length());
                    observer.on_complete(&response.url, len);
                }
                Ok(response)
            }
        }
    }
}

/// Scripted [`LeafProbe`].
#[derive(Debug, Default)]
pub struct MockLeafProbe {
    leaves: Mutex<HashMap<String, Vec<u8>>>,
    captures: AtomicUsize,
}

impl MockLeafProbe {
    /// Creates a probe with no leaves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the leaf certificate returned for `host`.
    pub fn with_leaf(self, host: &str, der: &[u8]) -> Self {
        self.leaves.lock().insert(host.to_string(), der.to_vec());
        self
    }

    /// Returns the number of captures performed.
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl LeafProbe for MockLeafProbe {
    fn capture_leaf(&self, host: &str, _port: u16) -> FetchResult<Vec<u8>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.leaves
            .lock()
            .get(host)
            .cloned()
            .ok_or_else(|| FetchError::CertificateUnavailable {
                host: host.to_string(),
                reason: "no leaf scripted".to_string(),
            })
    }
}
