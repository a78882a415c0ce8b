//! # levelmirror fetch
//!
//! Policy-enforcing HTTPS gateway used by the mirror.
//!
//! This crate provides:
//! - A process-wide singleton lock (bound loopback port)
//! - An origin allow-list and a fixed set of content kinds
//! - Leaf-certificate bootstrap and public-key pinning for hosts that omit
//!   their certificate chain
//! - Retry with a fixed delay and strict Content-Type verification
//! - Charset fallback for legacy HTML and MD5-checked zip downloads
//!
//! ## Architecture
//!
//! [`FetchClient`] is the session value: it owns the configuration, the
//! per-host trust state and the HTTP backend. Nothing is kept in process
//! globals, so two clients never share trust material.
//!
//! ## Key Invariants
//!
//! - Requests to origins outside the allow-list are refused before any I/O
//! - A flagged host is pinned before its first request, once per session
//! - A pinned host presenting a different public key is a fatal error
//! - A payload is only returned when its Content-Type matches the request

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod charset;
mod client;
mod config;
mod error;
mod kind;
mod lock;
mod mock;
mod tls;
mod trust;

pub use backend::{
    HeadInfo, HttpBackend, HttpRequest, HttpResponse, LogObserver, Method, NoopObserver,
    TransferObserver, UreqBackend,
};
pub use charset::{decode_html, Charset, CHARSET_ORDER};
pub use client::{DownloadedZip, FetchClient, FetchStats, Payload};
pub use config::{FetchConfig, Origin, OriginPolicy, RetryPolicy, LEGACY_USER_AGENT};
pub use error::{FetchError, FetchResult};
pub use kind::ContentKind;
pub use lock::SingletonLock;
pub use mock::{MockBackend, MockLeafProbe, MockReply};
pub use tls::RustlsLeafProbe;
pub use trust::{LeafProbe, PublicKeyPin, TrustMaterial, TrustState, TrustStore};
