//! Content kinds the client knows how to request and verify.

use crate::error::{FetchError, FetchResult};
use std::fmt;

/// Expected kind of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// `text/html`, decoded with charset fallback.
    Html,
    /// `application/json`.
    Json,
    /// `image/jpeg`.
    Jpeg,
    /// `image/png`.
    Png,
    /// `application/pkix-cert` (DER certificate).
    DerCertificate,
    /// `application/zip`, streamed and MD5-digested.
    Zip,
    /// Headers only; no body, no redirects.
    Head,
}

impl ContentKind {
    /// MIME type the response must carry, or `None` for [`ContentKind::Head`].
    pub fn mime(self) -> Option<&'static str> {
        match self {
            ContentKind::Html => Some("text/html"),
            ContentKind::Json => Some("application/json"),
            ContentKind::Jpeg => Some("image/jpeg"),
            ContentKind::Png => Some("image/png"),
            ContentKind::DerCertificate => Some("application/pkix-cert"),
            ContentKind::Zip => Some("application/zip"),
            ContentKind::Head => None,
        }
    }

    /// Parses a MIME type (or `head`) into a kind.
    pub fn from_mime(value: &str) -> FetchResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text/html" => Ok(ContentKind::Html),
            "application/json" => Ok(ContentKind::Json),
            "image/jpeg" => Ok(ContentKind::Jpeg),
            "image/png" => Ok(ContentKind::Png),
            "application/pkix-cert" => Ok(ContentKind::DerCertificate),
            "application/zip" => Ok(ContentKind::Zip),
            "head" => Ok(ContentKind::Head),
            other => Err(FetchError::DisallowedKind {
                kind: other.to_string(),
            }),
        }
    }

    /// Returns true if a `Content-Type` header value satisfies this kind.
    ///
    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn accepts(self, content_type: Option<&str>) -> bool {
        match (self.mime(), content_type) {
            (None, _) => true,
            (Some(expected), Some(actual)) => essence(actual).eq_ignore_ascii_case(expected),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime().unwrap_or("head"))
    }
}

/// Strips parameters from a `Content-Type` value.
pub(crate) fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}
