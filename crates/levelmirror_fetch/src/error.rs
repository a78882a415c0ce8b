//! Error types for the fetch client.

use levelmirror_model::FailureClass;
use std::io;
use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while fetching.
#[derive(Error, Debug)]
pub enum FetchError {
    /// URL is outside the origin allow-list.
    #[error("origin not allowed: {url}")]
    DisallowedOrigin {
        /// Offending URL.
        url: String,
    },

    /// Content kind is not one the client knows how to verify.
    #[error("content kind not allowed: {kind}")]
    DisallowedKind {
        /// Requested kind.
        kind: String,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// Server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Every attempt failed.
    #[error("giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Requested URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failure.
        last_error: String,
    },

    /// Response carried a different Content-Type than requested.
    #[error("unexpected content type from {url}: expected {expected}, got {actual}")]
    ContentTypeMismatch {
        /// Requested URL.
        url: String,
        /// MIME type of the requested kind.
        expected: &'static str,
        /// MIME type received (`<none>` when absent).
        actual: String,
    },

    /// A pinned host presented a different public key.
    #[error("public key pin mismatch for {host}: pinned {expected}, presented {presented}")]
    PinMismatch {
        /// Host name.
        host: String,
        /// Pinned key.
        expected: String,
        /// Key presented in the handshake.
        presented: String,
    },

    /// No usable certificate for a host that requires one.
    #[error("no trusted certificate for {host}: {reason}")]
    CertificateUnavailable {
        /// Host name.
        host: String,
        /// Why none is available.
        reason: String,
    },

    /// Trust state machine was asked for a transition it does not allow.
    #[error("invalid trust transition for {host} from {from} to {to}")]
    TrustTransition {
        /// Host name.
        host: String,
        /// Current state.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },

    /// Payload digest differs from the advertised one.
    #[error("md5 mismatch for {url}: expected {expected}, got {actual}")]
    Md5Mismatch {
        /// Requested URL.
        url: String,
        /// Advertised digest.
        expected: String,
        /// Digest of the received payload.
        actual: String,
    },

    /// HTML payload did not decode in any supported charset.
    #[error("payload from {url} is not valid in any known charset")]
    UndecodablePayload {
        /// Requested URL.
        url: String,
    },

    /// Payload could not be parsed as the requested kind.
    #[error("malformed payload from {url}: {message}")]
    MalformedPayload {
        /// Requested URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// Another process holds the singleton lock.
    #[error("another instance is already running (lock port {port})")]
    LockHeld {
        /// Loopback port used as the lock.
        port: u16,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { retryable, .. } => *retryable,
            FetchError::Status { .. } => true,
            _ => false,
        }
    }

    /// Returns the failure class of this error.
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::DisallowedOrigin { .. } | FetchError::DisallowedKind { .. } => {
                FailureClass::PolicyViolation
            }
            FetchError::Transport { .. }
            | FetchError::Status { .. }
            | FetchError::RetriesExhausted { .. }
            | FetchError::Io(_) => FailureClass::NetworkFailure,
            FetchError::ContentTypeMismatch { .. }
            | FetchError::PinMismatch { .. }
            | FetchError::CertificateUnavailable { .. }
            | FetchError::TrustTransition { .. }
            | FetchError::Md5Mismatch { .. }
            | FetchError::UndecodablePayload { .. }
            | FetchError::MalformedPayload { .. } => FailureClass::IntegrityFailure,
            FetchError::LockHeld { .. } => FailureClass::LockHeld,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(FetchError::transport_retryable("connection reset").is_retryable());
        assert!(!FetchError::transport_fatal("bad certificate").is_retryable());
        assert!(FetchError::Status {
            url: "https://trle.net/".into(),
            status: 503
        }
        .is_retryable());
        assert!(!FetchError::LockHeld { port: 55234 }.is_retryable());
    }

    #[test]
    fn classes() {
        let pin = FetchError::PinMismatch {
            host: "www.trle.net".into(),
            expected: "a".into(),
            presented: "b".into(),
        };
        assert_eq!(pin.class(), FailureClass::IntegrityFailure);
        assert!(!pin.is_retryable());

        let origin = FetchError::DisallowedOrigin {
            url: "https://example.com/".into(),
        };
        assert_eq!(origin.class(), FailureClass::PolicyViolation);

        assert_eq!(
            FetchError::LockHeld { port: 1 }.class(),
            FailureClass::LockHeld
        );
    }

    #[test]
    fn error_display() {
        let err = FetchError::ContentTypeMismatch {
            url: "https://trcustoms.org/api/levels/".into(),
            expected: "application/json",
            actual: "text/html".into(),
        };
        assert!(err.to_string().contains("application/json"));
        assert!(err.to_string().contains("text/html"));
    }
}
