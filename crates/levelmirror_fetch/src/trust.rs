//! Per-host trust state for servers that omit their certificate chain.
//!
//! A flagged host moves through `Untrusted → BootstrappingLeaf → Pinned`
//! once per session. Pins are never persisted: every new [`TrustStore`]
//! starts with every host untrusted.

use crate::error::{FetchError, FetchResult};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use x509_parser::certificate::X509Certificate;

/// SHA-256 of a certificate's DER-encoded SubjectPublicKeyInfo.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyPin([u8; 32]);

impl PublicKeyPin {
    /// Creates a pin from raw SubjectPublicKeyInfo bytes.
    pub fn from_spki(spki: &[u8]) -> Self {
        Self(Sha256::digest(spki).into())
    }

    /// Derives the pin of a DER-encoded leaf certificate.
    pub fn from_leaf_der(host: &str, der: &[u8]) -> FetchResult<Self> {
        let cert = parse_leaf(host, der)?;
        Ok(Self::from_spki(cert.tbs_certificate.subject_pki.raw))
    }

    /// Returns the raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKeyPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sha256/")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKeyPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyPin({self})")
    }
}

/// A captured leaf certificate and what was derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustMaterial {
    /// Host the certificate was captured from.
    pub host: String,
    /// DER bytes of the leaf certificate.
    pub leaf_der: Vec<u8>,
    /// Public-key pin all later connections must match.
    pub pin: PublicKeyPin,
    /// Lowercase hex SHA-256 of the whole certificate.
    pub fingerprint: String,
    /// Serial number as uppercase colon-separated hex.
    pub serial: String,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
}

impl TrustMaterial {
    /// Parses a DER leaf certificate captured from `host`.
    pub fn from_leaf_der(host: &str, der: &[u8]) -> FetchResult<Self> {
        let cert = parse_leaf(host, der)?;
        let serial = cert
            .tbs_certificate
            .raw_serial()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        Ok(Self {
            host: host.to_string(),
            leaf_der: der.to_vec(),
            pin: PublicKeyPin::from_spki(cert.tbs_certificate.subject_pki.raw),
            fingerprint: Sha256::digest(der)
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect(),
            serial,
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
        })
    }
}

fn parse_leaf<'a>(host: &str, der: &'a [u8]) -> FetchResult<X509Certificate<'a>> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(der).map_err(|e| FetchError::CertificateUnavailable {
            host: host.to_string(),
            reason: format!("unparseable leaf certificate: {e}"),
        })?;
    Ok(cert)
}

/// Trust state of one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustState {
    /// Nothing captured yet.
    Untrusted,
    /// Leaf capture in progress.
    BootstrappingLeaf,
    /// Leaf captured and pinned for the rest of the session.
    Pinned(Arc<TrustMaterial>),
}

impl TrustState {
    /// Returns the state name.
    pub fn name(&self) -> &'static str {
        match self {
            TrustState::Untrusted => "Untrusted",
            TrustState::BootstrappingLeaf => "BootstrappingLeaf",
            TrustState::Pinned(_) => "Pinned",
        }
    }
}

/// Captures the leaf certificate a host presents, without chain validation.
pub trait LeafProbe: Send + Sync {
    /// Connects to `host:port` and returns the DER bytes of its leaf certificate.
    fn capture_leaf(&self, host: &str, port: u16) -> FetchResult<Vec<u8>>;
}

/// Session-scoped trust states, keyed by host.
#[derive(Debug, Default)]
pub struct TrustStore {
    hosts: Mutex<HashMap<String, TrustState>>,
}

impl TrustStore {
    /// Creates a store with every host untrusted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state of `host`.
    pub fn state(&self, host: &str) -> TrustState {
        self.hosts
            .lock()
            .get(host)
            .cloned()
            .unwrap_or(TrustState::Untrusted)
    }

    /// Returns the pinned material of `host`, if any.
    pub fn material(&self, host: &str) -> Option<Arc<TrustMaterial>> {
        match self.state(host) {
            TrustState::Pinned(material) => Some(material),
            _ => None,
        }
    }

    /// Moves `host` into `BootstrappingLeaf`.
    ///
    /// Allowed from `Untrusted`, and from `BootstrappingLeaf` so a failed
    /// capture can be retried. A pinned host can never be bootstrapped again.
    pub fn begin_bootstrap(&self, host: &str) -> FetchResult<()> {
        let mut hosts = self.hosts.lock();
        let state = hosts
            .entry(host.to_string())
            .or_insert(TrustState::Untrusted);
        match state {
            TrustState::Pinned(_) => Err(FetchError::TrustTransition {
                host: host.to_string(),
                from: "Pinned",
                to: "BootstrappingLeaf",
            }),
            _ => {
                *state = TrustState::BootstrappingLeaf;
                Ok(())
            }
        }
    }

    /// Pins `host` to the captured leaf certificate.
    pub fn pin(&self, host: &str, leaf_der: &[u8]) -> FetchResult<Arc<TrustMaterial>> {
        let mut hosts = self.hosts.lock();
        let from = hosts.get(host).map_or("Untrusted", TrustState::name);
        if from != "BootstrappingLeaf" {
            return Err(FetchError::TrustTransition {
                host: host.to_string(),
                from,
                to: "Pinned",
            });
        }
        let material = Arc::new(TrustMaterial::from_leaf_der(host, leaf_der)?);
        hosts.insert(host.to_string(), TrustState::Pinned(Arc::clone(&material)));
        info!(
            host,
            pin = %material.pin,
            fingerprint = %material.fingerprint,
            serial = %material.serial,
            subject = %material.subject,
            issuer = %material.issuer,
            "pinned leaf certificate"
        );
        Ok(material)
    }

    /// Checks a leaf certificate presented by `host` against its pin.
    pub fn verify_presented(&self, host: &str, leaf_der: &[u8]) -> FetchResult<()> {
        let material = self
            .material(host)
            .ok_or_else(|| FetchError::CertificateUnavailable {
                host: host.to_string(),
                reason: "host is not pinned".to_string(),
            })?;
        let presented = PublicKeyPin::from_leaf_der(host, leaf_der)?;
        if presented != material.pin {
            return Err(FetchError::PinMismatch {
                host: host.to_string(),
                expected: material.pin.to_string(),
                presented: presented.to_string(),
            });
        }
        Ok(())
    }

    /// Returns the pinned material of `host`, bootstrapping it first if needed.
    pub fn ensure_pinned(
        &self,
        host: &str,
        port: u16,
        probe: &dyn LeafProbe,
    ) -> FetchResult<Arc<TrustMaterial>> {
        if let Some(material) = self.material(host) {
            return Ok(material);
        }
        self.begin_bootstrap(host)?;
        debug!(host, port, "capturing leaf certificate");
        let leaf = probe.capture_leaf(host, port)?;
        self.pin(host, &leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLeafProbe;

    const LEAF_A: &[u8] = include_bytes!("../tests/fixtures/leaf_a.der");
    const LEAF_A_RENEWED: &[u8] = include_bytes!("../tests/fixtures/leaf_a_renewed.der");
    const LEAF_B: &[u8] = include_bytes!("../tests/fixtures/leaf_b.der");

    #[test]
    fn pin_is_spki_digest() {
        let pin = PublicKeyPin::from_leaf_der("www.trle.net", LEAF_A).unwrap();
        assert_eq!(
            pin.to_string(),
            "sha256/0c8a1253094a9da2690397b2794a1b840f0ef103764cb740404381b5e7a6f208"
        );
    }

    #[test]
    fn renewed_certificate_keeps_pin() {
        let a = PublicKeyPin::from_leaf_der("www.trle.net", LEAF_A).unwrap();
        let renewed = PublicKeyPin::from_leaf_der("www.trle.net", LEAF_A_RENEWED).unwrap();
        let b = PublicKeyPin::from_leaf_der("www.trle.net", LEAF_B).unwrap();
        assert_eq!(a, renewed);
        assert_ne!(a, b);
    }

    #[test]
    fn material_details() {
        let material = TrustMaterial::from_leaf_der("www.trle.net", LEAF_A).unwrap();
        assert_eq!(
            material.serial,
            "2E:A5:77:39:88:2E:A2:E9:1A:7E:61:FB:6E:DB:2F:14:5C:6F:A7:10"
        );
        assert!(material.subject.contains("www.trle.net"));
        assert_eq!(material.fingerprint.len(), 64);

        let renewed = TrustMaterial::from_leaf_der("www.trle.net", LEAF_A_RENEWED).unwrap();
        assert_eq!(renewed.serial, "10:92");
    }

    #[test]
    fn state_machine() {
        let store = TrustStore::new();
        assert_eq!(store.state("www.trle.net"), TrustState::Untrusted);

        // Pinning without bootstrap is refused.
        assert!(matches!(
            store.pin("www.trle.net", LEAF_A),
            Err(FetchError::TrustTransition { from: "Untrusted", .. })
        ));

        store.begin_bootstrap("www.trle.net").unwrap();
        assert_eq!(store.state("www.trle.net"), TrustState::BootstrappingLeaf);
        store.begin_bootstrap("www.trle.net").unwrap();

        store.pin("www.trle.net", LEAF_A).unwrap();
        assert_eq!(store.state("www.trle.net").name(), "Pinned");

        // No way back within a session.
        assert!(matches!(
            store.begin_bootstrap("www.trle.net"),
            Err(FetchError::TrustTransition { from: "Pinned", .. })
        ));
        assert!(store.pin("www.trle.net", LEAF_B).is_err());
        assert!(store.material("www.trle.net").is_some());
    }

    #[test]
    fn garbage_leaf_leaves_host_bootstrapping() {
        let store = TrustStore::new();
        store.begin_bootstrap("www.trle.net").unwrap();
        let err = store.pin("www.trle.net", b"<html>not a cert</html>").unwrap_err();
        assert!(matches!(err, FetchError::CertificateUnavailable { .. }));
        assert_eq!(store.state("www.trle.net"), TrustState::BootstrappingLeaf);
    }

    #[test]
    fn presented_key_must_match_pin() {
        let store = TrustStore::new();
        let probe = MockLeafProbe::new().with_leaf("www.trle.net", LEAF_A);
        store.ensure_pinned("www.trle.net", 443, &probe).unwrap();

        store.verify_presented("www.trle.net", LEAF_A).unwrap();
        store.verify_presented("www.trle.net", LEAF_A_RENEWED).unwrap();

        let err = store.verify_presented("www.trle.net", LEAF_B).unwrap_err();
        assert!(matches!(err, FetchError::PinMismatch { .. }));
        assert_eq!(err.class(), levelmirror_model::FailureClass::IntegrityFailure);
    }

    #[test]
    fn verify_unpinned_host_fails() {
        let store = TrustStore::new();
        assert!(matches!(
            store.verify_presented("www.trle.net", LEAF_A),
            Err(FetchError::CertificateUnavailable { .. })
        ));
    }

    #[test]
    fn ensure_pinned_captures_once() {
        let store = TrustStore::new();
        let probe = MockLeafProbe::new().with_leaf("www.trle.net", LEAF_A);
        let first = store.ensure_pinned("www.trle.net", 443, &probe).unwrap();
        let second = store.ensure_pinned("www.trle.net", 443, &probe).unwrap();
        assert_eq!(first, second);
        assert_eq!(probe.captures(), 1);
    }

    #[test]
    fn fresh_store_forgets_pins() {
        let probe = MockLeafProbe::new().with_leaf("www.trle.net", LEAF_A);
        TrustStore::new()
            .ensure_pinned("www.trle.net", 443, &probe)
            .unwrap();
        assert_eq!(TrustStore::new().state("www.trle.net"), TrustState::Untrusted);
    }
}
