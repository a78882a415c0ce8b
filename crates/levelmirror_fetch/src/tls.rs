//! rustls plumbing: raw leaf capture and pinned verification.

use crate::error::{FetchError, FetchResult};
use crate::trust::{LeafProbe, PublicKeyPin, TrustMaterial};
use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    CertificateError, ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme,
};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn build_config(
    provider: Arc<CryptoProvider>,
    verifier: Arc<dyn ServerCertVerifier>,
) -> FetchResult<ClientConfig> {
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::transport_fatal(format!("tls setup failed: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

fn host_of<'a>(server_name: &'a ServerName<'_>) -> Option<&'a str> {
    match server_name {
        ServerName::DnsName(name) => Some(name.as_ref()),
        _ => None,
    }
}

/// Accepts any certificate; used only to read the leaf during bootstrap.
#[derive(Debug)]
struct CapturingVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Captures leaf certificates with a bare TLS handshake.
///
/// Chain validation is disabled for the capture; the handshake signature is
/// still checked against the captured key.
#[derive(Debug, Clone)]
pub struct RustlsLeafProbe {
    timeout: Duration,
}

impl RustlsLeafProbe {
    /// Creates a probe with the given connect and read timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RustlsLeafProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl LeafProbe for RustlsLeafProbe {
    fn capture_leaf(&self, host: &str, port: u16) -> FetchResult<Vec<u8>> {
        let unavailable = |reason: String| FetchError::CertificateUnavailable {
            host: host.to_string(),
            reason,
        };
        let provider = provider();
        let config = build_config(
            Arc::clone(&provider),
            Arc::new(CapturingVerifier { provider }),
        )?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| unavailable(format!("invalid server name: {e}")))?;
        let mut conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| unavailable(e.to_string()))?;

        let mut socket = TcpStream::connect((host, port))
            .map_err(|e| FetchError::transport_retryable(format!("connect {host}:{port}: {e}")))?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.set_write_timeout(Some(self.timeout))?;

        while conn.is_handshaking() {
            conn.complete_io(&mut socket)
                .map_err(|e| FetchError::transport_retryable(format!("handshake {host}: {e}")))?;
        }

        let leaf = conn
            .peer_certificates()
            .and_then(|chain| chain.first())
            .ok_or_else(|| unavailable("server presented no certificate".to_string()))?;
        debug!(host, port, bytes = leaf.len(), "captured leaf certificate");
        Ok(leaf.to_vec())
    }
}

/// What a pinned handshake saw instead of the pinned key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PinViolation {
    pub host: String,
    pub presented: String,
}

/// Shared slot the verifier writes a violation into.
pub(crate) type ViolationSlot = Arc<Mutex<Option<PinViolation>>>;

/// Accepts only the pinned public key for the pinned host.
#[derive(Debug)]
pub(crate) struct PinnedVerifier {
    host: String,
    pin: PublicKeyPin,
    provider: Arc<CryptoProvider>,
    violation: ViolationSlot,
}

impl PinnedVerifier {
    pub(crate) fn new(material: &TrustMaterial, violation: ViolationSlot) -> Self {
        Self {
            host: material.host.clone(),
            pin: material.pin,
            provider: provider(),
            violation,
        }
    }

    fn reject(&self, host: &str, presented: String) -> rustls::Error {
        warn!(host, pinned = %self.pin, %presented, "rejecting certificate");
        *self.violation.lock() = Some(PinViolation {
            host: host.to_string(),
            presented,
        });
        rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure)
    }
}

impl ServerCertVerifier for PinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let host = host_of(server_name).unwrap_or("<ip address>");
        if !host.eq_ignore_ascii_case(&self.host) {
            return Err(self.reject(host, "certificate for an unpinned host".to_string()));
        }
        match PublicKeyPin::from_leaf_der(host, end_entity.as_ref()) {
            Ok(presented) if presented == self.pin => Ok(ServerCertVerified::assertion()),
            Ok(presented) => Err(self.reject(host, presented.to_string())),
            Err(e) => Err(self.reject(host, e.to_string())),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Builds a client configuration trusting only the pinned key of `material`.
pub(crate) fn pinned_client_config(
    material: &TrustMaterial,
    violation: ViolationSlot,
) -> FetchResult<Arc<ClientConfig>> {
    let verifier = PinnedVerifier::new(material, violation);
    Ok(Arc::new(build_config(
        Arc::clone(&verifier.provider),
        Arc::new(verifier),
    )?))
}
