//! TLS transport: PEM loading, rustls server config, and chain assessment.
//!
//! Provides:
//! - [`build_tls_config`]: build a `rustls::ServerConfig` from [`TlsConfig`]
//! - [`load_certs`] / [`load_private_key`]: PEM file loading
//! - [`DeferredClientVerifier`]: accepts any client chain during the
//!   handshake while still checking handshake signatures
//! - [`ChainAssessor`]: re-runs chain verification after the handshake and
//!   reports the verdict as a [`TrustSignal`]
//!
//! # Deferred chain verdicts
//!
//! Chain-of-trust failures reach the application as a `TrustSignal` instead
//! of aborting the handshake; the whitelist decides admission. The client
//! still has to prove possession of the certificate's private key, since
//! handshake signature checks are delegated unchanged.
//!
//! # File format
//!
//! All certificate and key files are expected in **PEM format**.

use std::fs;
use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme};
use tracing::debug;

use super::certificate::TrustSignal;
use crate::config::TlsConfig;
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Public: build TLS server config
// ─────────────────────────────────────────────────────────────────────────────

/// Server config plus the assessor that reports chain verdicts for it.
#[derive(Debug, Clone)]
pub struct TlsSetup {
    /// rustls server configuration for the listener.
    pub server_config: Arc<ServerConfig>,
    /// Chain verifier against the configured CA.
    pub assessor: ChainAssessor,
}

/// Build a `rustls::ServerConfig` for mutual TLS from the gateway config.
///
/// Client certificates are always requested. When
/// `config.require_client_cert` is `true` clients presenting none are
/// rejected at the handshake; otherwise they reach the application and are
/// answered with `401`.
///
/// # Errors
///
/// Returns an error if any certificate or key file cannot be read or parsed,
/// or if the rustls config cannot be built (e.g. mismatched cert/key pair).
pub fn build_tls_config(config: &TlsConfig) -> Result<TlsSetup> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let server_certs = load_certs(&config.server_cert)?;
    let server_key = load_private_key(&config.server_key)?;
    let ca_certs = load_certs(&config.ca_cert)?;

    let assessor = ChainAssessor::new(ca_certs, Arc::clone(&provider))?;
    let verifier = Arc::new(DeferredClientVerifier::new(
        assessor.verifier(),
        config.require_client_cert,
    ));

    let mut tls_cfg = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("Unsupported protocol versions: {e}")))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(server_certs, server_key)
        .map_err(|e| Error::Tls(format!("TLS config error (cert/key mismatch?): {e}")))?;

    // Prefer HTTP/2, fall back to HTTP/1.1
    tls_cfg.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    debug!(
        server_cert = %config.server_cert,
        ca_cert = %config.ca_cert,
        require_client_cert = config.require_client_cert,
        "mTLS config built"
    );

    Ok(TlsSetup {
        server_config: Arc::new(tls_cfg),
        assessor,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Public: PEM loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load all certificates from a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no valid PEM
/// certificate blocks.
pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let pem_data = read_file(path)?;
    let certs = CertificateDer::pem_slice_iter(&pem_data)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Failed to parse certs from '{path}': {e}")))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!("No certificates found in '{path}'")));
    }

    Ok(certs)
}

/// Load the first private key from a PEM file.
///
/// Supports PKCS#1 (`RSA PRIVATE KEY`), PKCS#8 (`PRIVATE KEY`), and SEC1 EC keys.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no private key.
pub fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let pem_data = read_file(path)?;
    PrivateKeyDer::from_pem_slice(&pem_data)
        .map_err(|e| Error::Tls(format!("No usable private key in '{path}': {e}")))
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::Tls(format!("Cannot read '{path}': {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chain assessment
// ─────────────────────────────────────────────────────────────────────────────

/// Verifies a presented chain against the configured CA after the handshake.
#[derive(Debug, Clone)]
pub struct ChainAssessor {
    inner: Arc<dyn ClientCertVerifier>,
}

impl ChainAssessor {
    /// Build an assessor trusting `ca_certs`.
    ///
    /// # Errors
    ///
    /// Returns an error if a CA certificate is unusable as a trust anchor.
    pub fn new(
        ca_certs: Vec<CertificateDer<'static>>,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        for cert in ca_certs {
            root_store
                .add(cert)
                .map_err(|e| Error::Tls(format!("Failed to add CA cert to trust store: {e}")))?;
        }

        let inner = WebPkiClientVerifier::builder_with_provider(Arc::new(root_store), provider)
            .allow_unauthenticated()
            .build()
            .map_err(|e| Error::Tls(format!("Failed to build client verifier: {e}")))?;

        Ok(Self { inner })
    }

    fn verifier(&self) -> Arc<dyn ClientCertVerifier> {
        Arc::clone(&self.inner)
    }

    /// Verify `chain` (end entity first) at the current time.
    ///
    /// An empty chain yields an unauthorized signal.
    #[must_use]
    pub fn assess(&self, chain: &[CertificateDer<'_>]) -> TrustSignal {
        self.assess_at(chain, UnixTime::now())
    }

    /// Verify `chain` at `now`.
    #[must_use]
    pub fn assess_at(&self, chain: &[CertificateDer<'_>], now: UnixTime) -> TrustSignal {
        let Some((end_entity, intermediates)) = chain.split_first() else {
            return TrustSignal::unauthorized("no client certificate presented");
        };
        match self.inner.verify_client_cert(end_entity, intermediates, now) {
            Ok(_) => TrustSignal::authorized(),
            Err(e) => TrustSignal::unauthorized(e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Deferred verifier
// ─────────────────────────────────────────────────────────────────────────────

/// Client verifier that never aborts the handshake over the chain itself.
///
/// Chain problems are logged at debug level and re-assessed by
/// [`ChainAssessor`] once the connection is up. Handshake signatures are
/// verified by the wrapped WebPKI verifier.
#[derive(Debug)]
pub struct DeferredClientVerifier {
    inner: Arc<dyn ClientCertVerifier>,
    mandatory: bool,
}

impl DeferredClientVerifier {
    /// Wrap `inner`. `mandatory` rejects clients that present no certificate.
    #[must_use]
    pub fn new(inner: Arc<dyn ClientCertVerifier>, mandatory: bool) -> Self {
        Self { inner, mandatory }
    }
}

impl ClientCertVerifier for DeferredClientVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        if let Err(e) = self.inner.verify_client_cert(end_entity, intermediates, now) {
            debug!(error = %e, "Client chain not verified, deferring verdict");
        }
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
