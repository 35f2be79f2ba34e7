//! TLS acceptor that exposes the client certificate to request handlers.
//!
//! Wraps axum-server's `RustlsAcceptor`. After the handshake it captures the
//! presented chain, assesses it against the CA, and layers the result onto
//! the connection's service as a [`PeerConnection`] request extension.

use std::io;

use axum_server::accept::Accept;
use axum_server::tls_rustls::RustlsAcceptor;
use futures::future::BoxFuture;
use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tower::Layer;
use tower_http::add_extension::{AddExtension, AddExtensionLayer};
use tracing::debug;

use crate::mtls::{ChainAssessor, TrustSignal};

/// What the transport knows about the client, per connection.
#[derive(Debug, Clone, Default)]
pub struct PeerConnection {
    /// End-entity certificate, if the client presented one.
    pub certificate: Option<CertificateDer<'static>>,
    /// Chain verdict against the configured CA.
    pub trust: TrustSignal,
}

impl PeerConnection {
    /// Build from the presented chain (end entity first).
    #[must_use]
    pub fn from_chain(chain: &[CertificateDer<'static>], assessor: &ChainAssessor) -> Self {
        Self {
            certificate: chain.first().cloned(),
            trust: assessor.assess(chain),
        }
    }
}

/// `RustlsAcceptor` plus peer certificate capture.
#[derive(Clone)]
pub struct PeerCertAcceptor {
    inner: RustlsAcceptor,
    assessor: ChainAssessor,
}

impl PeerCertAcceptor {
    /// Wrap `inner`, assessing client chains with `assessor`.
    #[must_use]
    pub fn new(inner: RustlsAcceptor, assessor: ChainAssessor) -> Self {
        Self { inner, assessor }
    }
}

impl<I, S> Accept<I, S> for PeerCertAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = AddExtension<S, PeerConnection>;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let acceptor = self.inner.clone();
        let assessor = self.assessor.clone();

        Box::pin(async move {
            let (stream, service) = acceptor.accept(stream, service).await?;
            let (_, session) = stream.get_ref();
            let chain = session.peer_certificates().unwrap_or_default();
            let peer = PeerConnection::from_chain(chain, &assessor);
            debug!(
                has_certificate = peer.certificate.is_some(),
                chain_authorized = peer.trust.authorized,
                "TLS connection accepted"
            );
            Ok((stream, AddExtensionLayer::new(peer).layer(service)))
        })
    }
}
