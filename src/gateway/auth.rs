//! Certificate authentication middleware
//!
//! Runs the [`Authenticator`] on the [`PeerConnection`] attached by the TLS
//! acceptor. Admitted requests get an [`Identity`](crate::mtls::Identity)
//! extension; everything else is answered here with the rejection's status:
//!
//! | Rejection | Status |
//! |-----------|--------|
//! | no certificate / empty subject | 401 |
//! | not yet valid / expired | 401 |
//! | not whitelisted | 403 |
//! | internal fault | 500 |

use axum::{
    Json,
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::acceptor::PeerConnection;
use crate::mtls::{Authenticator, Rejection, TrustSignal};

/// Paths served without a client certificate.
pub const PUBLIC_PATHS: &[&str] = &["/health"];

/// Check if a path is public (bypasses auth)
#[must_use]
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|p| path == *p)
}

/// Authentication middleware
pub async fn mtls_auth_middleware(
    State(authenticator): State<Authenticator>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    if is_public_path(&path) {
        debug!(path = %path, "Public path, skipping auth");
        return next.run(request).await;
    }

    let outcome = match request.extensions().get::<PeerConnection>() {
        Some(peer) => authenticator.authenticate_der(
            peer.certificate.as_ref().map(AsRef::as_ref),
            &peer.trust,
            Utc::now(),
        ),
        None => authenticator.authenticate_der(
            None,
            &TrustSignal::unauthorized("no TLS session"),
            Utc::now(),
        ),
    };

    match outcome {
        Ok(identity) => {
            info!(
                client = %identity.display_name(),
                fingerprint = %identity.fingerprint,
                path = %path,
                "Authenticated request"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) => {
            warn!(path = %path, kind = rejection.kind(), reason = %rejection, "Request rejected");
            rejection_response(&rejection)
        }
    }
}

/// JSON error response for a rejection
#[must_use]
pub fn rejection_response(rejection: &Rejection) -> Response {
    (
        rejection.status_code(),
        Json(json!({
            "error": {
                "code": rejection.kind(),
                "message": rejection.to_string()
            }
        })),
    )
        .into_response()
}
