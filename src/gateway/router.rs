//! HTTP router and handlers

use std::any::Any;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

use super::auth::{mtls_auth_middleware, rejection_response};
use crate::mtls::{Authenticator, Identity, Rejection};

/// Shared application state
pub struct AppState {
    /// Decision engine, also the owner of the whitelist store
    pub authenticator: Authenticator,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticator = state.authenticator.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/identity", get(identity_handler))
        .route("/api/whitelist/status", get(whitelist_status_handler))
        .route("/api/whitelist/reload", post(whitelist_reload_handler))
        .layer(middleware::from_fn_with_state(
            authenticator,
            mtls_auth_middleware,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A panicking handler answers like any other internal failure
#[allow(clippy::needless_pass_by_value)]
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    rejection_response(&Rejection::InternalFault)
}

/// Liveness check, served without a client certificate
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Echo the verified identity of the caller
async fn identity_handler(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

/// Current whitelist state
async fn whitelist_status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.authenticator.whitelist().status())
}

/// Re-read the whitelist document from disk
async fn whitelist_reload_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    info!(client = %identity.display_name(), "Whitelist reload requested");

    let store = Arc::clone(state.authenticator.whitelist());
    match tokio::task::spawn_blocking(move || {
        store.reload();
        store.status()
    })
    .await
    {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            error!(error = %e, "Whitelist reload task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": {
                        "code": "internal_error",
                        "message": "whitelist reload failed"
                    }
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PeerConnection;
    use crate::mtls::{
        AllowListStore, HashAlgorithm, PeerCertificate, TrustSignal, select_fingerprint,
    };
    use axum::body::Body;
    use axum::http::Request;
    use rustls::pki_types::CertificateDer;
    use serde_json::Value;
    use std::fs;
    use tower::ServiceExt;

    fn client_der(cn: &str) -> CertificateDer<'static> {
        let mut params = rcgen::CertificateParams::new(vec!["client.local".into()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, cn);
        let key = rcgen::KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().clone()
    }

    fn sha1_of(der: &CertificateDer<'_>) -> String {
        let cert = PeerCertificate::from_der(der).unwrap();
        select_fingerprint(&cert, HashAlgorithm::Sha1)
    }

    fn router_with(document: &str) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitelist.json");
        fs::write(&path, document).unwrap();
        let store = Arc::new(AllowListStore::new(&path));
        store.load();
        let state = Arc::new(AppState {
            authenticator: Authenticator::new(store),
        });
        (create_router(state), dir)
    }

    fn request(method: &str, uri: &str, peer: Option<PeerConnection>) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        if let Some(peer) = peer {
            req.extensions_mut().insert(peer);
        }
        req
    }

    fn peer(der: CertificateDer<'static>) -> PeerConnection {
        PeerConnection {
            certificate: Some(der),
            trust: TrustSignal::authorized(),
        }
    }

    async fn body_json(resp: Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_certificate() {
        let (app, _dir) = router_with(r#"{"whitelistEnabled": true}"#);
        let resp = app.oneshot(request("GET", "/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn identity_without_certificate_is_401() {
        let (app, _dir) = router_with(r#"{"whitelistEnabled": false}"#);
        let resp = app
            .oneshot(request("GET", "/api/identity", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(resp).await["error"]["code"],
            "certificate_required"
        );
    }

    #[tokio::test]
    async fn identity_echoes_whitelisted_client() {
        // GIVEN: a whitelist containing the client's SHA-1 fingerprint
        let der = client_der("alice");
        let fp = sha1_of(&der);
        let doc = json!({
            "whitelistEnabled": true,
            "whitelistedCertificates": [
                { "fingerprint": fp, "description": "alice laptop", "enabled": true }
            ]
        });
        let (app, _dir) = router_with(&doc.to_string());

        // WHEN: the client calls the identity endpoint
        let resp = app
            .oneshot(request("GET", "/api/identity", Some(peer(der))))
            .await
            .unwrap();

        // THEN: its identity is returned
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["subject"]["CN"], "alice");
        assert_eq!(json["fingerprint"], fp);
        assert_eq!(json["authenticated"], true);
    }

    #[tokio::test]
    async fn unknown_client_is_403() {
        let (app, _dir) = router_with(r#"{"whitelistEnabled": true}"#);
        let resp = app
            .oneshot(request("GET", "/api/identity", Some(peer(client_der("mallory")))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "certificate_not_whitelisted");
    }

    #[tokio::test]
    async fn reload_picks_up_new_entries() {
        // GIVEN: a disabled whitelist admitting everyone
        let der = client_der("ops");
        let (app, dir) = router_with(r#"{"whitelistEnabled": false}"#);

        // WHEN: the document is replaced with one naming a different client and reloaded
        fs::write(
            dir.path().join("whitelist.json"),
            r#"{"whitelistEnabled": true, "whitelistedCertificates": [{"fingerprint": "AA:BB", "description": "x", "enabled": true}]}"#,
        )
        .unwrap();
        let resp = app
            .clone()
            .oneshot(request("POST", "/api/whitelist/reload", Some(peer(der.clone()))))
            .await
            .unwrap();

        // THEN: the reload reports the new state and the caller is now denied
        assert_eq!(resp.status(), StatusCode::OK);
        let status = body_json(resp).await;
        assert_eq!(status["enabled"], true);
        assert_eq!(status["entries"], 1);

        let resp = app
            .oneshot(request("GET", "/api/whitelist/status", Some(peer(der))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    async fn panicking_handler() -> StatusCode {
        panic!("handler failure")
    }

    #[tokio::test]
    async fn panicking_handler_yields_json_error() {
        // GIVEN: a route that panics behind the same panic layer
        let app: Router = Router::new()
            .route("/boom", get(panicking_handler))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // THEN: structured 500 body
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "internal_error");
    }
}
