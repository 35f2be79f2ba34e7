//! Mutual TLS (mTLS) certificate authentication.
//!
//! # Architecture
//!
//! ```text
//! TCP connection
//!   → TLS handshake  (rustls checks handshake signatures, chain verdict deferred)
//!   → PeerConnection (DER cert + TrustSignal) injected into request extensions
//!   → Authenticator
//!       1. certificate present, subject non-empty
//!       2. validity window
//!       3. chain trust (warn only)
//!       4. whitelist lookup on the selected fingerprint
//!   → Identity injected into request extensions
//!   → handler
//! ```
//!
//! # Modules
//!
//! - [`certificate`]: DER parsing into `PeerCertificate`, `TrustSignal`
//! - [`temporal`]: not-before / not-after check
//! - [`fingerprint`]: `HashAlgorithm` and fingerprint selection
//! - [`allowlist`]: whitelist document and reloadable `AllowListStore`
//! - [`authenticator`]: the decision engine and `Rejection`
//! - [`identity`]: `Identity` handed to downstream handlers
//! - [`tls`]: rustls config building, PEM loading, chain assessment
//! - [`watcher`]: whitelist hot-reload
//!
//! # Quick start
//!
//! ```yaml
//! tls:
//!   server_cert: "/etc/cert-gateway/tls/server.crt"
//!   server_key:  "/etc/cert-gateway/tls/server.key"
//!   ca_cert:     "/etc/cert-gateway/tls/ca.crt"
//! whitelist:
//!   path: "/etc/cert-gateway/whitelist.json"
//!   watch: true
//! ```

pub mod allowlist;
pub mod authenticator;
pub mod certificate;
pub mod fingerprint;
pub mod identity;
pub mod temporal;
pub mod tls;
pub mod watcher;

pub use allowlist::{
    AllowListDocument, AllowListEntry, AllowListStore, AuthorizationDecision, WhitelistStatus,
};
pub use authenticator::{Authenticator, Rejection};
pub use certificate::{DistinguishedName, Fingerprints, PeerCertificate, TrustSignal};
pub use fingerprint::{HashAlgorithm, select_fingerprint};
pub use identity::Identity;
pub use temporal::TemporalStatus;
pub use tls::{ChainAssessor, DeferredClientVerifier, TlsSetup, build_tls_config};
pub use watcher::WhitelistWatcher;
