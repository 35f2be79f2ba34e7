//! Authorization decision engine.
//!
//! Evaluates one peer certificate through a fixed sequence of checks; the
//! first failing check ends evaluation:
//!
//! 1. **Certificate present**: missing certificate or empty subject →
//!    [`Rejection::NoCertificate`].
//! 2. **Validity window**: → [`Rejection::NotYetValid`] / [`Rejection::Expired`].
//! 3. **Chain of trust**: an unauthorized chain is logged as a warning but is
//!    *not* fatal; the whitelist decides admission.
//! 4. **Whitelist**: fingerprint lookup → [`Rejection::NotWhitelisted`].
//! 5. **Admit**: an [`Identity`] is returned.
//!
//! Certificates that cannot be introspected (unparseable DER, timestamps out
//! of range) end in [`Rejection::InternalFault`], which carries a generic
//! message only.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::allowlist::AllowListStore;
use super::certificate::{PeerCertificate, TrustSignal};
use super::fingerprint::select_fingerprint;
use super::identity::Identity;
use super::temporal::{TemporalStatus, validate};

// ─────────────────────────────────────────────────────────────────────────────
// Rejection
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request was not admitted. Messages are safe to log and return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No certificate, or a certificate with an empty subject.
    #[error("certificate required")]
    NoCertificate,

    /// Current time is before the certificate's not-before.
    #[error("certificate not yet valid (valid from {not_before})")]
    NotYetValid {
        /// The offending bound.
        not_before: DateTime<Utc>,
    },

    /// Current time is after the certificate's not-after.
    #[error("certificate expired (valid to {not_after})")]
    Expired {
        /// The offending bound.
        not_after: DateTime<Utc>,
    },

    /// Fingerprint not admitted by the whitelist.
    #[error("certificate not authorized: {reason}")]
    NotWhitelisted {
        /// Whitelist reason, e.g. `fingerprint not found (using SHA1: ...)`.
        reason: String,
    },

    /// The certificate could not be introspected.
    #[error("internal error while authenticating certificate")]
    InternalFault,
}

impl Rejection {
    /// Stable machine-readable code.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoCertificate => "certificate_required",
            Self::NotYetValid { .. } => "certificate_not_yet_valid",
            Self::Expired { .. } => "certificate_expired",
            Self::NotWhitelisted { .. } => "certificate_not_whitelisted",
            Self::InternalFault => "internal_error",
        }
    }

    /// HTTP status for this rejection.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoCertificate | Self::NotYetValid { .. } | Self::Expired { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotWhitelisted { .. } => StatusCode::FORBIDDEN,
            Self::InternalFault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authenticator
// ─────────────────────────────────────────────────────────────────────────────

/// Combines temporal validity, chain trust and whitelist membership into a
/// single admit / deny decision.
#[derive(Debug, Clone)]
pub struct Authenticator {
    whitelist: Arc<AllowListStore>,
}

impl Authenticator {
    /// Create an authenticator consulting `whitelist`.
    #[must_use]
    pub fn new(whitelist: Arc<AllowListStore>) -> Self {
        Self { whitelist }
    }

    /// The whitelist this authenticator consults.
    #[must_use]
    pub fn whitelist(&self) -> &Arc<AllowListStore> {
        &self.whitelist
    }

    /// Authenticate a raw DER certificate as handed over by the TLS layer.
    ///
    /// Parse failures become [`Rejection::InternalFault`].
    pub fn authenticate_der(
        &self,
        der: Option<&[u8]>,
        trust: &TrustSignal,
        now: DateTime<Utc>,
    ) -> Result<Identity, Rejection> {
        let Some(der) = der else {
            return self.authenticate(None, trust, now);
        };
        match PeerCertificate::from_der(der) {
            Ok(cert) => self.authenticate(Some(&cert), trust, now),
            Err(e) => {
                error!(error = %e, "Peer certificate introspection failed");
                Err(Rejection::InternalFault)
            }
        }
    }

    /// Authenticate an already parsed certificate.
    pub fn authenticate(
        &self,
        cert: Option<&PeerCertificate>,
        trust: &TrustSignal,
        now: DateTime<Utc>,
    ) -> Result<Identity, Rejection> {
        let cert = match cert {
            Some(cert) if cert.has_subject => cert,
            _ => {
                debug!("No client certificate presented");
                return Err(Rejection::NoCertificate);
            }
        };

        match validate(cert, now) {
            TemporalStatus::Valid => {}
            TemporalStatus::NotYetValid => {
                warn!(subject = %cert.subject, not_before = %cert.not_before, "Certificate not yet valid");
                return Err(Rejection::NotYetValid {
                    not_before: cert.not_before,
                });
            }
            TemporalStatus::Expired => {
                warn!(subject = %cert.subject, not_after = %cert.not_after, "Certificate expired");
                return Err(Rejection::Expired {
                    not_after: cert.not_after,
                });
            }
        }

        // Chain failures are deferred to the whitelist.
        if !trust.authorized {
            warn!(
                subject = %cert.subject,
                error = trust.authorization_error.as_deref().unwrap_or("unknown"),
                "Certificate chain not trusted, deferring to whitelist"
            );
        }

        let document = self.whitelist.snapshot();
        let fingerprint = select_fingerprint(cert, document.hash_algorithm);
        let decision = document.check(&fingerprint);
        if !decision.allowed {
            warn!(
                subject = %cert.subject,
                fingerprint = %fingerprint,
                reason = %decision.reason,
                "Certificate rejected by whitelist"
            );
            return Err(Rejection::NotWhitelisted {
                reason: decision.reason,
            });
        }

        debug!(subject = %cert.subject, reason = %decision.reason, "Certificate admitted");
        Ok(Identity::from_certificate(cert, fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtls::certificate::{DistinguishedName, Fingerprints};
    use chrono::{Duration, TimeZone};
    use std::fs;

    const SHA1: &str = "AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99:AA:BB:CC:99";
    const SHA256: &str = "12:34:56:78:9A:BC:DE:F0:12:34:56:78:9A:BC:DE:F0:12:34:56:78:9A:BC:DE:F0:12:34:56:78:9A:BC:DE:F0";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn cert() -> PeerCertificate {
        PeerCertificate {
            subject: DistinguishedName {
                common_name: Some("client-1".into()),
                ..Default::default()
            },
            issuer: DistinguishedName {
                common_name: Some("Example CA".into()),
                ..Default::default()
            },
            has_subject: true,
            serial_number: "01".into(),
            not_before: now() - Duration::days(30),
            not_after: now() + Duration::days(30),
            fingerprints: Fingerprints {
                sha1: Some(SHA1.into()),
                sha256: Some(SHA256.into()),
            },
        }
    }

    /// Authenticator over a whitelist file with the given JSON; the tempdir
    /// must outlive the authenticator's first lookup.
    fn authenticator(json: &str) -> (tempfile::TempDir, Authenticator) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitelist.json");
        fs::write(&path, json).unwrap();
        let store = Arc::new(AllowListStore::new(path));
        store.load();
        (dir, Authenticator::new(store))
    }

    fn whitelist_json(enabled: bool, algorithm: &str, fingerprint: &str) -> String {
        format!(
            r#"{{"whitelistEnabled": {enabled}, "hashAlgorithm": "{algorithm}",
                "whitelistedCertificates": [{{"fingerprint": "{fingerprint}", "description": "client-1", "enabled": true}}]}}"#
        )
    }

    #[test]
    fn whitelisted_certificate_is_admitted() {
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha1", SHA1));
        let id = auth
            .authenticate(Some(&cert()), &TrustSignal::authorized(), now())
            .unwrap();
        assert!(id.authenticated);
        assert_eq!(id.fingerprint, SHA1);
        assert_eq!(id.subject.common_name.as_deref(), Some("client-1"));
    }

    #[test]
    fn missing_certificate_is_rejected() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let err = auth
            .authenticate(None, &TrustSignal::default(), now())
            .unwrap_err();
        assert_eq!(err, Rejection::NoCertificate);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "certificate required");
    }

    #[test]
    fn empty_subject_is_rejected_even_when_whitelisted() {
        // GIVEN: fingerprint is whitelisted but the subject is empty
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha1", SHA1));
        let mut c = cert();
        c.subject = DistinguishedName::default();
        c.has_subject = false;
        // THEN: treated as no certificate
        let err = auth
            .authenticate(Some(&c), &TrustSignal::authorized(), now())
            .unwrap_err();
        assert_eq!(err, Rejection::NoCertificate);
    }

    #[test]
    fn expired_certificate_is_rejected_with_bound() {
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha1", SHA1));
        let c = cert();
        let later = c.not_after + Duration::seconds(1);
        let err = auth
            .authenticate(Some(&c), &TrustSignal::authorized(), later)
            .unwrap_err();
        assert_eq!(err, Rejection::Expired { not_after: c.not_after });
        assert!(err.to_string().contains(&c.not_after.to_string()));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn not_yet_valid_certificate_is_rejected_with_bound() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let c = cert();
        let earlier = c.not_before - Duration::seconds(1);
        let err = auth
            .authenticate(Some(&c), &TrustSignal::authorized(), earlier)
            .unwrap_err();
        assert_eq!(err, Rejection::NotYetValid { not_before: c.not_before });
    }

    #[test]
    fn temporal_check_runs_before_whitelist() {
        // GIVEN: a disabled whitelist that would admit anything
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let c = cert();
        // THEN: expiry still wins
        let err = auth
            .authenticate(Some(&c), &TrustSignal::authorized(), c.not_after + Duration::days(1))
            .unwrap_err();
        assert_eq!(err.kind(), "certificate_expired");
    }

    #[test]
    fn unknown_fingerprint_is_forbidden() {
        let (_dir, auth) = authenticator(&whitelist_json(
            true,
            "sha1",
            "FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:FF:00",
        ));
        let err = auth
            .authenticate(Some(&cert()), &TrustSignal::authorized(), now())
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        match err {
            Rejection::NotWhitelisted { reason } => {
                assert!(reason.contains("not found"));
                assert!(reason.contains(SHA1));
            }
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn untrusted_chain_is_deferred_to_whitelist() {
        // GIVEN: the TLS layer rejected the chain but the whitelist lists the cert
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha1", SHA1));
        let trust = TrustSignal::unauthorized("UnknownIssuer");
        // THEN: admitted (chain verdict is advisory)
        assert!(auth.authenticate(Some(&cert()), &trust, now()).is_ok());
    }

    #[test]
    fn untrusted_chain_not_whitelisted_is_forbidden() {
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha1", "00:00"));
        let trust = TrustSignal::unauthorized("UnknownIssuer");
        let err = auth.authenticate(Some(&cert()), &trust, now()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn algorithm_switch_changes_compared_digest() {
        // GIVEN: document keyed by SHA-256 holding the cert's SHA-1 value
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha256", SHA1));
        // THEN: SHA-1 value does not satisfy a SHA-256 document
        assert!(
            auth.authenticate(Some(&cert()), &TrustSignal::authorized(), now())
                .is_err()
        );

        let (_dir, auth) = authenticator(&whitelist_json(true, "sha256", SHA256));
        let id = auth
            .authenticate(Some(&cert()), &TrustSignal::authorized(), now())
            .unwrap();
        assert_eq!(id.fingerprint, SHA256);
    }

    #[test]
    fn disabled_whitelist_admits_any_valid_certificate() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", "00:00"));
        assert!(
            auth.authenticate(Some(&cert()), &TrustSignal::authorized(), now())
                .is_ok()
        );
    }

    #[test]
    fn missing_digest_is_denied_not_faulted() {
        let (_dir, auth) = authenticator(&whitelist_json(true, "sha256", SHA256));
        let mut c = cert();
        c.fingerprints.sha256 = None;
        let err = auth
            .authenticate(Some(&c), &TrustSignal::authorized(), now())
            .unwrap_err();
        assert_eq!(err.kind(), "certificate_not_whitelisted");
    }

    #[test]
    fn unparseable_der_is_internal_fault() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let err = auth
            .authenticate_der(Some(b"garbage".as_slice()), &TrustSignal::authorized(), now())
            .unwrap_err();
        assert_eq!(err, Rejection::InternalFault);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // generic message, nothing from the parser
        assert_eq!(err.to_string(), "internal error while authenticating certificate");
    }

    #[test]
    fn absent_der_is_no_certificate() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let err = auth
            .authenticate_der(None, &TrustSignal::default(), now())
            .unwrap_err();
        assert_eq!(err, Rejection::NoCertificate);
    }

    fn self_signed_der(dn: Vec<(rcgen::DnType, rcgen::DnValue)>) -> Vec<u8> {
        let mut params = rcgen::CertificateParams::new(vec!["client.local".to_string()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        for (ty, value) in dn {
            params.distinguished_name.push(ty, value);
        }
        params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        params.not_after = rcgen::date_time_ymd(2034, 1, 1);
        let key = rcgen::KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }

    #[test]
    fn bmp_encoded_subject_is_admitted() {
        // GIVEN: whitelist off and a CN stored as BMPString
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let cn = rcgen::string::BmpString::try_from("client-bmp").unwrap();
        let der = self_signed_der(vec![(rcgen::DnType::CommonName, rcgen::DnValue::BmpString(cn))]);
        // THEN: the subject is read, not mistaken for a missing certificate
        let id = auth
            .authenticate_der(Some(der.as_slice()), &TrustSignal::default(), now())
            .unwrap();
        assert_eq!(id.subject.common_name.as_deref(), Some("client-bmp"));
    }

    #[test]
    fn subject_with_only_untracked_attributes_is_admitted() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let domain_component = rcgen::DnType::CustomDnType(vec![0, 9, 2342, 19_200_300, 100, 1, 25]);
        let der = self_signed_der(vec![(domain_component, "example".into())]);
        let id = auth
            .authenticate_der(Some(der.as_slice()), &TrustSignal::default(), now())
            .unwrap();
        assert!(id.authenticated);
        assert!(id.subject.is_empty());
    }

    #[test]
    fn certificate_with_empty_subject_is_no_certificate() {
        let (_dir, auth) = authenticator(&whitelist_json(false, "sha1", SHA1));
        let der = self_signed_der(Vec::new());
        let err = auth
            .authenticate_der(Some(der.as_slice()), &TrustSignal::default(), now())
            .unwrap_err();
        assert_eq!(err, Rejection::NoCertificate);
    }
}
