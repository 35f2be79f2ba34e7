//! Verified client identity.
//!
//! Built once per admitted request from the validated [`PeerCertificate`]
//! and inserted into the request extensions. Handlers extract it with
//! `Extension<Identity>`; its absence means the request was not admitted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::certificate::{DistinguishedName, PeerCertificate};

/// Identity of an admitted client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Certificate subject.
    pub subject: DistinguishedName,
    /// Certificate issuer.
    pub issuer: DistinguishedName,
    /// Serial number, uppercase hex.
    pub serial_number: String,
    /// Fingerprint the whitelist decision was made on.
    pub fingerprint: String,
    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,
    /// End of the validity window.
    pub valid_to: DateTime<Utc>,
    /// Always `true`: an `Identity` only exists for admitted requests.
    pub authenticated: bool,
}

impl Identity {
    /// Copy the identifying fields out of `cert`.
    #[must_use]
    pub fn from_certificate(cert: &PeerCertificate, fingerprint: impl Into<String>) -> Self {
        Self {
            subject: cert.subject.clone(),
            issuer: cert.issuer.clone(),
            serial_number: cert.serial_number.clone(),
            fingerprint: fingerprint.into(),
            valid_from: cert.not_before,
            valid_to: cert.not_after,
            authenticated: true,
        }
    }

    /// Label for logs: the subject CN, else the full subject.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.subject
            .common_name
            .clone()
            .unwrap_or_else(|| self.subject.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtls::certificate::Fingerprints;
    use chrono::TimeZone;

    fn cert() -> PeerCertificate {
        PeerCertificate {
            subject: DistinguishedName {
                common_name: Some("client-1".into()),
                organization: Some("Example".into()),
                ..Default::default()
            },
            issuer: DistinguishedName {
                common_name: Some("Example CA".into()),
                ..Default::default()
            },
            has_subject: true,
            serial_number: "0A1B".into(),
            not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            fingerprints: Fingerprints {
                sha1: Some("11:22".into()),
                sha256: Some("33:44".into()),
            },
        }
    }

    #[test]
    fn copies_certificate_fields() {
        let source = cert();
        let id = Identity::from_certificate(&source, "11:22");
        assert_eq!(id.subject, source.subject);
        assert_eq!(id.issuer, source.issuer);
        assert_eq!(id.serial_number, "0A1B");
        assert_eq!(id.fingerprint, "11:22");
        assert_eq!(id.valid_from, source.not_before);
        assert_eq!(id.valid_to, source.not_after);
        assert!(id.authenticated);
        // source untouched
        assert_eq!(source, cert());
    }

    #[test]
    fn display_name_prefers_common_name() {
        let id = Identity::from_certificate(&cert(), "11:22");
        assert_eq!(id.display_name(), "client-1");
    }

    #[test]
    fn display_name_falls_back_to_subject() {
        let mut source = cert();
        source.subject.common_name = None;
        let id = Identity::from_certificate(&source, "11:22");
        assert_eq!(id.display_name(), "O=Example");
    }

    #[test]
    fn serialises_camel_case() {
        let json = serde_json::to_value(Identity::from_certificate(&cert(), "11:22")).unwrap();
        assert_eq!(json["serialNumber"], "0A1B");
        assert_eq!(json["subject"]["CN"], "client-1");
        assert_eq!(json["authenticated"], true);
        assert!(json.get("validFrom").is_some());
    }
}
