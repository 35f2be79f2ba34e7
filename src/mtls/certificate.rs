//! Peer certificate model.
//!
//! Parses the DER-encoded client certificate handed over by the TLS layer
//! into a [`PeerCertificate`]: subject and issuer names, serial number,
//! validity window, and SHA-1 / SHA-256 fingerprints.
//!
//! Fingerprints use the canonical form `AA:BB:CC:...` (uppercase hex byte
//! pairs joined by colons). Whitelist comparisons normalise both sides with
//! [`normalize_fingerprint`] so they are effectively case-insensitive.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_parser::asn1_rs::Tag;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::x509::{AttributeTypeAndValue, X509Name};

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Distinguished name
// ─────────────────────────────────────────────────────────────────────────────

/// The handful of distinguished-name attributes the gateway consumes.
///
/// Serialises with the short X.500 attribute names (`CN`, `O`, ...), absent
/// attributes are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    /// Common Name (CN).
    #[serde(rename = "CN", default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,

    /// Organization (O).
    #[serde(rename = "O", default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Organizational Unit (OU).
    #[serde(rename = "OU", default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,

    /// Country (C).
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// State or province (ST).
    #[serde(rename = "ST", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Locality (L).
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
}

impl DistinguishedName {
    /// Returns `true` when none of the tracked attributes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes().next().is_none()
    }

    fn attributes(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("CN", &self.common_name),
            ("O", &self.organization),
            ("OU", &self.organizational_unit),
            ("C", &self.country),
            ("ST", &self.state),
            ("L", &self.locality),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    }

    fn from_x509(name: &X509Name<'_>) -> Self {
        Self {
            common_name: first_attr(name.iter_common_name()),
            organization: first_attr(name.iter_organization()),
            organizational_unit: first_attr(name.iter_organizational_unit()),
            country: first_attr(name.iter_country()),
            state: first_attr(name.iter_state_or_province()),
            locality: first_attr(name.iter_locality()),
        }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.attributes() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

fn first_attr<'a, 'b: 'a>(
    mut iter: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    iter.next().and_then(attr_text)
}

/// Decode a DirectoryString value, including the UCS-2 and UCS-4 variants
/// `as_str` leaves out.
fn attr_text(attr: &AttributeTypeAndValue<'_>) -> Option<String> {
    if let Ok(text) = attr.as_str() {
        return Some(text.to_owned());
    }

    let data = attr.as_slice();
    match attr.attr_value().tag() {
        Tag::BmpString if data.len() % 2 == 0 => {
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        Tag::UniversalString if data.len() % 4 == 0 => data
            .chunks_exact(4)
            .map(|c| char::from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fingerprints
// ─────────────────────────────────────────────────────────────────────────────

/// Certificate digests keyed by hash algorithm, in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprints {
    /// SHA-1 digest of the DER encoding.
    pub sha1: Option<String>,
    /// SHA-256 digest of the DER encoding.
    pub sha256: Option<String>,
}

impl Fingerprints {
    /// Compute both digests of a DER-encoded certificate.
    #[must_use]
    pub fn of_der(der: &[u8]) -> Self {
        Self {
            sha1: Some(format_fingerprint(&Sha1::digest(der))),
            sha256: Some(format_fingerprint(&Sha256::digest(der))),
        }
    }
}

/// Render digest bytes as `AA:BB:CC:...`.
#[must_use]
pub fn format_fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Bring a user-supplied fingerprint into canonical form for comparison.
#[must_use]
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint.trim().to_ascii_uppercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Peer certificate
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed client certificate, read-only for the lifetime of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Subject distinguished name.
    pub subject: DistinguishedName,
    /// Issuer distinguished name.
    pub issuer: DistinguishedName,
    /// Whether the raw subject carries any attribute at all, tracked or not.
    pub has_subject: bool,
    /// Serial number as uppercase hex.
    pub serial_number: String,
    /// Start of the validity window.
    pub not_before: DateTime<Utc>,
    /// End of the validity window.
    pub not_after: DateTime<Utc>,
    /// Digests of the DER encoding.
    pub fingerprints: Fingerprints,
}

impl PeerCertificate {
    /// Parse a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if the DER cannot be parsed or carries a
    /// validity timestamp outside the representable range.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("Failed to parse peer certificate: {e}")))?;

        let validity = cert.validity();
        let not_before = to_utc(validity.not_before.timestamp(), "notBefore")?;
        let not_after = to_utc(validity.not_after.timestamp(), "notAfter")?;

        Ok(Self {
            subject: DistinguishedName::from_x509(cert.subject()),
            issuer: DistinguishedName::from_x509(cert.issuer()),
            has_subject: cert.subject().iter_attributes().next().is_some(),
            serial_number: hex::encode_upper(cert.raw_serial()),
            not_before,
            not_after,
            fingerprints: Fingerprints::of_der(der),
        })
    }
}

fn to_utc(timestamp: i64, field: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| Error::Certificate(format!("{field} out of range: {timestamp}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Trust signal
// ─────────────────────────────────────────────────────────────────────────────

/// Chain-of-trust verdict reported by the TLS layer for one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustSignal {
    /// `true` when the presented chain verified against the configured CA.
    pub authorized: bool,
    /// Why verification failed, when `authorized` is `false`.
    pub authorization_error: Option<String>,
}

impl TrustSignal {
    /// A verified chain.
    #[must_use]
    pub fn authorized() -> Self {
        Self {
            authorized: true,
            authorization_error: None,
        }
    }

    /// A rejected chain with the verifier's explanation.
    #[must_use]
    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self {
            authorized: false,
            authorization_error: Some(error.into()),
        }
    }
}
