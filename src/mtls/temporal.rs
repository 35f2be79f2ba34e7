//! Certificate validity window check.

use chrono::{DateTime, Utc};

use super::certificate::PeerCertificate;

/// Outcome of checking a certificate against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalStatus {
    /// `not_before <= now <= not_after`.
    Valid,
    /// `now < not_before`.
    NotYetValid,
    /// `now > not_after`.
    Expired,
}

/// Check `cert` against `now`. Both bounds are inclusive.
#[must_use]
pub fn validate(cert: &PeerCertificate, now: DateTime<Utc>) -> TemporalStatus {
    if now < cert.not_before {
        TemporalStatus::NotYetValid
    } else if now > cert.not_after {
        TemporalStatus::Expired
    } else {
        TemporalStatus::Valid
    }
}
