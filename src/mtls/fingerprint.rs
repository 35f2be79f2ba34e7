//! Fingerprint selection by configured hash algorithm.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::certificate::PeerCertificate;

/// Digest algorithm the whitelist is keyed by.
///
/// Deserialises from any string: `"sha256"` (case-insensitive) selects
/// SHA-256, everything else falls back to SHA-1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HashAlgorithm {
    /// SHA-1 (default).
    #[default]
    Sha1,
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Lowercase name as written in the whitelist document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl From<&str> for HashAlgorithm {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("sha256") {
            Self::Sha256
        } else {
            Self::Sha1
        }
    }
}

impl From<String> for HashAlgorithm {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<HashAlgorithm> for String {
    fn from(alg: HashAlgorithm) -> Self {
        alg.as_str().to_string()
    }
}

impl fmt::Display for HashAlgorithm {
    /// Uppercase label used in denial reasons (`SHA1`, `SHA256`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Pick the fingerprint of `cert` that the whitelist compares against.
///
/// Returns an empty string when the certificate lacks the requested digest.
/// An empty fingerprint never matches a whitelist entry, so the lookup
/// degrades to a denial.
#[must_use]
pub fn select_fingerprint(cert: &PeerCertificate, algorithm: HashAlgorithm) -> String {
    let digest = match algorithm {
        HashAlgorithm::Sha256 => cert.fingerprints.sha256.as_ref(),
        HashAlgorithm::Sha1 => cert.fingerprints.sha1.as_ref(),
    };
    digest.cloned().unwrap_or_default()
}
