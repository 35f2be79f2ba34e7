//! Fingerprint whitelist: document model and reloadable store.
//!
//! The whitelist is a JSON document on disk:
//!
//! ```json
//! {
//!   "whitelistEnabled": true,
//!   "hashAlgorithm": "sha256",
//!   "whitelistedCertificates": [
//!     { "fingerprint": "AA:BB:...", "description": "client-1", "enabled": true }
//!   ]
//! }
//! ```
//!
//! # Fail-open
//!
//! A missing or malformed document installs [`AllowListDocument::disabled`],
//! which admits every certificate that passes the other checks. The failure
//! is logged and kept in [`AllowListStore::status`].
//!
//! # Concurrency
//!
//! [`AllowListStore`] keeps one `Arc<AllowListDocument>` behind a
//! `parking_lot::RwLock`. Lookups clone the `Arc` under a read lock; a reload
//! reads and parses the file first and only then swaps the pointer under the
//! write lock, so readers see either the old or the new document in full.
//! Whole loads are serialised by a separate mutex that lookups never touch,
//! so the last file read is always the one installed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::certificate::normalize_fingerprint;
use super::fingerprint::HashAlgorithm;
use crate::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// Whitelist verdict for one fingerprint. `reason` is always populated and
/// safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    /// Whether the fingerprint is admitted.
    pub allowed: bool,
    /// Human-readable explanation.
    pub reason: String,
}

impl AuthorizationDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

/// One whitelisted certificate.
///
/// `subject`, `organization` and `added_date` are descriptive only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllowListEntry {
    /// Fingerprint in `AA:BB:...` form, compared case-insensitively.
    pub fingerprint: String,
    /// Free text, reported as the admission reason.
    pub description: String,
    /// Disabled entries never match.
    pub enabled: bool,
    /// Subject the certificate was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Owning organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// When the entry was added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_date: Option<String>,
}

/// The whitelist document. Absent fields take the disabled defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListDocument {
    /// Ordered entries; the first enabled match wins.
    #[serde(rename = "whitelistedCertificates")]
    pub entries: Vec<AllowListEntry>,
    /// Global switch. `false` admits every fingerprint.
    #[serde(rename = "whitelistEnabled")]
    pub enabled: bool,
    /// Which certificate digest the entries hold.
    #[serde(rename = "hashAlgorithm")]
    pub hash_algorithm: HashAlgorithm,
}

impl AllowListDocument {
    /// The fail-open fallback: whitelist off, no entries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Parse a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a document from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Look up `fingerprint` in this document.
    #[must_use]
    pub fn check(&self, fingerprint: &str) -> AuthorizationDecision {
        if !self.enabled {
            return AuthorizationDecision::allow("disabled");
        }

        let wanted = normalize_fingerprint(fingerprint);
        if !wanted.is_empty() {
            let hit = self
                .entries
                .iter()
                .find(|e| e.enabled && normalize_fingerprint(&e.fingerprint) == wanted);
            if let Some(entry) = hit {
                let reason = if entry.description.is_empty() {
                    "whitelisted"
                } else {
                    entry.description.as_str()
                };
                return AuthorizationDecision::allow(reason);
            }
        }

        AuthorizationDecision::deny(format!(
            "fingerprint not found (using {}: {fingerprint})",
            self.hash_algorithm
        ))
    }

    /// Number of entries with `enabled == true`.
    #[must_use]
    pub fn enabled_entries(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of the store for the status endpoint and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct WhitelistStatus {
    /// Backing file.
    pub path: String,
    /// Whether the whitelist is enforced.
    pub enabled: bool,
    /// Digest the entries are compared against.
    pub hash_algorithm: HashAlgorithm,
    /// Total number of entries.
    pub entries: usize,
    /// Entries with `enabled == true`.
    pub enabled_entries: usize,
    /// Why the last load fell back to the disabled document.
    pub last_error: Option<String>,
    /// When the current document was installed.
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    document: Option<Arc<AllowListDocument>>,
    last_error: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

/// Process-wide whitelist with atomic reload.
#[derive(Debug)]
pub struct AllowListStore {
    path: PathBuf,
    state: RwLock<StoreState>,
    reload_guard: Mutex<()>,
}

impl AllowListStore {
    /// Create a store backed by `path`. Nothing is read until the first
    /// lookup or an explicit [`load`](Self::load).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(StoreState::default()),
            reload_guard: Mutex::new(()),
        }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the backing document and install it.
    ///
    /// On read or parse failure the disabled document is installed instead
    /// and the failure recorded. Never fails.
    pub fn load(&self) {
        let _reloading = self.reload_guard.lock();
        let (document, last_error) = match AllowListDocument::from_file(&self.path) {
            Ok(document) => {
                info!(
                    path = %self.path.display(),
                    enabled = document.enabled,
                    hash_algorithm = %document.hash_algorithm,
                    entries = document.entries.len(),
                    "Whitelist loaded"
                );
                (document, None)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Whitelist unavailable, falling back to disabled whitelist"
                );
                (AllowListDocument::disabled(), Some(e.to_string()))
            }
        };

        let mut state = self.state.write();
        state.document = Some(Arc::new(document));
        state.last_error = last_error;
        state.loaded_at = Some(Utc::now());
    }

    /// Same as [`load`](Self::load); safe to call while lookups are running.
    pub fn reload(&self) {
        debug!(path = %self.path.display(), "Reloading whitelist");
        self.load();
    }

    /// Current document, loading it first if nothing is installed yet.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AllowListDocument> {
        if let Some(document) = self.state.read().document.as_ref() {
            return Arc::clone(document);
        }
        self.load();
        self.state
            .read()
            .document
            .clone()
            .unwrap_or_else(|| Arc::new(AllowListDocument::disabled()))
    }

    /// Look up `fingerprint` in the current document.
    #[must_use]
    pub fn check(&self, fingerprint: &str) -> AuthorizationDecision {
        self.snapshot().check(fingerprint)
    }

    /// Describe the installed document.
    #[must_use]
    pub fn status(&self) -> WhitelistStatus {
        let fallback = self.snapshot();
        let state = self.state.read();
        let document = state.document.as_ref().unwrap_or(&fallback);
        WhitelistStatus {
            path: self.path.display().to_string(),
            enabled: document.enabled,
            hash_algorithm: document.hash_algorithm,
            entries: document.entries.len(),
            enabled_entries: document.enabled_entries(),
            last_error: state.last_error.clone(),
            loaded_at: state.loaded_at,
        }
    }
}
