//! Certificate Gateway Library
//!
//! Mutual TLS authentication gateway: a client presents a certificate during
//! the TLS handshake and the gateway decides whether to admit the request
//! based on certificate validity and membership in a hot-reloadable
//! fingerprint whitelist.
//!
//! # Features
//!
//! - **Deferred chain verdicts**: the TLS layer verifies handshake signatures
//!   and reports chain-of-trust status as a [`mtls::TrustSignal`]
//! - **Temporal checks**: inclusive not-before / not-after window
//! - **Fingerprint whitelist**: SHA-1 or SHA-256, reloadable without restart
//! - **Verified identity**: an immutable [`mtls::Identity`] is attached to
//!   every admitted request

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mtls;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`. `format` selects `json` output,
/// anything else is human-readable text.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
