//! Error types for the certificate gateway

use std::io;

use thiserror::Error;

/// Result type alias for the certificate gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Certificate gateway errors
///
/// These cover start-up and plumbing failures (configuration, PEM files,
/// listener, watcher). Per-request authentication outcomes are reported
/// through [`crate::mtls::Rejection`] instead and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS setup error (certificate or key loading, verifier construction)
    #[error("TLS error: {0}")]
    Tls(String),

    /// Certificate could not be parsed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
