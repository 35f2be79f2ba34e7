//! Configuration management
//!
//! Loaded from an optional YAML file merged with `CERT_GATEWAY_`-prefixed
//! environment variables (`__` separates nesting levels, e.g.
//! `CERT_GATEWAY_WHITELIST__PATH`).
//!
//! # Example YAML
//!
//! ```yaml
//! server:
//!   host: "0.0.0.0"
//!   port: 8443
//! tls:
//!   server_cert: "certs/server.crt"
//!   server_key: "certs/server.key"
//!   ca_cert: "certs/ca.crt"
//!   require_client_cert: false
//! whitelist:
//!   path: "config/whitelist.json"
//!   watch: true
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CERT_GATEWAY_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// TLS material
    pub tls: TlsConfig,
    /// Whitelist document
    pub whitelist: WhitelistConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
        }
    }
}

/// TLS material for the listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to the PEM-encoded server certificate (chain).
    pub server_cert: String,

    /// Path to the PEM-encoded server private key.
    pub server_key: String,

    /// Path to the PEM-encoded CA certificate client chains are checked against.
    pub ca_cert: String,

    /// Reject clients that present no certificate during the handshake.
    ///
    /// When `false` (default) such clients reach the gateway and receive
    /// `401 certificate required`.
    pub require_client_cert: bool,
}

/// Whitelist document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Path to the JSON whitelist document.
    pub path: PathBuf,
    /// Reload the document automatically when the file changes.
    pub watch: bool,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/whitelist.json"),
            watch: true,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Check that everything needed to serve is present.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing TLS path.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("tls.server_cert", &self.tls.server_cert),
            ("tls.server_key", &self.tls.server_key),
            ("tls.ca_cert", &self.tls.ca_cert),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must be set")));
            }
        }
        Ok(())
    }

    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .server
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host: {e}")))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}
