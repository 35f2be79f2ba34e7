//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Mutual TLS certificate gateway with a hot-reloadable fingerprint whitelist
#[derive(Parser, Debug)]
#[command(name = "cert-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CERT_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CERT_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "CERT_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "CERT_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "CERT_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Parse a whitelist document and print a summary
    CheckWhitelist {
        /// Whitelist JSON file (defaults to `whitelist.path` from the config)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print subject and fingerprints of the certificates in a PEM file
    Fingerprint {
        /// PEM file holding one or more certificates
        #[arg(required = true)]
        cert: PathBuf,
    },
}
