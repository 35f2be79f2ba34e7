//! cert-gateway - mutual TLS certificate authentication gateway
//!
//! Admits clients by certificate validity and fingerprint whitelist.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use cert_gateway::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    mtls::{AllowListDocument, PeerCertificate, tls::load_certs},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command.take() {
        Some(Command::CheckWhitelist { path }) => run_check_whitelist(&cli, path),
        Some(Command::Fingerprint { cert }) => run_fingerprint(&cert),
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Load the config file (if any) with CLI overrides applied
fn load_config(cli: &Cli) -> Result<Config, cert_gateway::Error> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}

/// Parse a whitelist strictly and print what the gateway would enforce
fn run_check_whitelist(cli: &Cli, path: Option<PathBuf>) -> ExitCode {
    let path = match path {
        Some(p) => p,
        None => match load_config(cli) {
            Ok(config) => config.whitelist.path,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    let document = match AllowListDocument::from_file(&path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("❌ {}: {e}", path.display());
            eprintln!("   The gateway would fall back to a disabled whitelist.");
            return ExitCode::FAILURE;
        }
    };

    println!("✅ {}", path.display());
    println!("   Enabled:   {}", document.enabled);
    println!("   Algorithm: {}", document.hash_algorithm);
    println!(
        "   Entries:   {} ({} enabled)",
        document.entries.len(),
        document.enabled_entries()
    );
    for entry in &document.entries {
        let marker = if entry.enabled { "+" } else { "-" };
        println!("   {marker} {}  {}", entry.fingerprint, entry.description);
    }

    ExitCode::SUCCESS
}

/// Print the fingerprints a whitelist entry would need for each certificate
fn run_fingerprint(cert: &Path) -> ExitCode {
    let certs = match load_certs(&cert.to_string_lossy()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    for der in &certs {
        match PeerCertificate::from_der(der) {
            Ok(parsed) => {
                println!("Subject: {}", parsed.subject);
                println!("Issuer:  {}", parsed.issuer);
                println!("Serial:  {}", parsed.serial_number);
                println!("Valid:   {} .. {}", parsed.not_before, parsed.not_after);
                println!(
                    "SHA1:    {}",
                    parsed.fingerprints.sha1.as_deref().unwrap_or("-")
                );
                println!(
                    "SHA256:  {}",
                    parsed.fingerprints.sha256.as_deref().unwrap_or("-")
                );
                println!();
            }
            Err(e) => {
                eprintln!("❌ {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Run the gateway server
async fn run_server(cli: Cli) -> ExitCode {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        whitelist = %config.whitelist.path.display(),
        "Starting cert-gateway"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Run with graceful shutdown
    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
