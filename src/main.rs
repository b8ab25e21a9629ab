//! dvcert - Main entry point
//!
//! Requests a domain-validated certificate from the CA: token, name
//! validation, DNS challenge, propagation check, order, PEM export.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dvcert::config::{validate_validity_days, Config};
use dvcert::dns::{PropagationChecker, PropagationConfig};
use dvcert::output::{write_certificate_files, IssuedCertificate};
use dvcert::{CaClient, TokenManager};

/// dvcert - request a domain-validated TLS certificate via DNS challenge
#[derive(Parser, Debug)]
#[command(name = "dvcert")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subject FQDN to issue the certificate for
    #[arg(short = 'f', long = "fqdn")]
    fqdn: String,

    /// Path of the PKCS#10 CSR file (PEM)
    #[arg(short = 'c', long = "csr")]
    csr: PathBuf,

    /// Certificate validity in days, 1-365 (defaults to the config value)
    #[arg(short = 'd', long = "days")]
    days: Option<u32>,

    /// Directory the PEM files are written to
    #[arg(short = 'o', long = "output", default_value = ".")]
    output: PathBuf,

    /// Configuration file path
    #[arg(long = "config", env = "DVCERT_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "dvcert=debug" } else { "dvcert=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let config = Config::from_file(&cli.config).with_context(|| {
        format!("Failed to load configuration from '{}'", cli.config.display())
    })?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let validity_days = cli.days.unwrap_or(config.ca.validity_days);
    validate_validity_days(validity_days).context("Invalid --days value")?;

    let csr = std::fs::read_to_string(&cli.csr)
        .with_context(|| format!("Failed to read CSR file '{}'", cli.csr.display()))?;

    info!(fqdn = %cli.fqdn, "Obtaining access token");
    let token = TokenManager::new(&config.ca)?
        .access_token()
        .await
        .context("Failed to obtain access token")?;

    let client = CaClient::new(&config.ca, token)?;

    info!(fqdn = %cli.fqdn, "Validating domain with the CA");
    client
        .validate_name(&cli.fqdn)
        .await
        .context("Domain validation failed")?;

    let challenge = client
        .dns_challenge(&csr)
        .await
        .context("Failed to fetch DNS challenge value")?;

    println!("DNS TXT value for {}: {}", cli.fqdn, challenge.dns_value);
    if let Some(example) = &challenge.example {
        println!("Example record: {}", example);
    }
    wait_for_operator()?;

    info!(fqdn = %cli.fqdn, "Verifying DNS propagation");
    let checker = PropagationChecker::new(PropagationConfig::from(&config.propagation))
        .context("Failed to create DNS resolver")?;
    checker
        .wait_for_match(&cli.fqdn, &challenge.dns_value)
        .await
        .context("DNS challenge verification failed")?;

    let fulfillment = client
        .order(&csr, validity_days)
        .await
        .context("Certificate request failed")?;
    let issued = IssuedCertificate::from(fulfillment);

    let paths = write_certificate_files(&cli.output, &cli.fqdn, &issued)
        .context("Failed to write certificate files")?;

    println!("Certificate exported: {}", paths.certificate.display());
    println!("Chained certificate exported: {}", paths.chained.display());
    println!("Expiration: {}", issued.end_date);

    Ok(())
}

/// Block until the operator confirms the TXT record has been created
fn wait_for_operator() -> Result<()> {
    print!("Press Enter after the DNS record has been created... ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(())
}
