//! Bounded polling of public DNS for the challenge TXT record
//!
//! The CA validates domain control by looking up a TXT record on the subject
//! FQDN itself. Before requesting issuance we poll public resolvers until
//! that record is visible, then compare it byte-for-byte against the
//! challenge value. A visible record with the wrong value is a terminal
//! failure, not a reason to keep polling.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::PropagationSettings;

/// Errors that can occur during propagation checking
#[derive(Debug, Error)]
pub enum DnsCheckError {
    /// Resolver could not be constructed
    #[error("Invalid resolver configuration: {0}")]
    Configuration(String),

    /// DNS lookup failed for a reason other than "record not found"
    #[error("DNS lookup failed for '{record}': {message}")]
    Lookup { record: String, message: String },

    /// The record is visible but carries an unexpected value
    #[error("TXT record for '{record}' does not match the challenge value (found: {found:?})")]
    ValueMismatch { record: String, found: Vec<String> },

    /// The record never became visible within the configured timeout
    #[error("TXT record for '{record}' not visible after {waited_secs}s")]
    Timeout { record: String, waited_secs: u64 },
}

/// Configuration for propagation checking
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Delay before first check (allows DNS to start propagating)
    pub initial_delay: Duration,
    /// Interval between checks
    pub check_interval: Duration,
    /// Maximum time to wait for the record to appear
    pub timeout: Duration,
    /// Nameservers to query
    pub nameservers: Vec<IpAddr>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            check_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(1800),
            nameservers: vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))],
        }
    }
}

impl From<&PropagationSettings> for PropagationConfig {
    fn from(settings: &PropagationSettings) -> Self {
        Self {
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            check_interval: Duration::from_secs(settings.check_interval_secs),
            timeout: Duration::from_secs(settings.timeout_secs),
            nameservers: settings.nameservers.clone(),
        }
    }
}

/// TXT record resolution seam
///
/// `Ok` with an empty vec means the record is not visible yet (NXDOMAIN or
/// an empty answer); errors are reserved for lookup infrastructure failures.
#[async_trait]
pub trait TxtLookup: Send + Sync + std::fmt::Debug {
    /// Look up all TXT values published at `name`
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsCheckError>;
}

/// TXT lookup against public resolvers via UDP, with caching disabled
#[derive(Debug)]
pub struct PublicDnsLookup {
    resolver: TokioResolver,
}

impl PublicDnsLookup {
    /// Create a lookup querying the given nameservers
    pub fn new(nameservers: &[IpAddr]) -> Result<Self, DnsCheckError> {
        if nameservers.is_empty() {
            return Err(DnsCheckError::Configuration(
                "at least one nameserver is required".to_string(),
            ));
        }

        let mut resolver_config = ResolverConfig::new();
        for ip in nameservers {
            resolver_config
                .add_name_server(NameServerConfig::new(SocketAddr::new(*ip, 53), Protocol::Udp));
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 3;
        opts.cache_size = 0; // Disable caching for propagation checks

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl TxtLookup for PublicDnsLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsCheckError> {
        match self.resolver.txt_lookup(name).await {
            Ok(records) => {
                let values = records
                    .iter()
                    .map(|record| {
                        // TXT records can have multiple strings, join them
                        record
                            .txt_data()
                            .iter()
                            .map(|data| String::from_utf8_lossy(data))
                            .collect::<String>()
                    })
                    .collect();
                Ok(values)
            }
            Err(e) => {
                // NXDOMAIN or NOERROR with no records is expected while the
                // record is propagating
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("no records found")
                    || err_str.contains("nxdomain")
                    || err_str.contains("record not found")
                {
                    Ok(Vec::new())
                } else {
                    Err(DnsCheckError::Lookup {
                        record: name.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

/// Polls DNS until the challenge TXT record is visible and matches
#[derive(Debug)]
pub struct PropagationChecker {
    config: PropagationConfig,
    lookup: Arc<dyn TxtLookup>,
}

impl PropagationChecker {
    /// Create a checker that queries the configured public nameservers
    pub fn new(config: PropagationConfig) -> Result<Self, DnsCheckError> {
        let lookup = Arc::new(PublicDnsLookup::new(&config.nameservers)?);
        Ok(Self { config, lookup })
    }

    /// Create a checker with a custom lookup implementation
    pub fn with_lookup(config: PropagationConfig, lookup: Arc<dyn TxtLookup>) -> Self {
        Self { config, lookup }
    }

    /// Get the configuration
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Wait until a TXT record at `fqdn` equals `expected`
    ///
    /// Returns `Ok(())` once a matching record is observed. Fails with
    /// [`DnsCheckError::ValueMismatch`] as soon as records are visible but
    /// none of them match, and with [`DnsCheckError::Timeout`] when the
    /// record never appears within the configured window. Transient lookup
    /// failures are logged and retried like a not-yet-visible record.
    pub async fn wait_for_match(&self, fqdn: &str, expected: &str) -> Result<(), DnsCheckError> {
        let start = Instant::now();
        let deadline = start + self.config.timeout;

        debug!(
            record = %fqdn,
            timeout_secs = self.config.timeout.as_secs(),
            "Waiting for DNS propagation"
        );

        tokio::time::sleep(self.config.initial_delay).await;

        loop {
            match self.lookup.lookup_txt(fqdn).await {
                Ok(values) if values.is_empty() => {
                    trace!(record = %fqdn, "Record not yet visible");
                }
                Ok(values) => {
                    if values.iter().any(|v| v == expected) {
                        debug!(
                            record = %fqdn,
                            elapsed_secs = start.elapsed().as_secs(),
                            "DNS propagation confirmed, challenge value matches"
                        );
                        return Ok(());
                    }
                    return Err(DnsCheckError::ValueMismatch {
                        record: fqdn.to_string(),
                        found: values,
                    });
                }
                Err(e) => {
                    warn!(record = %fqdn, error = %e, "DNS lookup error");
                }
            }

            if Instant::now() > deadline {
                return Err(DnsCheckError::Timeout {
                    record: fqdn.to_string(),
                    waited_secs: self.config.timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.config.check_interval).await;
        }
    }
}
