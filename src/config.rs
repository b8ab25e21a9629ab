//! Configuration loading and validation
//!
//! All settings live in a single TOML file passed on the command line. The
//! parsed [`Config`] is handed explicitly to every component; there is no
//! global state.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or is missing required keys
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Config value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Certificate authority account and API settings
    pub ca: CaConfig,

    /// DNS propagation poll settings
    #[serde(default)]
    pub propagation: PropagationSettings,
}

/// CA account and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaConfig {
    /// OAuth2 client id for the CA account
    pub client_id: String,

    /// OAuth2 client secret for the CA account
    pub client_secret: String,

    /// Product code identifying the certificate product to order
    pub product_code: String,

    /// Certificate validity period in days (1-365), overridable with --days
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,

    /// Base URL of the CA REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// OAuth2 token scope
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Path of the on-disk token cache
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,

    /// Timeout for individual API requests
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

/// DNS propagation poll settings
///
/// The poll is bounded: once `timeout_secs` elapses without the TXT record
/// becoming visible, the run fails instead of waiting forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationSettings {
    /// Delay before the first lookup (allows DNS to start propagating)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Interval between lookups
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Maximum time to wait for the record to appear
    #[serde(default = "default_propagation_timeout")]
    pub timeout_secs: u64,

    /// Public nameservers to query
    #[serde(default = "default_nameservers")]
    pub nameservers: Vec<IpAddr>,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            check_interval_secs: default_check_interval(),
            timeout_secs: default_propagation_timeout(),
            nameservers: default_nameservers(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Validate the configuration
    ///
    /// Checks that credentials and the product code are present and that the
    /// validity period is within the range the CA accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ca.client_id.is_empty() {
            return Err(ConfigError::Invalid(
                "ca.client_id is not set in the config file".to_string(),
            ));
        }
        if self.ca.client_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "ca.client_secret is not set in the config file".to_string(),
            ));
        }
        if self.ca.product_code.is_empty() {
            return Err(ConfigError::Invalid(
                "ca.product_code is not set in the config file".to_string(),
            ));
        }
        validate_validity_days(self.ca.validity_days)?;

        if self.propagation.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "propagation.check_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.propagation.nameservers.is_empty() {
            return Err(ConfigError::Invalid(
                "propagation.nameservers must list at least one resolver".to_string(),
            ));
        }

        Ok(())
    }
}

impl CaConfig {
    /// URL of the OAuth2 token endpoint
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.api_base.trim_end_matches('/'))
    }
}

/// Check a validity period against the range the CA accepts (1-365 days)
pub fn validate_validity_days(days: u32) -> Result<(), ConfigError> {
    if !(1..=365).contains(&days) {
        return Err(ConfigError::Invalid(format!(
            "validity period must be between 1 and 365 days, got {}",
            days
        )));
    }
    Ok(())
}

fn default_validity_days() -> u32 {
    365
}

fn default_api_base() -> String {
    "https://api.certcenter.com".to_string()
}

fn default_scope() -> String {
    "order".to_string()
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_api_timeout() -> u64 {
    30
}

fn default_initial_delay() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    30
}

fn default_propagation_timeout() -> u64 {
    1800
}

fn default_nameservers() -> Vec<IpAddr> {
    vec![IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8))]
}
