//! Error types for API and storage operations

use std::io;

use thiserror::Error;

/// Errors that can occur talking to the CA REST API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the response body could not be read
    #[error("API request failed: {0}")]
    Request(String),

    /// Request timed out
    #[error("API request timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// Token endpoint rejected the client credentials
    #[error("Token request rejected; check ca.client_id and ca.client_secret in the config file ({0})")]
    Credentials(String),

    /// The API rejected the access token
    #[error("CA authorization failed; check access token: {0}")]
    Authorization(String),

    /// The subject name is not eligible for the requested product
    #[error("Domain '{domain}' is not qualified for issuance")]
    NotQualified { domain: String },

    /// The certificate order was rejected
    #[error("Certificate request failed: {0}")]
    OrderRejected(String),

    /// Non-success HTTP status with no more specific meaning
    #[error("Unexpected HTTP {status} from CA API: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode CA API response: {0}")]
    Decode(String),

    /// Token cache read/write failed
    #[error("Token cache error: {0}")]
    TokenCache(#[from] StorageError),
}

/// Errors specific to local file operations (token cache, PEM output)
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize/deserialize data
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl ApiError {
    /// Map a transport-level reqwest error, preserving timeouts
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            ApiError::Timeout {
                elapsed_secs: timeout_secs,
            }
        } else {
            ApiError::Request(e.to_string())
        }
    }
}
