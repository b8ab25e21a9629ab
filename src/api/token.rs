//! OAuth2 token handling with an on-disk cache
//!
//! The CA issues short-lived bearer tokens via the client-credentials grant.
//! Tokens are cached in a JSON file next to the tool so consecutive runs skip
//! the token endpoint while the cached token is still fresh.

use std::fs;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CaConfig;
use crate::error::{ApiError, StorageError};

use super::types::{TokenRequest, TokenResponse};

/// A cached token must outlive the current moment by this margin to be reused
const EXPIRY_SLACK_SECS: i64 = 30;

/// Access token record persisted to the cache file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    /// Bearer token value
    pub access_token: String,
    /// When the token expires
    pub expires_at: DateTime<Utc>,
    /// Token endpoint that issued this token
    pub host: String,
}

impl CachedToken {
    /// Whether the token is still usable at `now`, with slack for the
    /// requests that will be made with it
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_SLACK_SECS) < self.expires_at
    }
}

/// Obtains access tokens, reusing the on-disk cache when possible
#[derive(Debug)]
pub struct TokenManager {
    client: Client,
    config: CaConfig,
}

impl TokenManager {
    /// Create a token manager for the given CA account
    pub fn new(config: &CaConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ApiError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Return a valid access token
    ///
    /// Uses the cached token when it was issued by the configured endpoint
    /// and expires more than 30 seconds from now; otherwise requests a new
    /// token and rewrites the cache.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        let endpoint = self.config.token_endpoint();

        if let Some(cached) = self.load_cache()? {
            if cached.host == endpoint && cached.is_fresh(Utc::now()) {
                debug!(expires_at = %cached.expires_at, "Using cached access token");
                return Ok(cached.access_token);
            }
            debug!(
                expires_at = %cached.expires_at,
                host = %cached.host,
                "Cached access token is expired or from a different endpoint"
            );
        }

        info!(endpoint = %endpoint, "Requesting new access token");

        let request = TokenRequest {
            grant_type: "client_credentials".to_string(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            scope: self.config.scope.clone(),
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.api_timeout_secs))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Credentials(format!("HTTP {} - {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("token response: {}", e)))?;

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
            host: endpoint,
        };
        self.save_cache(&cached)?;

        info!(expires_at = %cached.expires_at, "Access token acquired and cached");
        Ok(token.access_token)
    }

    /// Load the cached token, if the cache file exists
    fn load_cache(&self) -> Result<Option<CachedToken>, StorageError> {
        let path = &self.config.token_cache;
        if !path.exists() {
            debug!(path = %path.display(), "No token cache file");
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let cached: CachedToken = serde_json::from_str(&content)?;
        Ok(Some(cached))
    }

    /// Write the token cache with owner-only permissions
    fn save_cache(&self, token: &CachedToken) -> Result<(), StorageError> {
        let path = &self.config.token_cache;
        let content = serde_json::to_string_pretty(token)?;
        fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
                warn!(path = %path.display(), error = %e, "Failed to restrict token cache permissions");
            }
        }

        Ok(())
    }
}
