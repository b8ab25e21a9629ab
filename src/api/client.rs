//! Authenticated client for the CA REST API
//!
//! One method per endpoint used by the issuance pipeline: `ValidateName`,
//! `DNSData` and `Order`. All calls are bearer-authenticated POSTs with JSON
//! bodies.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CaConfig;
use crate::error::ApiError;

use super::types::{
    DnsAuthDetails, DnsDataRequest, DnsDataResponse, Fulfillment, OrderParameters, OrderRequest,
    OrderResponse, ValidateNameRequest, ValidateNameResponse,
};

/// Domain validation method requested for orders
const DV_AUTH_METHOD: &str = "DNS";

/// Client for the CA REST API
#[derive(Debug)]
pub struct CaClient {
    client: Client,
    config: CaConfig,
    access_token: String,
}

impl CaClient {
    /// Create a client using the given access token
    pub fn new(config: &CaConfig, access_token: String) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ApiError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            access_token,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.api_base.trim_end_matches('/'),
            name
        )
    }

    async fn post<T: Serialize>(&self, name: &str, body: &T) -> Result<Response, ApiError> {
        self.client
            .post(self.endpoint(name))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.api_timeout_secs))
    }

    /// Validate that the subject FQDN is eligible for issuance
    pub async fn validate_name(&self, fqdn: &str) -> Result<(), ApiError> {
        debug!(fqdn = %fqdn, "Validating subject name");

        let response = self
            .post(
                "ValidateName",
                &ValidateNameRequest {
                    common_name: fqdn.to_string(),
                },
            )
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ValidateNameResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Decode(format!("ValidateName response: {}", e)))?;

        if !parsed.success {
            return Err(ApiError::Authorization(body));
        }
        if !parsed.is_qualified {
            return Err(ApiError::NotQualified {
                domain: fqdn.to_string(),
            });
        }

        info!(fqdn = %fqdn, "Domain qualified for issuance");
        Ok(())
    }

    /// Fetch the DNS TXT challenge value for the CSR
    pub async fn dns_challenge(&self, csr: &str) -> Result<DnsAuthDetails, ApiError> {
        debug!("Fetching DNS validation data");

        let response = self
            .post(
                "DNSData",
                &DnsDataRequest {
                    csr: csr.to_string(),
                    product_code: self.config.product_code.clone(),
                },
            )
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DnsDataResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Decode(format!("DNSData response: {}", e)))?;

        info!("Received DNS challenge value");
        Ok(parsed.dns_auth_details)
    }

    /// Request the certificate once the challenge record has propagated
    pub async fn order(&self, csr: &str, validity_days: u32) -> Result<Fulfillment, ApiError> {
        info!(
            product_code = %self.config.product_code,
            validity_days,
            "Requesting certificate"
        );

        let response = self
            .post(
                "Order",
                &OrderRequest {
                    order_parameters: OrderParameters {
                        product_code: self.config.product_code.clone(),
                        csr: csr.to_string(),
                        validity_period: validity_days,
                        dv_auth_method: DV_AUTH_METHOD.to_string(),
                    },
                },
            )
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OrderResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Decode(format!("Order response: {}", e)))?;

        if !parsed.success {
            return Err(ApiError::OrderRejected(body));
        }

        let fulfillment = parsed
            .fulfillment
            .ok_or_else(|| ApiError::Decode("Order response has no Fulfillment".to_string()))?;

        info!(expires = %fulfillment.end_date, "Certificate request successful");
        Ok(fulfillment)
    }
}
