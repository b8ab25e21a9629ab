//! Wire-format types for the CA REST API
//!
//! Field names follow the CertCenter API exactly; the payloads are passed
//! through without interpretation beyond what issuance needs.

use serde::{Deserialize, Serialize};

/// OAuth2 client-credentials token request
#[derive(Debug, Serialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the token in seconds
    pub expires_in: i64,
}

/// `ValidateName` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidateNameRequest {
    pub common_name: String,
}

/// `ValidateName` response body
#[derive(Debug, Deserialize)]
pub struct ValidateNameResponse {
    pub success: bool,
    #[serde(rename = "IsQualified", default)]
    pub is_qualified: bool,
}

/// `DNSData` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DnsDataRequest {
    #[serde(rename = "CSR")]
    pub csr: String,
    pub product_code: String,
}

/// `DNSData` response body
#[derive(Debug, Deserialize)]
pub struct DnsDataResponse {
    #[serde(rename = "DNSAuthDetails")]
    pub dns_auth_details: DnsAuthDetails,
}

/// DNS challenge details returned by the CA
#[derive(Debug, Clone, Deserialize)]
pub struct DnsAuthDetails {
    /// Opaque challenge value to publish as a TXT record
    #[serde(rename = "DNSValue")]
    pub dns_value: String,

    /// Example record line the CA suggests, when provided
    #[serde(rename = "Example", default)]
    pub example: Option<String>,
}

/// `Order` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderRequest {
    pub order_parameters: OrderParameters,
}

/// Parameters of a certificate order
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderParameters {
    pub product_code: String,
    #[serde(rename = "CSR")]
    pub csr: String,
    pub validity_period: u32,
    #[serde(rename = "DVAuthMethod")]
    pub dv_auth_method: String,
}

/// `Order` response body
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    #[serde(rename = "Fulfillment")]
    pub fulfillment: Option<Fulfillment>,
}

/// Issued certificate material returned by the CA
#[derive(Debug, Clone, Deserialize)]
pub struct Fulfillment {
    #[serde(rename = "Certificate")]
    pub certificate: String,

    #[serde(rename = "Intermediate")]
    pub intermediate: String,

    #[serde(rename = "Certificate_PKCS7", default)]
    pub pkcs7: Option<String>,

    /// Certificate expiration date as reported by the CA
    #[serde(rename = "EndDate")]
    pub end_date: String,
}
