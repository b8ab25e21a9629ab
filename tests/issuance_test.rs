//! Integration tests for the issuance pipeline
//!
//! The CA REST API is mocked with wiremock; DNS lookups use a canned
//! [`TxtLookup`] implementation.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dvcert::api::{CachedToken, CaClient, TokenManager};
use dvcert::config::{CaConfig, Config};
use dvcert::dns::{DnsCheckError, PropagationChecker, PropagationConfig, TxtLookup};
use dvcert::error::ApiError;
use dvcert::output::{write_certificate_files, IssuedCertificate};

const TEST_CSR: &str = "-----BEGIN CERTIFICATE REQUEST-----\nMIIB\n-----END CERTIFICATE REQUEST-----";

/// Lookup that always returns the same TXT values
#[derive(Debug)]
struct StaticLookup(Vec<String>);

#[async_trait]
impl TxtLookup for StaticLookup {
    async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, DnsCheckError> {
        Ok(self.0.clone())
    }
}

fn ca_config(server: &MockServer, cache_dir: &TempDir) -> CaConfig {
    let config: Config = toml::from_str(&format!(
        r#"
        [ca]
        client_id = "test-client"
        client_secret = "test-secret"
        product_code = "AlwaysOnSSL.AlwaysOnSSL"
        api_base = "{}"
        "#,
        server.uri()
    ))
    .unwrap();

    let mut ca = config.ca;
    ca.token_cache = cache_dir.path().join("token.json");
    ca
}

fn fast_propagation() -> PropagationConfig {
    PropagationConfig {
        initial_delay: Duration::ZERO,
        check_interval: Duration::from_millis(5),
        timeout: Duration::from_millis(200),
        nameservers: vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))],
    }
}

fn seed_cache(ca: &CaConfig, token: &str, expires_in_secs: i64) {
    let cached = CachedToken {
        access_token: token.to_string(),
        expires_at: Utc::now() + TimeDelta::seconds(expires_in_secs),
        host: ca.token_endpoint(),
    };
    std::fs::write(&ca.token_cache, serde_json::to_string(&cached).unwrap()).unwrap();
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": token,
        "expires_in": 3600
    }))
}

// ============================================================================
// Token Manager Tests
// ============================================================================

mod token {
    use super::*;

    #[tokio::test]
    async fn test_new_token_is_fetched_and_cached() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": "test-client",
                "scope": "order"
            })))
            .respond_with(token_response("fresh-token"))
            .expect(1)
            .mount(&server)
            .await;

        let manager = TokenManager::new(&ca).unwrap();
        let token = manager.access_token().await.unwrap();
        assert_eq!(token, "fresh-token");

        // Cache file was written and points at the issuing endpoint
        let cached: CachedToken =
            serde_json::from_str(&std::fs::read_to_string(&ca.token_cache).unwrap()).unwrap();
        assert_eq!(cached.access_token, "fresh-token");
        assert_eq!(cached.host, ca.token_endpoint());
        assert!(cached.is_fresh(Utc::now()));

        // Second call reuses the cache; the expect(1) above would fail otherwise
        let again = manager.access_token().await.unwrap();
        assert_eq!(again, "fresh-token");
    }

    #[tokio::test]
    async fn test_fresh_cached_token_skips_network() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);
        seed_cache(&ca, "cached-token", 3600);

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_response("should-not-be-fetched"))
            .expect(0)
            .mount(&server)
            .await;

        let token = TokenManager::new(&ca).unwrap().access_token().await.unwrap();
        assert_eq!(token, "cached-token");
    }

    #[tokio::test]
    async fn test_expired_cached_token_is_replaced() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);
        // Expires within the 30s reuse slack
        seed_cache(&ca, "stale-token", 10);

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_response("replacement-token"))
            .expect(1)
            .mount(&server)
            .await;

        let token = TokenManager::new(&ca).unwrap().access_token().await.unwrap();
        assert_eq!(token, "replacement-token");

        let cached: CachedToken =
            serde_json::from_str(&std::fs::read_to_string(&ca.token_cache).unwrap()).unwrap();
        assert_eq!(cached.access_token, "replacement-token");
    }

    #[tokio::test]
    async fn test_token_from_other_endpoint_is_not_reused() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);

        let cached = CachedToken {
            access_token: "foreign-token".to_string(),
            expires_at: Utc::now() + TimeDelta::seconds(3600),
            host: "https://api.certcenter.com/oauth2/token".to_string(),
        };
        std::fs::write(&ca.token_cache, serde_json::to_string(&cached).unwrap()).unwrap();

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_response("local-token"))
            .expect(1)
            .mount(&server)
            .await;

        let token = TokenManager::new(&ca).unwrap().access_token().await.unwrap();
        assert_eq!(token, "local-token");
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = TokenManager::new(&ca).unwrap().access_token().await.unwrap_err();
        assert!(matches!(err, ApiError::Credentials(_)));
        assert!(err.to_string().contains("client_id"));
    }
}

// ============================================================================
// CA Client Tests
// ============================================================================

mod ca_client {
    use super::*;

    async fn client(server: &MockServer, cache_dir: &TempDir) -> CaClient {
        CaClient::new(&ca_config(server, cache_dir), "test-token".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_validate_name_qualified() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/ValidateName"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "CommonName": "host.example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "IsQualified": true
            })))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        client.validate_name("host.example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_name_rejected_token() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/ValidateName"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "Message": "authorization failed"
            })))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let err = client.validate_name("host.example.com").await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_validate_name_unqualified_domain() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/ValidateName"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "IsQualified": false
            })))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let err = client.validate_name("bad.example.com").await.unwrap_err();
        match err {
            ApiError::NotQualified { domain } => assert_eq!(domain, "bad.example.com"),
            other => panic!("expected NotQualified, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_name_server_error() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/ValidateName"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let err = client.validate_name("host.example.com").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_dns_challenge_returns_value() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/DNSData"))
            .and(body_partial_json(serde_json::json!({
                "ProductCode": "AlwaysOnSSL.AlwaysOnSSL"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "DNSAuthDetails": {
                    "DNSValue": "challenge-abc123",
                    "Example": "host.example.com. 300 IN TXT \"challenge-abc123\""
                }
            })))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let details = client.dns_challenge(TEST_CSR).await.unwrap();
        assert_eq!(details.dns_value, "challenge-abc123");
        assert!(details.example.unwrap().contains("TXT"));
    }

    #[tokio::test]
    async fn test_dns_challenge_shape_mismatch() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/DNSData"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "unexpected": true })),
            )
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let err = client.dns_challenge(TEST_CSR).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_order_success() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/Order"))
            .and(body_partial_json(serde_json::json!({
                "OrderParameters": {
                    "ValidityPeriod": 90,
                    "DVAuthMethod": "DNS"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "Fulfillment": {
                    "Certificate": "LEAF",
                    "Intermediate": "CHAIN",
                    "Certificate_PKCS7": "BUNDLE",
                    "EndDate": "2027-08-07"
                }
            })))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let fulfillment = client.order(TEST_CSR, 90).await.unwrap();
        assert_eq!(fulfillment.certificate, "LEAF");
        assert_eq!(fulfillment.intermediate, "CHAIN");
        assert_eq!(fulfillment.end_date, "2027-08-07");
    }

    #[tokio::test]
    async fn test_order_rejected() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/rest/v1/Order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "Message": "CSR rejected"
            })))
            .mount(&server)
            .await;

        let client = client(&server, &cache_dir).await;
        let err = client.order(TEST_CSR, 365).await.unwrap_err();
        match err {
            ApiError::OrderRejected(body) => assert!(body.contains("CSR rejected")),
            other => panic!("expected OrderRejected, got {:?}", other),
        }
    }
}

// ============================================================================
// Pipeline Tests
// ============================================================================

mod pipeline {
    use super::*;

    /// Full issuance flow against a mocked CA: the two output files must
    /// contain exactly the certificate and certificate+intermediate.
    #[tokio::test]
    async fn test_round_trip() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_response("pipeline-token"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/ValidateName"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "IsQualified": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/DNSData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "DNSAuthDetails": { "DNSValue": "challenge-value" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/Order"))
            .and(header("Authorization", "Bearer pipeline-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "Fulfillment": {
                    "Certificate": "-----BEGIN CERTIFICATE-----\nleaf\n-----END CERTIFICATE-----",
                    "Intermediate": "-----BEGIN CERTIFICATE-----\nchain\n-----END CERTIFICATE-----",
                    "Certificate_PKCS7": "BUNDLE",
                    "EndDate": "2027-08-07"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = TokenManager::new(&ca).unwrap().access_token().await.unwrap();
        let client = CaClient::new(&ca, token).unwrap();

        client.validate_name("host.example.com").await.unwrap();
        let challenge = client.dns_challenge(TEST_CSR).await.unwrap();

        let checker = PropagationChecker::with_lookup(
            fast_propagation(),
            Arc::new(StaticLookup(vec![challenge.dns_value.clone()])),
        );
        checker
            .wait_for_match("host.example.com", &challenge.dns_value)
            .await
            .unwrap();

        let issued = IssuedCertificate::from(client.order(TEST_CSR, 365).await.unwrap());
        let paths =
            write_certificate_files(out_dir.path(), "host.example.com", &issued).unwrap();

        let cert = std::fs::read_to_string(&paths.certificate).unwrap();
        assert_eq!(
            cert,
            "-----BEGIN CERTIFICATE-----\nleaf\n-----END CERTIFICATE-----"
        );

        let chained = std::fs::read_to_string(&paths.chained).unwrap();
        assert_eq!(
            chained,
            "-----BEGIN CERTIFICATE-----\nleaf\n-----END CERTIFICATE-----\n-----BEGIN CERTIFICATE-----\nchain\n-----END CERTIFICATE-----"
        );

        assert_eq!(issued.pkcs7.as_deref(), Some("BUNDLE"));
        assert_eq!(issued.end_date, "2027-08-07");
    }

    /// A propagated record with the wrong value must stop the run before any
    /// order request is made.
    #[tokio::test]
    async fn test_mismatched_record_stops_before_order() {
        let server = MockServer::start().await;
        let cache_dir = TempDir::new().unwrap();
        let ca = ca_config(&server, &cache_dir);

        Mock::given(method("POST"))
            .and(path("/rest/v1/Order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .expect(0)
            .mount(&server)
            .await;

        let _client = CaClient::new(&ca, "test-token".to_string()).unwrap();

        let checker = PropagationChecker::with_lookup(
            fast_propagation(),
            Arc::new(StaticLookup(vec!["not-the-challenge".to_string()])),
        );

        let err = checker
            .wait_for_match("host.example.com", "challenge-value")
            .await
            .unwrap_err();
        assert!(matches!(err, DnsCheckError::ValueMismatch { .. }));

        // The pipeline stops here; the order endpoint must never be called.
        // The expect(0) above is verified when the mock server drops.
    }
}
