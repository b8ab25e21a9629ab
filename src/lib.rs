//! dvcert - domain-validated certificate issuance for the CertCenter REST API
//!
//! This library backs the `dvcert` binary. Issuance is a single sequential
//! pipeline:
//!
//! 1. [`TokenManager`] obtains an OAuth2 client-credentials token, reusing a
//!    cached token from disk while it is still fresh
//! 2. [`CaClient::validate_name`] checks the subject FQDN for eligibility
//! 3. [`CaClient::dns_challenge`] fetches the DNS TXT challenge value for the
//!    CSR
//! 4. [`PropagationChecker`] polls public DNS until the TXT record is visible
//!    and matches the challenge value
//! 5. [`CaClient::order`] requests the certificate
//! 6. [`write_certificate_files`] exports the certificate and the chained
//!    certificate as PEM files
//!
//! Every stage either succeeds or returns an error that terminates the run;
//! only the propagation poll retries, and only while the record is not yet
//! visible.

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod output;

pub use api::{CaClient, TokenManager};
pub use config::Config;
pub use dns::{PropagationChecker, PropagationConfig, PublicDnsLookup, TxtLookup};
pub use error::{ApiError, StorageError};
pub use output::{write_certificate_files, CertificatePaths, IssuedCertificate};
