//! PEM export of issued certificates
//!
//! The CA returns the certificate, the intermediate and a PKCS#7 bundle in
//! one response. Two files are written: the bare certificate and the chained
//! certificate (certificate followed by the intermediate).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::api::types::Fulfillment;
use crate::error::StorageError;

/// Certificate material received from the CA
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// PEM-encoded end-entity certificate
    pub certificate: String,
    /// PEM-encoded intermediate certificate
    pub intermediate: String,
    /// PKCS#7 bundle, when the CA provides one
    pub pkcs7: Option<String>,
    /// Expiration date as reported by the CA, passed through opaquely
    pub end_date: String,
}

impl From<Fulfillment> for IssuedCertificate {
    fn from(f: Fulfillment) -> Self {
        Self {
            certificate: f.certificate,
            intermediate: f.intermediate,
            pkcs7: f.pkcs7,
            end_date: f.end_date,
        }
    }
}

/// Paths of the exported PEM files
#[derive(Debug, Clone)]
pub struct CertificatePaths {
    pub certificate: PathBuf,
    pub chained: PathBuf,
}

/// Write `{fqdn}_cert.pem` and `{fqdn}_cert-chained.pem` into `dir`
pub fn write_certificate_files(
    dir: &Path,
    fqdn: &str,
    issued: &IssuedCertificate,
) -> Result<CertificatePaths, StorageError> {
    fs::create_dir_all(dir)?;

    let cert_path = dir.join(format!("{}_cert.pem", fqdn));
    fs::write(&cert_path, &issued.certificate)?;
    info!(path = %cert_path.display(), "Certificate exported");

    let chained_path = dir.join(format!("{}_cert-chained.pem", fqdn));
    let chained = format!("{}\n{}", issued.certificate, issued.intermediate);
    fs::write(&chained_path, chained)?;
    info!(path = %chained_path.display(), "Chained certificate exported");

    Ok(CertificatePaths {
        certificate: cert_path,
        chained: chained_path,
    })
}
