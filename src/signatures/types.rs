//! Signing credentials and the signer seam.
//!
//! [`SigningCredentials`] wraps the certificate and key material extracted
//! from a PKCS#12 bundle. The actual CMS/PKCS#7 primitive sits behind the
//! [`Pkcs7Signer`] trait so tests can substitute a deterministic signer;
//! the default implementation is openssl-backed.

use crate::error::{Error, Result};
use openssl::cms::{CMSOptions, CmsContentInfo};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::X509;
use std::path::Path;

/// Certificate and private key extracted from a PKCS#12 bundle.
#[derive(Clone)]
pub struct SigningCredentials {
    /// Signing certificate
    pub certificate: X509,
    /// Private key matching the certificate
    pub private_key: PKey<Private>,
    /// Intermediate certificates shipped in the bundle
    pub chain: Vec<X509>,
}

impl SigningCredentials {
    /// Load credentials from PKCS#12 (.p12/.pfx) DER bytes.
    ///
    /// Fails with [`Error::CertLoad`] when the bundle cannot be parsed or
    /// is missing either the certificate or the private key.
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self> {
        let pkcs12 = Pkcs12::from_der(der)
            .map_err(|e| Error::CertLoad(format!("not a PKCS#12 bundle: {}", e)))?;
        let parsed = pkcs12
            .parse2(password)
            .map_err(|e| Error::CertLoad(format!("PKCS#12 decryption failed: {}", e)))?;

        let certificate = parsed
            .cert
            .ok_or_else(|| Error::CertLoad("bundle holds no certificate".to_string()))?;
        let private_key = parsed
            .pkey
            .ok_or_else(|| Error::CertLoad("bundle holds no private key".to_string()))?;
        let chain = parsed
            .ca
            .map(|stack| stack.iter().map(|c| c.to_owned()).collect())
            .unwrap_or_default();

        Ok(Self {
            certificate,
            private_key,
            chain,
        })
    }

    /// Load credentials from a PKCS#12 file on disk.
    pub fn from_pkcs12_file(path: &Path, password: &str) -> Result<Self> {
        let der = std::fs::read(path)
            .map_err(|e| Error::CertLoad(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_pkcs12(&der, password)
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("certificate", &"X509")
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// The detached-signature primitive.
///
/// Receives the path of a scratch file holding the signable byte image
/// (the concatenation of the two `/ByteRange` windows) and returns the
/// DER-encoded CMS SignedData.
pub trait Pkcs7Signer {
    /// Produce a detached PKCS#7 signature over the file at `signable`.
    fn sign_detached(&self, signable: &Path) -> Result<Vec<u8>>;
}

/// openssl-backed [`Pkcs7Signer`].
pub struct OpensslSigner {
    credentials: SigningCredentials,
}

impl OpensslSigner {
    /// Create a signer from loaded credentials.
    pub fn new(credentials: SigningCredentials) -> Self {
        Self { credentials }
    }
}

impl Pkcs7Signer for OpensslSigner {
    fn sign_detached(&self, signable: &Path) -> Result<Vec<u8>> {
        let data = std::fs::read(signable)?;

        let mut chain = Stack::new().map_err(|e| Error::Signer(e.to_string()))?;
        for cert in &self.credentials.chain {
            chain
                .push(cert.clone())
                .map_err(|e| Error::Signer(e.to_string()))?;
        }

        let cms = CmsContentInfo::sign(
            Some(&self.credentials.certificate),
            Some(&self.credentials.private_key),
            Some(&chain),
            Some(&data),
            CMSOptions::DETACHED | CMSOptions::BINARY,
        )
        .map_err(|e| Error::Signer(format!("CMS signing failed: {}", e)))?;

        cms.to_der().map_err(|e| Error::Signer(e.to_string()))
    }
}
