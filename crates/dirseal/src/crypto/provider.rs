//! Key-pair issuance and export.
//!
//! Produces the two files a signer works with: the private key (kept by the
//! signer, optionally password protected) and the `.publickey` file shipped to
//! whoever validates containers.

use super::Certificate;
use crate::{Error, Result};
use pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// RSA modulus size used when none is requested.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Extension of the private key file.
pub const PRIVATE_KEY_EXTENSION: &str = "pem";

/// Extension of the public key file.
pub const PUBLIC_KEY_EXTENSION: &str = "publickey";

/// Generate a fresh RSA key pair.
pub fn issue(bits: usize) -> Result<Certificate> {
    debug!(bits, "generating RSA key pair");
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| Error::Certificate(format!("Failed to generate RSA key: {}", e)))?;
    Ok(Certificate::from_private_key(private_key))
}

/// Export the private key as PKCS#8 PEM.
///
/// With a non-empty password the key is encrypted (PBES2); with no password
/// or an empty one it is written in the clear.
///
/// # Errors
///
/// Returns [`Error::SigningKeyUnavailable`] for public-only certificates.
pub fn export_private_pem(
    certificate: &Certificate,
    password: Option<&SecretString>,
) -> Result<SecretString> {
    let private_key = certificate.private_key()?;
    let password = password
        .map(|p| p.expose_secret().as_str())
        .filter(|p| !p.is_empty());

    let pem = match password {
        Some(password) => {
            private_key.to_pkcs8_encrypted_pem(&mut rand::thread_rng(), password, LineEnding::LF)
        }
        None => private_key.to_pkcs8_pem(LineEnding::LF),
    }
    .map_err(|e| Error::Certificate(format!("Failed to encode private key: {}", e)))?;

    Ok(SecretString::new(pem.to_string()))
}

/// Paths written by [`write_key_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFiles {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl KeyFiles {
    /// Key file paths derived from `output`: `<output>.pem` and `<output>.publickey`.
    pub fn for_output(output: impl AsRef<Path>) -> Self {
        let output = output.as_ref();
        Self {
            private_key: output.with_extension(PRIVATE_KEY_EXTENSION),
            public_key: output.with_extension(PUBLIC_KEY_EXTENSION),
        }
    }
}

/// Write the private and public key files for `certificate`.
///
/// # Errors
///
/// Returns [`Error::OutputExists`] if either file exists and `overwrite` is
/// false. Nothing is written in that case.
pub fn write_key_files(
    certificate: &Certificate,
    output: impl AsRef<Path>,
    password: Option<&SecretString>,
    overwrite: bool,
) -> Result<KeyFiles> {
    let files = KeyFiles::for_output(output);

    if !overwrite {
        for path in [&files.private_key, &files.public_key] {
            if path.exists() {
                return Err(Error::OutputExists { path: path.clone() });
            }
        }
    }

    let pem = export_private_pem(certificate, password)?;
    let public_key = certificate.public_key_base64()?;

    if let Some(parent) = files.private_key.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&files.private_key, pem.expose_secret().as_bytes())?;
    fs::write(&files.public_key, public_key)?;

    info!(
        private_key = %files.private_key.display(),
        public_key = %files.public_key.display(),
        "wrote key files"
    );
    Ok(files)
}
