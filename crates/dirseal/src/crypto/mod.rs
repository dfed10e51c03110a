//! Key material and the enveloped manifest signature.
//!
//! - [`cert`]: RSA keys in their on-disk formats
//! - [`envelope`]: signing and verifying a manifest document
//! - [`provider`]: issuing a key pair and writing its files

pub mod cert;
pub mod envelope;
pub mod provider;

pub use cert::Certificate;
pub use envelope::{sign, verify};
pub use provider::{export_private_pem, issue, write_key_files, KeyFiles, DEFAULT_KEY_BITS};

/// Keys shared by unit tests. Generation is slow, so each is made once.
#[cfg(test)]
pub(crate) mod test_keys {
    use super::Certificate;
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    fn generate() -> Certificate {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        Certificate::from_private_key(key)
    }

    pub fn signing_key() -> Certificate {
        static KEY: OnceLock<Certificate> = OnceLock::new();
        KEY.get_or_init(generate).clone()
    }

    pub fn other_key() -> Certificate {
        static KEY: OnceLock<Certificate> = OnceLock::new();
        KEY.get_or_init(generate).clone()
    }
}
