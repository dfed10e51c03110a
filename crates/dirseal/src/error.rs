//! Error types for dirseal operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure in
//! manifest building, signing, verification and reconciliation. None of these
//! are transient: an error aborts the current operation and is reported with
//! enough context (paths, counts) to explain the cause.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for dirseal operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to tell a tampered container apart from a broken one.
///
/// # Examples
///
/// ```no_run
/// use dirseal::{Certificate, ContainerValidator, Error};
///
/// let public_key = Certificate::load_public("signer.publickey")?;
/// match ContainerValidator::new(public_key).validate("container") {
///     Ok(manifest) => println!("VALID ({} files)", manifest.len()),
///     Err(Error::EntryMismatch { local_path }) => eprintln!("{local_path} was modified"),
///     Err(Error::SignatureInvalid(why)) => eprintln!("bad signature: {why}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok::<(), dirseal::Error>(())
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed outside of file hashing.
    ///
    /// Occurs when creating the output container, copying payload files or
    /// writing the manifest and key files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The directory to walk does not exist or is not a directory.
    #[error("Directory not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    /// A file could not be opened or read while enumerating or hashing.
    ///
    /// This includes files that vanished between enumeration and read.
    #[error("Cannot read '{}': {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The walker met something other than a regular file or directory.
    ///
    /// Symbolic links, device nodes, sockets and names that are not valid
    /// UTF-8 cannot be described by a manifest entry.
    #[error("Unsupported entry '{}': {reason}", path.display())]
    UnsupportedEntry { path: PathBuf, reason: &'static str },

    /// The manifest document could not be parsed or has the wrong structure.
    #[error("Manifest is invalid: {0}")]
    ManifestMalformed(String),

    /// The container has no manifest file at the reserved location.
    #[error("Manifest file not found: {}", path.display())]
    ManifestMissing { path: PathBuf },

    /// The manifest document carries no signature block.
    #[error("Manifest is not signed")]
    NoSignature,

    /// The manifest document carries more than one signature block.
    #[error("Manifest carries {count} signature blocks, expected exactly one")]
    MultipleSignatures { count: usize },

    /// The embedded signature does not verify against the supplied public key.
    #[error("Signature is invalid: {0}")]
    SignatureInvalid(String),

    /// Declared and actual manifests have different entry counts.
    #[error("File count mismatch: manifest declares {declared} files, container has {actual}")]
    CountMismatch { declared: usize, actual: usize },

    /// A file in the container has no equal entry in the declared manifest.
    #[error("File '{local_path}' is different from the signed manifest")]
    EntryMismatch { local_path: String },

    /// Reconciliation consumed every actual entry but declared entries remain.
    ///
    /// Only reachable with equal counts and different multisets that the
    /// per-entry search did not catch. Treat as a defect signal.
    #[error("Reconciliation left {remaining} declared entries unmatched")]
    InternalInconsistency { remaining: usize },

    /// The signature primitive failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Signing was attempted with a certificate that holds only a public key.
    #[error("Certificate has no private key to sign with")]
    SigningKeyUnavailable,

    /// Public key bytes do not decode to a usable RSA public key.
    #[error("Could not create RSA public key: {0}")]
    PublicKeyUnusable(String),

    /// The public key file does not exist.
    #[error("Public key file not found: {}", path.display())]
    PublicKeyMissing { path: PathBuf },

    /// Invalid or malformed private key material.
    ///
    /// The key file could not be parsed as PKCS#8, PKCS#1 or PKCS#12, or the
    /// key is not an RSA key.
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Incorrect password for an encrypted private key or PKCS#12 file.
    #[error("Invalid password for private key or PKCS#12")]
    InvalidPassword,

    /// The private key file does not exist.
    #[error("Certificate file not found: {}", path.display())]
    CertificateMissing { path: PathBuf },

    /// Required credentials not configured.
    ///
    /// A container was created without first calling
    /// [`crate::ContainerSigner::credentials`].
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The output path already exists and overwriting was not requested.
    #[error("Output already exists: {}", path.display())]
    OutputExists { path: PathBuf },

    /// Property list encoding failed.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Each kind has its own code so scripts can branch on the failure
    /// without parsing messages. Success is `0`.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::RootNotFound { .. } => 1,
            Error::CertificateMissing { .. } => 2,
            Error::OutputExists { .. } => 3,
            Error::ManifestMissing { .. } => 20,
            Error::PublicKeyMissing { .. } => 21,
            Error::PublicKeyUnusable(_) => 22,
            Error::ManifestMalformed(_) => 23,
            Error::CountMismatch { .. } => 24,
            Error::EntryMismatch { .. } => 25,
            Error::NoSignature => 26,
            Error::MultipleSignatures { .. } => 27,
            Error::SignatureInvalid(_) => 28,
            Error::InternalInconsistency { .. } => 29,
            Error::FileUnreadable { .. } => 30,
            Error::UnsupportedEntry { .. } => 31,
            Error::SigningKeyUnavailable => 32,
            Error::Certificate(_) => 33,
            Error::InvalidPassword => 34,
            Error::MissingCredentials(_) => 35,
            Error::Signing(_) => 36,
            Error::Plist(_) => 40,
            Error::Io(_) => 74,
        }
    }

    /// Whether this error means the container content was tampered with,
    /// as opposed to the container or its inputs being unusable.
    pub fn is_tamper_evidence(&self) -> bool {
        matches!(
            self,
            Error::SignatureInvalid(_)
                | Error::CountMismatch { .. }
                | Error::EntryMismatch { .. }
                | Error::InternalInconsistency { .. }
        )
    }
}
