//! Signed directory manifests.
//!
//! `dirseal` records the files of a directory (relative path, length and
//! SHA-384 hash) in a manifest, signs it with an RSA key and stores it inside
//! the directory at [`MANIFEST_PATH`]. Anyone holding the public key can later
//! check that no file was added, removed or modified.
//!
//! # Example
//!
//! ```no_run
//! use dirseal::{crypto, ContainerSigner, ContainerValidator};
//!
//! let key = crypto::issue(crypto::DEFAULT_KEY_BITS)?;
//! ContainerSigner::new()
//!     .credentials(key.clone())
//!     .create("payload", "container")?;
//!
//! let manifest = ContainerValidator::new(key.to_public()).validate("container")?;
//! println!("{} files verified", manifest.len());
//! # Ok::<(), dirseal::Error>(())
//! ```

pub mod container;
pub mod crypto;
pub mod error;
pub mod manifest;
pub mod reconcile;

pub use container::{ContainerSigner, ContainerValidator};
pub use crypto::Certificate;
pub use error::Error;
pub use manifest::{FileEntry, FileHash, HashAlgorithm, Manifest, ManifestBuilder, MANIFEST_PATH};
pub use reconcile::{reconcile, Reconciliation};

pub type Result<T> = std::result::Result<T, Error>;
