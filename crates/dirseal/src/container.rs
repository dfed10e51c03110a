//! Signed containers: directories carrying their own signed manifest.
//!
//! [`ContainerSigner`] copies a payload directory into a new container and
//! seals it by writing a signed manifest to [`MANIFEST_PATH`].
//! [`ContainerValidator`] checks the signature and compares the declared
//! manifest against the files actually present.

use crate::crypto::{self, Certificate};
use crate::manifest::{codec, walk, Manifest, ManifestBuilder, WalkedFile, MANIFEST_PATH};
use crate::reconcile::reconcile;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Location of the manifest file inside `root`.
pub fn manifest_file(root: impl AsRef<Path>) -> PathBuf {
    MANIFEST_PATH
        .split('/')
        .fold(root.as_ref().to_path_buf(), |path, part| path.join(part))
}

/// Creates and seals containers.
///
/// # Example
///
/// ```no_run
/// use dirseal::{Certificate, ContainerSigner};
///
/// let key = Certificate::load_private("signer.pem", None)?;
/// ContainerSigner::new()
///     .credentials(key)
///     .overwrite(true)
///     .create("payload", "container")?;
/// # Ok::<(), dirseal::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct ContainerSigner {
    credentials: Option<Certificate>,
    overwrite: bool,
}

impl ContainerSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signing key. It must carry a private key.
    pub fn credentials(mut self, certificate: Certificate) -> Self {
        self.credentials = Some(certificate);
        self
    }

    /// Replace an existing output instead of failing.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Check that the signer is usable.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredentials`] if no key was set
    /// - [`Error::SigningKeyUnavailable`] if the key has no private part
    pub fn validate(&self) -> Result<()> {
        self.signing_key().map(|_| ())
    }

    fn signing_key(&self) -> Result<&Certificate> {
        let certificate = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::MissingCredentials("No signing key configured".into()))?;
        certificate.private_key()?;
        Ok(certificate)
    }

    /// Copy `input` into a new container at `output` and seal it.
    ///
    /// If anything fails after `output` was created it is removed again, so a
    /// failed run never leaves a signed container behind.
    ///
    /// # Errors
    ///
    /// - [`Error::RootNotFound`] if `input` is not a directory
    /// - [`Error::OutputExists`] if `output` exists and overwriting is off, or
    ///   if `output` is `input`, lies inside it or contains it
    /// - [`Error::UnsupportedEntry`] if `input` contains a symbolic link
    /// - any error of [`ContainerSigner::seal`]
    pub fn create(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<Manifest> {
        let input = input.as_ref();
        let output = output.as_ref();
        self.validate()?;

        let files = walk(input)?;

        if overlaps(input, output) {
            return Err(Error::OutputExists {
                path: output.to_path_buf(),
            });
        }

        if output.exists() {
            if !self.overwrite {
                return Err(Error::OutputExists {
                    path: output.to_path_buf(),
                });
            }
            debug!(output = %output.display(), "removing previous output");
            if output.is_dir() {
                fs::remove_dir_all(output)?;
            } else {
                fs::remove_file(output)?;
            }
        }

        fs::create_dir_all(output)?;
        let result = self.stage(&files, output).and_then(|()| self.seal(output));

        if let Err(ref e) = result {
            warn!(output = %output.display(), error = %e, "container creation failed, removing output");
            if let Err(cleanup) = fs::remove_dir_all(output) {
                warn!(output = %output.display(), error = %cleanup, "could not remove partial output");
            }
        }
        result
    }

    fn stage(&self, files: &[WalkedFile], output: &Path) -> Result<()> {
        debug!(files = files.len(), output = %output.display(), "staging payload");
        for file in files {
            let target = file
                .relative_path
                .split('/')
                .fold(output.to_path_buf(), |path, part| path.join(part));
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&file.absolute_path, &target).map_err(|source| Error::FileUnreadable {
                path: file.absolute_path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Sign the files of `dir` in place.
    ///
    /// Builds the manifest (leaving out [`MANIFEST_PATH`]), signs it and
    /// writes it to [`manifest_file`]. The manifest file is written last; an
    /// existing one is replaced.
    pub fn seal(&self, dir: impl AsRef<Path>) -> Result<Manifest> {
        let dir = dir.as_ref();
        let certificate = self.signing_key()?;

        let manifest = ManifestBuilder::new(dir).build()?;
        let document = codec::serialize(&manifest)?;
        let signed = crypto::sign(&document, certificate)?;

        let path = manifest_file(dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, signed)?;

        info!(container = %dir.display(), files = manifest.len(), "container sealed");
        Ok(manifest)
    }
}

/// Whether one of the two directories is, contains or lies inside the other.
fn overlaps(input: &Path, output: &Path) -> bool {
    let input = resolve(input);
    let output = resolve(output);
    input.starts_with(&output) || output.starts_with(&input)
}

/// Absolute path with symlinks resolved as far as the path exists.
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    for ancestor in absolute.ancestors() {
        if let Ok(real) = fs::canonicalize(ancestor) {
            return match absolute.strip_prefix(ancestor) {
                Ok(rest) if !rest.as_os_str().is_empty() => real.join(rest),
                _ => real,
            };
        }
    }
    absolute
}

/// Validates containers against a public key.
///
/// # Example
///
/// ```no_run
/// use dirseal::{Certificate, ContainerValidator};
///
/// let public_key = Certificate::load_public("signer.publickey")?;
/// let manifest = ContainerValidator::new(public_key).validate("container")?;
/// println!("{} files verified", manifest.len());
/// # Ok::<(), dirseal::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContainerValidator {
    certificate: Certificate,
}

impl ContainerValidator {
    pub fn new(certificate: Certificate) -> Self {
        Self { certificate }
    }

    /// Verify the manifest signature of `dir` and reconcile it with the
    /// directory's current content.
    ///
    /// Returns the verified manifest when every file matches.
    ///
    /// # Errors
    ///
    /// - [`Error::RootNotFound`] if `dir` is not a directory
    /// - [`Error::ManifestMissing`] if there is no manifest file
    /// - signature errors of [`crypto::verify`]
    /// - [`Error::CountMismatch`], [`Error::EntryMismatch`] or
    ///   [`Error::InternalInconsistency`] if the files differ from the manifest
    pub fn validate(&self, dir: impl AsRef<Path>) -> Result<Manifest> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::RootNotFound {
                path: dir.to_path_buf(),
            });
        }

        let path = manifest_file(dir);
        let document = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => Error::ManifestMissing { path: path.clone() },
            _ => Error::FileUnreadable {
                path: path.clone(),
                source,
            },
        })?;

        let declared = crypto::verify(&document, &self.certificate)?;
        let actual = ManifestBuilder::new(dir).build()?;

        let outcome = reconcile(&declared, &actual);
        if !outcome.is_match() {
            warn!(container = %dir.display(), ?outcome, "container does not match its manifest");
        }
        outcome.into_result()?;

        info!(container = %dir.display(), files = declared.len(), "container is valid");
        Ok(declared)
    }
}
