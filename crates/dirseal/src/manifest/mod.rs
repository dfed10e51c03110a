//! Manifest data model and construction.
//!
//! A [`Manifest`] lists every payload file of a container as a [`FileEntry`]
//! (relative path, length, content hash). It is built by walking the
//! container ([`walker`]), hashing each file ([`hasher`]) and collecting the
//! results ([`ManifestBuilder`]). The [`codec`] module turns it into the
//! document that gets signed.

pub mod builder;
pub mod codec;
pub mod hasher;
pub mod walker;

pub use builder::ManifestBuilder;
pub use hasher::{hash_bytes, hash_file};
pub use walker::{walk, WalkedFile};

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Directory under the container root that holds the manifest.
pub const META_INFO_DIR: &str = "META-INFO";

/// Reserved manifest location, relative to the container root.
///
/// The entry with this path is never part of a manifest: the manifest cannot
/// describe its own hash.
pub const MANIFEST_PATH: &str = "META-INFO/manifest.plist";

/// Content hash algorithm of a [`FileHash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-384 (48-byte digest). The only algorithm written by this crate.
    Sha384,
}

impl HashAlgorithm {
    /// Identifier used in hash tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha384 => "SHA384",
        }
    }

    /// Parse a hash token identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SHA384" => Some(HashAlgorithm::Sha384),
            _ => None,
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha384 => 48,
        }
    }
}

/// Algorithm-tagged digest of one file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl FileHash {
    /// Wrap a digest, checking its length against the algorithm.
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self> {
        if digest.len() != algorithm.digest_len() {
            return Err(Error::ManifestMalformed(format!(
                "{} digest must be {} bytes, got {}",
                algorithm.as_str(),
                algorithm.digest_len(),
                digest.len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Tagged text form: `SHA384:<base64>`.
    pub fn to_token(&self) -> String {
        format!("{}:{}", self.algorithm.as_str(), STANDARD.encode(&self.digest))
    }

    /// Parse a hash token.
    ///
    /// Accepts the tagged form `<algorithm>:<base64>` and a bare base64
    /// digest, which is read with `implicit` as its algorithm. Base64 never
    /// contains `:`, so the two forms cannot be confused.
    pub fn parse_token(token: &str, implicit: HashAlgorithm) -> Result<Self> {
        let (algorithm, encoded) = match token.split_once(':') {
            Some((name, encoded)) => {
                let algorithm = HashAlgorithm::parse(name).ok_or_else(|| {
                    Error::ManifestMalformed(format!("unknown hash algorithm '{name}'"))
                })?;
                (algorithm, encoded)
            }
            None => (implicit, token),
        };

        let digest = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::ManifestMalformed(format!("hash is not valid base64: {e}")))?;

        Self::new(algorithm, digest)
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

/// One regular file under the container root.
///
/// Two entries are equal iff path, length and hash are all equal; this is the
/// unit of comparison during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    /// Root-relative path with `/` separators.
    pub local_path: String,
    /// Byte count at hashing time.
    pub length: u64,
    pub hash: FileHash,
}

impl FileEntry {
    pub fn new(local_path: impl Into<String>, length: u64, hash: FileHash) -> Self {
        Self {
            local_path: local_path.into(),
            length,
            hash,
        }
    }
}

/// The set of file entries describing a container's payload.
///
/// Stored as a sequence but compared as a multiset: entry order carries no
/// meaning and duplicate paths are kept as distinct entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<FileEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the first entry with the given path.
    pub fn get(&self, local_path: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.local_path == local_path)
    }

    /// Sort entries by path, byte-wise. Serialization of a sorted manifest is
    /// reproducible across runs and platforms.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.local_path.as_bytes().cmp(b.local_path.as_bytes()));
    }

    /// Multiset equality, ignoring order.
    pub fn same_entries(&self, other: &Manifest) -> bool {
        crate::reconcile::reconcile(self, other).is_match()
    }
}

impl FromIterator<FileEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hash(fill: u8) -> FileHash {
        FileHash::new(HashAlgorithm::Sha384, vec![fill; 48]).unwrap()
    }

    #[test]
    fn test_token_tagged_form() {
        let hash = sample_hash(7);
        let token = hash.to_token();
        assert!(token.starts_with("SHA384:"));
        assert_eq!(FileHash::parse_token(&token, HashAlgorithm::Sha384).unwrap(), hash);
    }

    #[test]
    fn test_token_bare_base64_uses_implicit_algorithm() {
        let hash = sample_hash(9);
        let bare = STANDARD.encode(hash.digest());
        let parsed = FileHash::parse_token(&bare, HashAlgorithm::Sha384).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_token_rejects_unknown_algorithm() {
        let result = FileHash::parse_token("MD5:AAAA", HashAlgorithm::Sha384);
        assert!(matches!(result, Err(Error::ManifestMalformed(_))));
    }

    #[test]
    fn test_token_rejects_wrong_digest_length() {
        let short = format!("SHA384:{}", STANDARD.encode([1u8; 32]));
        let result = FileHash::parse_token(&short, HashAlgorithm::Sha384);
        assert!(matches!(result, Err(Error::ManifestMalformed(_))));
    }

    #[test]
    fn test_entry_equality_covers_all_fields() {
        let a = FileEntry::new("a.txt", 2, sample_hash(1));
        assert_eq!(a, FileEntry::new("a.txt", 2, sample_hash(1)));
        assert_ne!(a, FileEntry::new("b.txt", 2, sample_hash(1)));
        assert_ne!(a, FileEntry::new("a.txt", 3, sample_hash(1)));
        assert_ne!(a, FileEntry::new("a.txt", 2, sample_hash(2)));
    }

    #[test]
    fn test_sort_is_bytewise() {
        let mut manifest: Manifest = ["b", "B", "a/z", "a"]
            .iter()
            .map(|p| FileEntry::new(*p, 0, sample_hash(0)))
            .collect();
        manifest.sort();
        let paths: Vec<_> = manifest.entries().iter().map(|e| e.local_path.as_str()).collect();
        assert_eq!(paths, vec!["B", "a", "a/z", "b"]);
    }

    #[test]
    fn test_same_entries_ignores_order() {
        let a = FileEntry::new("a", 1, sample_hash(1));
        let b = FileEntry::new("b", 1, sample_hash(2));
        let left = Manifest::new(vec![a.clone(), b.clone()]);
        let right = Manifest::new(vec![b, a]);
        assert!(left.same_entries(&right));
        assert_ne!(left, right);
    }
}
