//! SHA-384 content hashing for manifest entries.

use super::{FileHash, HashAlgorithm};
use crate::{Error, Result};
use sha2::{Digest, Sha384};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Hash data directly.
pub fn hash_bytes(data: &[u8]) -> FileHash {
    let digest = Sha384::digest(data);
    FileHash {
        algorithm: HashAlgorithm::Sha384,
        digest: digest.to_vec(),
    }
}

/// Hash the whole content of a file.
///
/// The file is streamed through the digest rather than read into memory.
/// Returns the number of bytes hashed together with the hash, so the length
/// recorded in the manifest always describes exactly the hashed content.
///
/// # Errors
///
/// Returns [`Error::FileUnreadable`] if the file cannot be opened or read,
/// including when it was removed after being enumerated.
pub fn hash_file(path: &Path) -> Result<(u64, FileHash)> {
    let unreadable = |source: io::Error| Error::FileUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unreadable)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = Sha384::new();
    let length = io::copy(&mut reader, &mut hasher).map_err(unreadable)?;

    let hash = FileHash {
        algorithm: HashAlgorithm::Sha384,
        digest: hasher.finalize().to_vec(),
    };
    Ok((length, hash))
}
