//! Manifest document encoding.
//!
//! A manifest is stored as an XML property list:
//!
//! ```text
//! <dict>
//!   FormatVersion  integer, currently 1
//!   Files          array of <dict> { LocalPath, Length, Hash }
//!   Signature      <dict>, added by the signer (see crate::crypto::envelope)
//! </dict>
//! ```
//!
//! The bytes produced here are exactly what gets signed, so the layout is
//! pinned by [`FORMAT_VERSION`]: any change to key names, key order or value
//! types needs a new version.

use super::{FileEntry, FileHash, HashAlgorithm, Manifest};
use crate::{Error, Result};
use plist::{Dictionary, Integer, Value};

/// Manifest layout version written by this crate.
pub const FORMAT_VERSION: u64 = 1;

pub const KEY_FORMAT_VERSION: &str = "FormatVersion";
pub const KEY_FILES: &str = "Files";
pub const KEY_LOCAL_PATH: &str = "LocalPath";
pub const KEY_LENGTH: &str = "Length";
pub const KEY_HASH: &str = "Hash";
/// Entry key of early manifests: bare base64 SHA-384 digest.
pub const KEY_LEGACY_SHA384: &str = "SHA384";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Drop a leading UTF-8 byte-order mark.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

/// Parse a manifest document into its root dictionary.
pub fn parse_document(data: &[u8]) -> Result<Dictionary> {
    let value: Value = plist::from_bytes(strip_bom(data))
        .map_err(|e| Error::ManifestMalformed(format!("not a property list: {e}")))?;

    value
        .into_dictionary()
        .ok_or_else(|| Error::ManifestMalformed("document root is not a dictionary".into()))
}

/// Canonical byte form of a plist node.
///
/// This is the XML writer's output for the node. It is deterministic for a
/// given value, which is all the signer and verifier rely on.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    plist::to_writer_xml(&mut buf, value)?;
    Ok(buf)
}

/// Encode a manifest as the root dictionary of an unsigned document.
pub fn to_dictionary(manifest: &Manifest) -> Dictionary {
    let files = manifest
        .entries()
        .iter()
        .map(|entry| {
            let mut file = Dictionary::new();
            file.insert(KEY_LOCAL_PATH.to_string(), Value::String(entry.local_path.clone()));
            file.insert(KEY_LENGTH.to_string(), Value::Integer(Integer::from(entry.length)));
            file.insert(KEY_HASH.to_string(), Value::String(entry.hash.to_token()));
            Value::Dictionary(file)
        })
        .collect();

    let mut root = Dictionary::new();
    root.insert(
        KEY_FORMAT_VERSION.to_string(),
        Value::Integer(Integer::from(FORMAT_VERSION)),
    );
    root.insert(KEY_FILES.to_string(), Value::Array(files));
    root
}

/// Decode a manifest from a document's root dictionary.
///
/// Keys other than the ones listed in the module docs are ignored, which is
/// how a signature block passes through unharmed.
pub fn from_dictionary(root: &Dictionary) -> Result<Manifest> {
    if let Some(version) = root.get(KEY_FORMAT_VERSION) {
        let version = version.as_unsigned_integer().ok_or_else(|| {
            Error::ManifestMalformed(format!("{KEY_FORMAT_VERSION} is not an unsigned integer"))
        })?;
        if version != FORMAT_VERSION {
            return Err(Error::ManifestMalformed(format!(
                "unsupported format version {version}"
            )));
        }
    }

    let files = root
        .get(KEY_FILES)
        .ok_or_else(|| Error::ManifestMalformed(format!("missing '{KEY_FILES}'")))?
        .as_array()
        .ok_or_else(|| Error::ManifestMalformed(format!("'{KEY_FILES}' is not an array")))?;

    files
        .iter()
        .enumerate()
        .map(|(index, value)| decode_entry(index, value))
        .collect()
}

fn decode_entry(index: usize, value: &Value) -> Result<FileEntry> {
    let malformed = |what: &str| Error::ManifestMalformed(format!("file entry {index}: {what}"));

    let file = value.as_dictionary().ok_or_else(|| malformed("not a dictionary"))?;

    let local_path = file
        .get(KEY_LOCAL_PATH)
        .and_then(Value::as_string)
        .ok_or_else(|| malformed("missing LocalPath"))?;
    check_local_path(local_path).map_err(|why| malformed(why))?;

    let length = file
        .get(KEY_LENGTH)
        .and_then(Value::as_unsigned_integer)
        .ok_or_else(|| malformed("missing or negative Length"))?;

    let hash = match (file.get(KEY_HASH), file.get(KEY_LEGACY_SHA384)) {
        (Some(token), _) => token.as_string().ok_or_else(|| malformed("Hash is not a string"))?,
        (None, Some(legacy)) => legacy
            .as_string()
            .ok_or_else(|| malformed("SHA384 is not a string"))?,
        (None, None) => return Err(malformed("missing Hash")),
    };
    let hash = FileHash::parse_token(hash, HashAlgorithm::Sha384)
        .map_err(|e| malformed(&e.to_string()))?;

    Ok(FileEntry::new(local_path, length, hash))
}

fn check_local_path(path: &str) -> std::result::Result<(), &'static str> {
    if path.is_empty() {
        return Err("empty LocalPath");
    }
    if path.starts_with('/') {
        return Err("LocalPath is absolute");
    }
    if path.contains('\\') {
        return Err("LocalPath uses '\\' separators");
    }
    if path.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err("LocalPath has an empty, '.' or '..' segment");
    }
    Ok(())
}

/// Serialize a manifest to an unsigned document.
pub fn serialize(manifest: &Manifest) -> Result<Vec<u8>> {
    canonical_bytes(&Value::Dictionary(to_dictionary(manifest)))
}

/// Deserialize a manifest document, signed or not.
///
/// This does not check the signature; use [`crate::crypto::verify`] for
/// documents from an untrusted source.
pub fn deserialize(data: &[u8]) -> Result<Manifest> {
    from_dictionary(&parse_document(data)?)
}
