//! Enveloped signature over a manifest document.
//!
//! The signature lives inside the document it signs, as a `Signature`
//! dictionary appended to the root:
//!
//! ```text
//! Signature
//!   SignedInfo
//!     CanonicalizationMethod   CANONICALIZATION_METHOD
//!     SignatureMethod          RSA_SHA384
//!     Reference
//!       URI                    ""   (the whole document)
//!       Transforms             [ENVELOPED_SIGNATURE]
//!       DigestMethod           SHA384
//!       DigestValue            SHA-384 of the document without Signature
//!   SignatureValue             RSA PKCS#1 v1.5 / SHA-384 over SignedInfo
//! ```
//!
//! Both digests are taken over [`canonical_bytes`] of the node in question,
//! so a verifier can recompute them after parsing and re-encoding.

use super::Certificate;
use crate::manifest::codec::{canonical_bytes, from_dictionary, parse_document, strip_bom};
use crate::manifest::Manifest;
use crate::{Error, Result};
use plist::stream::{Event, Reader};
use plist::{Dictionary, Value};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::{Digest, Sha384};
use std::io::Cursor;
use tracing::{debug, warn};

pub const SIGNATURE_KEY: &str = "Signature";
const SIGNED_INFO_KEY: &str = "SignedInfo";
const SIGNATURE_VALUE_KEY: &str = "SignatureValue";
const CANONICALIZATION_METHOD_KEY: &str = "CanonicalizationMethod";
const SIGNATURE_METHOD_KEY: &str = "SignatureMethod";
const REFERENCE_KEY: &str = "Reference";
const URI_KEY: &str = "URI";
const TRANSFORMS_KEY: &str = "Transforms";
const DIGEST_METHOD_KEY: &str = "DigestMethod";
const DIGEST_VALUE_KEY: &str = "DigestValue";

/// Identifier of the canonical form: the plist XML writer output of a node.
pub const CANONICALIZATION_METHOD: &str = "urn:dirseal:c14n:plist-xml";
pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Sign a serialized manifest document.
///
/// Returns the document with one `Signature` block appended to its root.
///
/// # Errors
///
/// - [`Error::SigningKeyUnavailable`] if `certificate` has no private key
/// - [`Error::MultipleSignatures`] if the document is already signed
/// - [`Error::ManifestMalformed`] if the document cannot be parsed
pub fn sign(document: &[u8], certificate: &Certificate) -> Result<Vec<u8>> {
    let private_key = certificate.private_key()?;

    let existing = count_signatures(document)?;
    if existing > 0 {
        return Err(Error::MultipleSignatures {
            count: existing + 1,
        });
    }

    let mut root = parse_document(document)?;
    let content = canonical_bytes(&Value::Dictionary(root.clone()))?;
    let digest = Sha384::digest(&content);

    let signed_info = signed_info(digest.to_vec());
    let signed_info_bytes = canonical_bytes(&Value::Dictionary(signed_info.clone()))?;

    let signing_key = SigningKey::<Sha384>::new(private_key.clone());
    let signature_value = signing_key
        .try_sign(&signed_info_bytes)
        .map_err(|e| Error::Signing(e.to_string()))?;

    let mut signature = Dictionary::new();
    signature.insert(SIGNED_INFO_KEY.to_string(), Value::Dictionary(signed_info));
    signature.insert(
        SIGNATURE_VALUE_KEY.to_string(),
        Value::Data(signature_value.to_vec()),
    );
    root.insert(SIGNATURE_KEY.to_string(), Value::Dictionary(signature));

    debug!(content_len = content.len(), "signed manifest document");
    canonical_bytes(&Value::Dictionary(root))
}

fn signed_info(digest: Vec<u8>) -> Dictionary {
    let mut reference = Dictionary::new();
    reference.insert(URI_KEY.to_string(), Value::String(String::new()));
    reference.insert(
        TRANSFORMS_KEY.to_string(),
        Value::Array(vec![Value::String(ENVELOPED_SIGNATURE.to_string())]),
    );
    reference.insert(DIGEST_METHOD_KEY.to_string(), Value::String(SHA384.to_string()));
    reference.insert(DIGEST_VALUE_KEY.to_string(), Value::Data(digest));

    let mut info = Dictionary::new();
    info.insert(
        CANONICALIZATION_METHOD_KEY.to_string(),
        Value::String(CANONICALIZATION_METHOD.to_string()),
    );
    info.insert(
        SIGNATURE_METHOD_KEY.to_string(),
        Value::String(RSA_SHA384.to_string()),
    );
    info.insert(REFERENCE_KEY.to_string(), Value::Dictionary(reference));
    info
}

/// Verify a signed manifest document and decode the manifest it carries.
///
/// Does not touch the file system.
///
/// # Errors
///
/// - [`Error::ManifestMalformed`] if the document cannot be parsed or the
///   signed content is not a valid manifest
/// - [`Error::NoSignature`] / [`Error::MultipleSignatures`] unless exactly one
///   signature block is present
/// - [`Error::SignatureInvalid`] if the block is malformed, names an
///   unsupported algorithm, or does not match the content and `certificate`
pub fn verify(document: &[u8], certificate: &Certificate) -> Result<Manifest> {
    let mut content = parse_document(document)?;

    match count_signatures(document)? {
        0 => return Err(Error::NoSignature),
        1 => {}
        count => return Err(Error::MultipleSignatures { count }),
    }

    let signature = content.remove(SIGNATURE_KEY).ok_or(Error::NoSignature)?;
    if let Err(e) = check_signature(&signature, &content, certificate) {
        warn!(error = %e, "manifest signature rejected");
        return Err(e);
    }

    debug!("manifest signature verified");
    from_dictionary(&content)
}

fn check_signature(
    signature: &Value,
    content: &Dictionary,
    certificate: &Certificate,
) -> Result<()> {
    let invalid = |why: &str| Error::SignatureInvalid(why.to_string());

    let signature = signature
        .as_dictionary()
        .ok_or_else(|| invalid("signature block is not a dictionary"))?;
    let signed_info = signature
        .get(SIGNED_INFO_KEY)
        .and_then(Value::as_dictionary)
        .ok_or_else(|| invalid("missing SignedInfo"))?;

    expect_string(signed_info, CANONICALIZATION_METHOD_KEY, CANONICALIZATION_METHOD)?;
    expect_string(signed_info, SIGNATURE_METHOD_KEY, RSA_SHA384)?;

    let reference = signed_info
        .get(REFERENCE_KEY)
        .and_then(Value::as_dictionary)
        .ok_or_else(|| invalid("missing Reference"))?;
    expect_string(reference, URI_KEY, "")?;
    expect_string(reference, DIGEST_METHOD_KEY, SHA384)?;

    let transforms = reference
        .get(TRANSFORMS_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing Transforms"))?;
    if transforms.len() != 1 || transforms[0].as_string() != Some(ENVELOPED_SIGNATURE) {
        return Err(invalid("unsupported Transforms"));
    }

    let expected_digest = reference
        .get(DIGEST_VALUE_KEY)
        .and_then(Value::as_data)
        .ok_or_else(|| invalid("missing DigestValue"))?;
    let actual_digest = Sha384::digest(canonical_bytes(&Value::Dictionary(content.clone()))?);
    if actual_digest.as_slice() != expected_digest {
        return Err(invalid("digest does not match document content"));
    }

    let signature_value = signature
        .get(SIGNATURE_VALUE_KEY)
        .and_then(Value::as_data)
        .ok_or_else(|| invalid("missing SignatureValue"))?;
    let signature_value = Signature::try_from(signature_value)
        .map_err(|e| Error::SignatureInvalid(format!("malformed SignatureValue: {e}")))?;

    let signed_info_bytes = canonical_bytes(&Value::Dictionary(signed_info.clone()))?;
    VerifyingKey::<Sha384>::new(certificate.public_key().clone())
        .verify(&signed_info_bytes, &signature_value)
        .map_err(|_| invalid("signature does not verify with the supplied public key"))
}

fn expect_string(dict: &Dictionary, key: &str, expected: &str) -> Result<()> {
    match dict.get(key).and_then(Value::as_string) {
        Some(value) if value == expected => Ok(()),
        Some(value) => Err(Error::SignatureInvalid(format!("unsupported {key} '{value}'"))),
        None => Err(Error::SignatureInvalid(format!("missing {key}"))),
    }
}

enum Frame {
    Dict { expect_key: bool },
    Array,
}

/// Count `Signature` keys directly under the document root.
///
/// Works on the event stream: parsing into a [`Dictionary`] would silently
/// collapse duplicate keys.
pub fn count_signatures(document: &[u8]) -> Result<usize> {
    let reader = Reader::new(Cursor::new(strip_bom(document)));
    let mut stack: Vec<Frame> = Vec::new();
    let mut count = 0;

    for event in reader {
        let event =
            event.map_err(|e| Error::ManifestMalformed(format!("not a property list: {e}")))?;

        let at_root_key = matches!(stack.as_slice(), [Frame::Dict { expect_key: true }]);
        match &event {
            Event::EndCollection => {
                stack.pop();
                continue;
            }
            Event::String(key) if at_root_key && &**key == SIGNATURE_KEY => count += 1,
            _ => {}
        }

        if let Some(Frame::Dict { expect_key }) = stack.last_mut() {
            *expect_key = !*expect_key;
        }
        match event {
            Event::StartDictionary(_) => stack.push(Frame::Dict { expect_key: true }),
            Event::StartArray(_) => stack.push(Frame::Array),
            _ => {}
        }
    }

    Ok(count)
}
