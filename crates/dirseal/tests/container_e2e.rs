//! End-to-end tests: issue a key, seal a container, tamper with it, validate.
//!
//! Run with: cargo test -p dirseal --test container_e2e

use dirseal::crypto::{self, envelope, KeyFiles};
use dirseal::manifest::codec;
use dirseal::{
    Certificate, ContainerSigner, ContainerValidator, Error, ManifestBuilder, MANIFEST_PATH,
};
use secrecy::SecretString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

fn key() -> Certificate {
    static KEY: OnceLock<Certificate> = OnceLock::new();
    KEY.get_or_init(|| crypto::issue(1024).unwrap()).clone()
}

/// `README.md` ("hello") and `docs/spec.txt` ("spec v1") under `root`.
fn write_payload(root: &Path) {
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("README.md"), "hello").unwrap();
    fs::write(root.join("docs").join("spec.txt"), "spec v1").unwrap();
}

/// A sealed container inside a fresh temp dir, plus the container path.
fn sealed_container() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("payload");
    let output = tmp.path().join("container");
    write_payload(&input);

    ContainerSigner::new()
        .credentials(key())
        .create(&input, &output)
        .unwrap();
    (tmp, output)
}

fn validator() -> ContainerValidator {
    ContainerValidator::new(key().to_public())
}

#[test]
fn test_create_and_validate_through_key_files() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("payload");
    let output = tmp.path().join("container");
    write_payload(&input);

    let password = SecretString::new("s3cret".into());
    let files = crypto::write_key_files(&key(), tmp.path().join("signer"), Some(&password), false)
        .unwrap();
    assert_eq!(files, KeyFiles::for_output(tmp.path().join("signer")));

    let signing_key = Certificate::load_private(&files.private_key, Some(&password)).unwrap();
    ContainerSigner::new()
        .credentials(signing_key)
        .create(&input, &output)
        .unwrap();

    let public_key = Certificate::load_public(&files.public_key).unwrap();
    let manifest = ContainerValidator::new(public_key).validate(&output).unwrap();
    assert_eq!(manifest.len(), 2);
    assert!(manifest.get("README.md").is_some());
    assert!(manifest.get("docs/spec.txt").is_some());
}

#[test]
fn test_modified_file_is_reported() {
    let (_tmp, container) = sealed_container();
    validator().validate(&container).unwrap();

    fs::write(container.join("README.md"), "hello!").unwrap();

    match validator().validate(&container) {
        Err(Error::EntryMismatch { local_path }) => assert_eq!(local_path, "README.md"),
        other => panic!("expected EntryMismatch, got {other:?}"),
    }
}

#[test]
fn test_single_file_modification_is_reported() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "hi").unwrap();
    ContainerSigner::new()
        .credentials(key())
        .seal(tmp.path())
        .unwrap();

    fs::write(tmp.path().join("a.txt"), "ho").unwrap();

    match validator().validate(tmp.path()) {
        Err(Error::EntryMismatch { local_path }) => assert_eq!(local_path, "a.txt"),
        other => panic!("expected EntryMismatch, got {other:?}"),
    }
}

#[test]
fn test_same_length_modification_is_reported() {
    let (_tmp, container) = sealed_container();
    fs::write(container.join("docs").join("spec.txt"), "spec v2").unwrap();

    match validator().validate(&container) {
        Err(Error::EntryMismatch { local_path }) => assert_eq!(local_path, "docs/spec.txt"),
        other => panic!("expected EntryMismatch, got {other:?}"),
    }
}

#[test]
fn test_added_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "a").unwrap();
    ContainerSigner::new()
        .credentials(key())
        .seal(tmp.path())
        .unwrap();

    fs::write(tmp.path().join("b.txt"), "b").unwrap();

    let result = validator().validate(tmp.path());
    assert!(matches!(
        result,
        Err(Error::CountMismatch {
            declared: 1,
            actual: 2
        })
    ));
}

#[test]
fn test_removed_file_is_reported() {
    let (_tmp, container) = sealed_container();
    fs::remove_file(container.join("docs").join("spec.txt")).unwrap();

    let err = validator().validate(&container).unwrap_err();
    assert!(matches!(
        err,
        Error::CountMismatch {
            declared: 2,
            actual: 1
        }
    ));
    assert!(err.is_tamper_evidence());
}

#[test]
fn test_renamed_file_is_reported() {
    let (_tmp, container) = sealed_container();
    fs::rename(container.join("README.md"), container.join("README.txt")).unwrap();

    match validator().validate(&container) {
        Err(Error::EntryMismatch { local_path }) => assert_eq!(local_path, "README.txt"),
        other => panic!("expected EntryMismatch, got {other:?}"),
    }
}

#[test]
fn test_foreign_key_is_rejected() {
    let (_tmp, container) = sealed_container();
    let stranger = crypto::issue(1024).unwrap();

    let result = ContainerValidator::new(stranger.to_public()).validate(&container);
    assert!(matches!(result, Err(Error::SignatureInvalid(_))));
}

#[test]
fn test_rewritten_manifest_is_rejected() {
    let (_tmp, container) = sealed_container();
    fs::write(container.join("README.md"), "hello!").unwrap();

    // Patch the declared entry to the new content without re-signing.
    let manifest_file = container.join("META-INFO").join("manifest.plist");
    let document = fs::read_to_string(&manifest_file).unwrap();
    let old = dirseal::manifest::hash_bytes(b"hello").to_token();
    let new = dirseal::manifest::hash_bytes(b"hello!").to_token();
    let patched = document
        .replace(&old, &new)
        .replacen("<integer>5</integer>", "<integer>6</integer>", 1);
    assert_ne!(patched, document);
    fs::write(&manifest_file, patched).unwrap();

    let result = validator().validate(&container);
    assert!(matches!(result, Err(Error::SignatureInvalid(_))));
}

#[test]
fn test_stripped_signature_is_rejected() {
    let (_tmp, container) = sealed_container();
    let manifest = ManifestBuilder::new(&container).build().unwrap();
    let unsigned = codec::serialize(&manifest).unwrap();
    fs::write(container.join("META-INFO").join("manifest.plist"), unsigned).unwrap();

    assert!(matches!(
        validator().validate(&container),
        Err(Error::NoSignature)
    ));
}

#[test]
fn test_manifest_excludes_itself() {
    let (_tmp, container) = sealed_container();
    let manifest = validator().validate(&container).unwrap();
    assert!(manifest.get(MANIFEST_PATH).is_none());

    let actual = ManifestBuilder::new(&container).build().unwrap();
    assert!(actual.get(MANIFEST_PATH).is_none());
    assert!(actual.same_entries(&manifest));
}

#[test]
fn test_extra_meta_info_files_are_covered() {
    let tmp = TempDir::new().unwrap();
    write_payload(tmp.path());
    fs::create_dir_all(tmp.path().join("META-INFO")).unwrap();
    fs::write(tmp.path().join("META-INFO").join("notes.txt"), "notes").unwrap();

    let sealed = ContainerSigner::new()
        .credentials(key())
        .seal(tmp.path())
        .unwrap();
    assert!(sealed.get("META-INFO/notes.txt").is_some());

    fs::write(tmp.path().join("META-INFO").join("notes.txt"), "edited").unwrap();
    assert!(matches!(
        validator().validate(tmp.path()),
        Err(Error::EntryMismatch { .. })
    ));
}

#[test]
fn test_resealing_unchanged_tree_is_deterministic() {
    let (_tmp, container) = sealed_container();
    let manifest_file = container.join("META-INFO").join("manifest.plist");
    let first = fs::read(&manifest_file).unwrap();

    ContainerSigner::new()
        .credentials(key())
        .seal(&container)
        .unwrap();
    let second = fs::read(&manifest_file).unwrap();

    assert_eq!(first, second);
    assert_eq!(envelope::count_signatures(&second).unwrap(), 1);
}

#[test]
fn test_empty_container() {
    let tmp = TempDir::new().unwrap();
    let sealed = ContainerSigner::new()
        .credentials(key())
        .seal(tmp.path())
        .unwrap();
    assert!(sealed.is_empty());

    let manifest = validator().validate(tmp.path()).unwrap();
    assert!(manifest.is_empty());
}
