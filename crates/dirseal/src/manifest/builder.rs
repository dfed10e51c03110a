//! Manifest generation for a container directory.
//!
//! Walks the container, hashes every payload file and collects the results
//! into a [`Manifest`] sorted by path.

use super::walker::{walk, WalkedFile};
use super::{hash_file, FileEntry, Manifest, MANIFEST_PATH};
use crate::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Builder for the manifest of a container directory.
pub struct ManifestBuilder {
    /// Container root
    root: PathBuf,
    /// Relative paths left out of the manifest
    exclusions: Vec<String>,
}

impl ManifestBuilder {
    /// Create a builder for the given container root.
    ///
    /// The reserved manifest path is always excluded.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclusions: vec![MANIFEST_PATH.to_string()],
        }
    }

    /// Exclude one more root-relative path (exact match, `/` separators).
    pub fn exclude(mut self, relative_path: impl Into<String>) -> Self {
        self.exclusions.push(relative_path.into());
        self
    }

    fn should_exclude(&self, relative_path: &str) -> bool {
        self.exclusions.iter().any(|p| p == relative_path)
    }

    /// Walk the container and hash all files.
    ///
    /// Files are hashed in parallel; the result is sorted by path so two runs
    /// over an unmodified tree yield identical manifests.
    ///
    /// # Errors
    ///
    /// Fails if the walk fails or any single file cannot be hashed. No
    /// partial manifest is ever returned.
    pub fn build(&self) -> Result<Manifest> {
        let files: Vec<WalkedFile> = walk(&self.root)?
            .into_iter()
            .filter(|f| !self.should_exclude(&f.relative_path))
            .collect();

        debug!(root = %self.root.display(), files = files.len(), "hashing container files");

        let entries = files
            .into_par_iter()
            .map(|file| -> Result<FileEntry> {
                let (length, hash) = hash_file(&file.absolute_path)?;
                Ok(FileEntry::new(file.relative_path, length, hash))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut manifest = Manifest::new(entries);
        manifest.sort();
        Ok(manifest)
    }
}

/// Build the manifest of `root`, leaving out the entry at `exclude_path`.
pub fn build_manifest(root: impl AsRef<Path>, exclude_path: &str) -> Result<Manifest> {
    ManifestBuilder::new(root).exclude(exclude_path).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::hash_bytes;
    use crate::Error;
    use std::fs;
    use tempfile::tempdir;

    fn paths(manifest: &Manifest) -> Vec<&str> {
        manifest
            .entries()
            .iter()
            .map(|e| e.local_path.as_str())
            .collect()
    }

    #[test]
    fn test_build_records_length_and_hash() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), b"hello").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/spec.txt"), b"spec v1").unwrap();

        let manifest = ManifestBuilder::new(dir.path()).build().unwrap();

        assert_eq!(paths(&manifest), vec!["README.md", "docs/spec.txt"]);
        let readme = manifest.get("README.md").unwrap();
        assert_eq!(readme.length, 5);
        assert_eq!(readme.hash, hash_bytes(b"hello"));
        assert_eq!(manifest.get("docs/spec.txt").unwrap().length, 7);
    }

    #[test]
    fn test_build_excludes_reserved_manifest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        fs::create_dir(dir.path().join("META-INFO")).unwrap();
        fs::write(dir.path().join(MANIFEST_PATH), b"<plist/>").unwrap();
        fs::write(dir.path().join("META-INFO/notes.txt"), b"kept").unwrap();

        let manifest = ManifestBuilder::new(dir.path()).build().unwrap();

        assert!(manifest.get(MANIFEST_PATH).is_none());
        assert_eq!(paths(&manifest), vec!["META-INFO/notes.txt", "a.txt"]);
    }

    #[test]
    fn test_build_custom_exclusion() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("skip.txt"), b"b").unwrap();

        let manifest = build_manifest(dir.path(), "skip.txt").unwrap();
        assert_eq!(paths(&manifest), vec!["a.txt"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let dir = tempdir().unwrap();
        for i in 0..40 {
            let sub = dir.path().join(format!("d{}", i % 4));
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join(format!("f{i}.txt")), format!("content {i}")).unwrap();
        }

        let first = ManifestBuilder::new(dir.path()).build().unwrap();
        let second = ManifestBuilder::new(dir.path()).build().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn test_build_empty_directory() {
        let dir = tempdir().unwrap();
        let manifest = ManifestBuilder::new(dir.path()).build().unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_build_missing_root() {
        let dir = tempdir().unwrap();
        let result = ManifestBuilder::new(dir.path().join("missing")).build();
        assert!(matches!(result, Err(Error::RootNotFound { .. })));
    }
}
