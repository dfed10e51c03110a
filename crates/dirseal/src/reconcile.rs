//! Comparison of a declared (signed) manifest against the actual one.
//!
//! Both sides are treated as multisets of [`FileEntry`]: order is ignored and
//! duplicate entries must appear the same number of times on each side.

use crate::manifest::{FileEntry, Manifest};
use crate::{Error, Result};

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Every actual entry matched exactly one declared entry.
    Match,
    /// The two sides list a different number of files.
    CountMismatch { declared: usize, actual: usize },
    /// First actual entry without an equal declared entry.
    EntryMismatch { local_path: String },
    /// Counts were equal and every actual entry matched, yet declared
    /// entries remain. Cannot happen for well-formed inputs.
    InternalInconsistency { remaining: usize },
}

impl Reconciliation {
    pub fn is_match(&self) -> bool {
        matches!(self, Reconciliation::Match)
    }

    /// Turn a discrepancy into the corresponding [`Error`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Reconciliation::Match => Ok(()),
            Reconciliation::CountMismatch { declared, actual } => {
                Err(Error::CountMismatch { declared, actual })
            }
            Reconciliation::EntryMismatch { local_path } => Err(Error::EntryMismatch { local_path }),
            Reconciliation::InternalInconsistency { remaining } => {
                Err(Error::InternalInconsistency { remaining })
            }
        }
    }
}

/// Compare `declared` against `actual`.
///
/// Stops at the first discrepancy. For each actual entry, in order, one
/// equal entry is removed from a working copy of `declared`.
pub fn reconcile(declared: &Manifest, actual: &Manifest) -> Reconciliation {
    if declared.len() != actual.len() {
        return Reconciliation::CountMismatch {
            declared: declared.len(),
            actual: actual.len(),
        };
    }

    let mut remaining: Vec<&FileEntry> = declared.entries().iter().collect();
    for entry in actual.entries() {
        match remaining.iter().position(|candidate| *candidate == entry) {
            Some(index) => {
                remaining.swap_remove(index);
            }
            None => {
                return Reconciliation::EntryMismatch {
                    local_path: entry.local_path.clone(),
                }
            }
        }
    }

    if remaining.is_empty() {
        Reconciliation::Match
    } else {
        Reconciliation::InternalInconsistency {
            remaining: remaining.len(),
        }
    }
}
