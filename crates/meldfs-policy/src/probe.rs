//! Existence and modification-time probes.
//!
//! Selection algorithms never touch the disk directly; they ask a
//! [`BranchProbe`] whether a relative path exists under a branch and, for
//! the `newest` policy, when it was last modified. [`FsProbe`] answers from
//! the real directory tree; [`MemProbe`] answers from a declared table and
//! backs tests and CLI dry runs.

use meldfs_types::Branch;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The engine's only window onto branch contents.
///
/// Implementations must be cheap and side-effect free: a probe call is the
/// single piece of I/O an algorithm performs, and it runs once per branch
/// per selection with no lock held.
pub trait BranchProbe {
    /// Whether `rel` exists under `branch` (without following a final
    /// symlink — a dangling link still counts as placed on that branch).
    fn exists(&self, branch: &Branch, rel: &Path) -> bool;

    /// Modification time of `rel` under `branch`, `None` if absent.
    fn mtime(&self, branch: &Branch, rel: &Path) -> Option<SystemTime>;
}

// ── Real directory trees ────────────────────────────────────────────────────

/// Probe backed by the actual filesystem beneath each branch path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl BranchProbe for FsProbe {
    fn exists(&self, branch: &Branch, rel: &Path) -> bool {
        branch.path.join(rel).symlink_metadata().is_ok()
    }

    fn mtime(&self, branch: &Branch, rel: &Path) -> Option<SystemTime> {
        branch
            .path
            .join(rel)
            .symlink_metadata()
            .ok()?
            .modified()
            .ok()
    }
}

// ── Declared tables ─────────────────────────────────────────────────────────

/// Probe answering from a declared `(branch, relative path) -> mtime` table.
///
/// Used by the test suites and by `meldfs-cli select` dry runs, where branch
/// contents are asserted rather than discovered.
#[derive(Debug, Clone, Default)]
pub struct MemProbe {
    entries: HashMap<(PathBuf, PathBuf), SystemTime>,
}

impl MemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `rel` exists under the branch mounted at `branch_path`.
    pub fn insert(&mut self, branch_path: impl Into<PathBuf>, rel: impl Into<PathBuf>) {
        self.insert_with_mtime(branch_path, rel, SystemTime::UNIX_EPOCH);
    }

    /// Declare an entry with an explicit modification time.
    pub fn insert_with_mtime(
        &mut self,
        branch_path: impl Into<PathBuf>,
        rel: impl Into<PathBuf>,
        mtime: SystemTime,
    ) {
        self.entries.insert((branch_path.into(), rel.into()), mtime);
    }
}

impl BranchProbe for MemProbe {
    fn exists(&self, branch: &Branch, rel: &Path) -> bool {
        self.entries
            .contains_key(&(branch.path.clone(), rel.to_path_buf()))
    }

    fn mtime(&self, branch: &Branch, rel: &Path) -> Option<SystemTime> {
        self.entries
            .get(&(branch.path.clone(), rel.to_path_buf()))
            .copied()
    }
}
