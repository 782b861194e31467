#![forbid(unsafe_code)]
//! Core data model for the meldfs policy engine.
//!
//! This crate is pure data: operation categories, branch descriptions, and
//! the string-parsing errors for the configuration surface. It performs no
//! I/O and holds no state. The selection algorithms live in `meldfs-policy`;
//! the user-facing runtime error type lives in `meldfs-error`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

// ── Operation categories ────────────────────────────────────────────────────

/// Intent class of a filesystem operation, as seen by branch selection.
///
/// Every call site supplies one explicitly; there is no default or invalid
/// member. The category decides which eligibility filters apply: `Search`
/// carries no write intent, `Create` carries no prior-existence requirement
/// for the non-existing-path policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Operate on an already-placed path (unlink, rename, chmod, truncate).
    Action,
    /// Choose where to place something new (create, mkdir, symlink).
    Create,
    /// Find an existing path for read-like access (open, getattr, readdir).
    Search,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Self; 3] = [Self::Action, Self::Create, Self::Search];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Create => "create",
            Self::Search => "search",
        }
    }

    /// Whether this category implies a write to the selected branch.
    ///
    /// Read-only branches are ineligible exactly when this returns true.
    #[must_use]
    pub fn writes(self) -> bool {
        matches!(self, Self::Action | Self::Create)
    }

    /// Whether the queried path must already exist on an eligible branch,
    /// even for policies that are not existing-path restricted.
    ///
    /// There is no "create at an arbitrary branch" concept outside `Create`:
    /// under `Action` and `Search` the plain policies coincide with their
    /// existing-path counterparts.
    #[must_use]
    pub fn requires_existing(self) -> bool {
        matches!(self, Self::Action | Self::Search)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "action" => Ok(Self::Action),
            "create" => Ok(Self::Create),
            "search" => Ok(Self::Search),
            _ => Err(ParseError::InvalidCategory(s.to_owned())),
        }
    }
}

// ── Branches ────────────────────────────────────────────────────────────────

/// Mount mode of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchMode {
    ReadWrite,
    ReadOnly,
}

impl BranchMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadWrite => "rw",
            Self::ReadOnly => "ro",
        }
    }
}

impl fmt::Display for BranchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "rw" => Ok(Self::ReadWrite),
            "ro" => Ok(Self::ReadOnly),
            _ => Err(ParseError::InvalidMode(s.to_owned())),
        }
    }
}

/// Space-usage snapshot for one branch, in bytes.
///
/// Invariant: `free <= total`. The snapshot is taken by the caller before
/// selection begins; the engine never refreshes it mid-decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpace {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

impl DiskSpace {
    /// Build a snapshot from total and free figures, deriving `used`.
    pub fn new(total: u64, free: u64) -> Result<Self, ParseError> {
        if free > total {
            return Err(ParseError::InvalidSpace { total, free });
        }
        Ok(Self {
            total,
            free,
            used: total - free,
        })
    }
}

/// One physical storage location aggregated by the union filesystem.
///
/// The policy engine consumes branches read-only: identity is the mount
/// `path`, and `mode`/`space` are a point-in-time view owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub path: PathBuf,
    pub mode: BranchMode,
    pub space: DiskSpace,
}

impl Branch {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, mode: BranchMode, space: DiskSpace) -> Self {
        Self {
            path: path.into(),
            mode,
            space,
        }
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.mode == BranchMode::ReadWrite
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.mode)
    }
}

// ── Parse errors ────────────────────────────────────────────────────────────

/// Configuration-surface parse failures.
///
/// These are distinct from the runtime `PolicyError` in `meldfs-error`: a
/// `ParseError` means the configuration text was malformed, and is expected
/// to fail startup rather than an individual selection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid category: {0:?} (expected action, create, or search)")]
    InvalidCategory(String),
    #[error("invalid branch mode: {0:?} (expected rw or ro)")]
    InvalidMode(String),
    #[error("invalid space figures: free {free} exceeds total {total}")]
    InvalidSpace { total: u64, free: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_strings() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
            assert_eq!(cat.to_string(), cat.as_str());
        }
    }

    #[test]
    fn category_rejects_unknown_and_wrong_case() {
        assert!(matches!(
            "CREATE".parse::<Category>(),
            Err(ParseError::InvalidCategory(_))
        ));
        assert!("delete".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn category_intent_flags() {
        assert!(Category::Create.writes());
        assert!(Category::Action.writes());
        assert!(!Category::Search.writes());

        assert!(Category::Action.requires_existing());
        assert!(Category::Search.requires_existing());
        assert!(!Category::Create.requires_existing());
    }

    #[test]
    fn branch_mode_parses() {
        assert_eq!("rw".parse::<BranchMode>().unwrap(), BranchMode::ReadWrite);
        assert_eq!("ro".parse::<BranchMode>().unwrap(), BranchMode::ReadOnly);
        assert!(matches!(
            "readonly".parse::<BranchMode>(),
            Err(ParseError::InvalidMode(_))
        ));
    }

    #[test]
    fn disk_space_derives_used() {
        let space = DiskSpace::new(1000, 100).unwrap();
        assert_eq!(space.used, 900);

        let full = DiskSpace::new(500, 0).unwrap();
        assert_eq!(full.used, 500);

        let empty = DiskSpace::new(0, 0).unwrap();
        assert_eq!(empty.used, 0);
    }

    #[test]
    fn disk_space_rejects_free_above_total() {
        assert_eq!(
            DiskSpace::new(100, 101),
            Err(ParseError::InvalidSpace {
                total: 100,
                free: 101
            })
        );
    }

    #[test]
    fn branch_writability_follows_mode() {
        let space = DiskSpace::new(10, 10).unwrap();
        assert!(Branch::new("/mnt/a", BranchMode::ReadWrite, space).is_writable());
        assert!(!Branch::new("/mnt/b", BranchMode::ReadOnly, space).is_writable());
    }

    #[test]
    fn branch_display_includes_mode() {
        let branch = Branch::new(
            "/mnt/disk0",
            BranchMode::ReadOnly,
            DiskSpace::new(1, 1).unwrap(),
        );
        assert_eq!(branch.to_string(), "/mnt/disk0 (ro)");
    }
}
