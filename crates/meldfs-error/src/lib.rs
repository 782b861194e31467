#![forbid(unsafe_code)]
//! Error types for meldfs branch selection.
//!
//! # Error Taxonomy
//!
//! Branch selection has exactly three failure kinds, plus the
//! configuration-time lookup miss:
//!
//! | Variant | Meaning | When |
//! |---------|---------|------|
//! | `UnknownPolicy` | requested policy name/id is not registered | configuration time |
//! | `PathNotFound` | no eligible branch has the queried path | `action`/`search`, and existing-path policies under `create` |
//! | `NoSpace` | eligible branches all sit below the free-space floor | space-floored policies, `action`/`create` |
//! | `ReadOnly` | candidates are read-only but the category writes | `action`/`create` |
//!
//! Every failure is terminal for one invocation: the engine never retries
//! internally, and never returns a partial selection. The dispatch layer
//! decides whether to retry with a different policy or surface the errno.
//!
//! ## errno Mapping
//!
//! Every variant maps to exactly one POSIX errno via [`PolicyError::to_errno`].
//! The match is exhaustive (no wildcard arm) so adding a variant is a compile
//! error until its errno is assigned.
//!
//! | Variant | errno | Constant |
//! |---------|-------|----------|
//! | `UnknownPolicy` | `EINVAL` | 22 |
//! | `PathNotFound` | `ENOENT` | 2 |
//! | `NoSpace` | `ENOSPC` | 28 |
//! | `ReadOnly` | `EROFS` | 30 |
//!
//! ## Design Constraints
//!
//! - `meldfs-error` MUST NOT depend on `meldfs-types` or `meldfs-policy`
//!   (no cyclic deps); string payloads are owned to keep the type `'static`.

use thiserror::Error;

/// Unified error type for all branch-selection operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The requested policy name or identifier is not registered.
    ///
    /// Surfaces at configuration time; a well-behaved dispatch layer
    /// validates policy names at startup and never sees this per call.
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    /// No branch (or, for existing-path policies, no eligible branch)
    /// holds the queried relative path.
    #[error("no branch found for path: {0}")]
    PathNotFound(String),

    /// Branches exist and are writable, but none clears the configured
    /// minimum-free-space floor.
    #[error("no branch with sufficient free space")]
    NoSpace,

    /// The surviving candidates are mounted read-only and the operation
    /// category requires write access.
    #[error("read-only branch")]
    ReadOnly,
}

impl PolicyError {
    /// Convert this error into a POSIX errno suitable for the dispatch
    /// layer's reply.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::UnknownPolicy(_) => libc::EINVAL,
            Self::PathNotFound(_) => libc::ENOENT,
            Self::NoSpace => libc::ENOSPC,
            Self::ReadOnly => libc::EROFS,
        }
    }
}

/// Result alias using `PolicyError`.
pub type Result<T> = std::result::Result<T, PolicyError>;
