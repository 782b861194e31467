#![forbid(unsafe_code)]
//! meldfs public API facade.
//!
//! Re-exports the policy engine through one stable surface. This is the
//! crate downstream consumers (the call-dispatch layer, the CLI) depend on.

pub use meldfs_error::{PolicyError, Result};
pub use meldfs_policy::{
    algo, AlgoFn, BoundPolicy, BranchProbe, FsProbe, MemProbe, Policy, PolicyId, INVALID, POLICIES,
};
pub use meldfs_types::{Branch, BranchMode, Category, DiskSpace, ParseError};
