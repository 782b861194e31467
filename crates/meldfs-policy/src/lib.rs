#![forbid(unsafe_code)]
//! Branch-selection policies for the meldfs union filesystem.
//!
//! Given a logical operation on a relative path, a snapshot of the
//! configured branches, and a minimum-free-space floor, a policy decides
//! which branch(es) should service the operation. The engine is fully
//! decoupled from call dispatch: it never performs the operation, never
//! mutates a branch, and caches nothing between invocations.
//!
//! The pieces:
//!
//! - [`PolicyId`] — stable identifier for each of the fourteen algorithms,
//!   plus an `Invalid` sentinel that no lookup ever returns;
//! - [`Policy`] — immutable descriptor binding a name, an identifier, a
//!   path-preserving flag, and the algorithm ([`algo`]);
//! - [`POLICIES`] — the process-wide registry, a static table in canonical
//!   order, safe for unsynchronized concurrent reads;
//! - [`BoundPolicy`] — a descriptor with the operation [`Category`] fixed,
//!   so call sites do not re-thread the category on every call;
//! - [`BranchProbe`] — the existence/mtime seam to the real filesystem.
//!
//! Selection is a pure, bounded computation: the only I/O is the probe
//! call, once per branch. Two concurrent `create` selections may pick the
//! same branch; serializing the actual mutation is the dispatcher's job.

pub mod algo;
pub mod probe;

pub use meldfs_error::{PolicyError, Result};
pub use meldfs_types::{Branch, BranchMode, Category, DiskSpace};
pub use probe::{BranchProbe, FsProbe, MemProbe};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

/// Signature shared by every selection algorithm.
///
/// Returns the selected branches, borrowed from the input snapshot, in
/// selection order; a success is never empty.
pub type AlgoFn = for<'b> fn(
    Category,
    &'b [Branch],
    &Path,
    u64,
    &dyn BranchProbe,
) -> Result<Vec<&'b Branch>>;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Stable identifier for each registered policy.
///
/// Discriminants are contiguous from zero in canonical (display) order and
/// index [`POLICIES`] directly. `Invalid` sits strictly below every real
/// identifier and is only ever an error/uninitialized sentinel — no lookup
/// returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum PolicyId {
    Invalid = -1,
    All = 0,
    Epall,
    Epff,
    Eplfs,
    Eplus,
    Epmfs,
    Eprand,
    Erofs,
    Ff,
    Lfs,
    Lus,
    Mfs,
    Newest,
    Rand,
}

impl PolicyId {
    /// Number of registered policies (the sentinel excluded).
    pub const COUNT: usize = 14;

    /// All registered identifiers, in canonical order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::All,
        Self::Epall,
        Self::Epff,
        Self::Eplfs,
        Self::Eplus,
        Self::Epmfs,
        Self::Eprand,
        Self::Erofs,
        Self::Ff,
        Self::Lfs,
        Self::Lus,
        Self::Mfs,
        Self::Newest,
        Self::Rand,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::All => "all",
            Self::Epall => "epall",
            Self::Epff => "epff",
            Self::Eplfs => "eplfs",
            Self::Eplus => "eplus",
            Self::Epmfs => "epmfs",
            Self::Eprand => "eprand",
            Self::Erofs => "erofs",
            Self::Ff => "ff",
            Self::Lfs => "lfs",
            Self::Lus => "lus",
            Self::Mfs => "mfs",
            Self::Newest => "newest",
            Self::Rand => "rand",
        }
    }

    /// Registry index, `None` for the sentinel.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        let raw = self as i8;
        usize::try_from(raw).ok()
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Descriptors ─────────────────────────────────────────────────────────────

/// Immutable descriptor for one selection policy.
///
/// All descriptors live in the static registry for the process lifetime;
/// everything else holds `&'static` references into it. Equality and
/// ordering go by identifier.
#[derive(Debug)]
pub struct Policy {
    id: PolicyId,
    name: &'static str,
    func: AlgoFn,
    path_preserving: bool,
}

impl Policy {
    const fn new(id: PolicyId, name: &'static str, func: AlgoFn, path_preserving: bool) -> Self {
        Self {
            id,
            name,
            func,
            path_preserving,
        }
    }

    #[must_use]
    pub fn id(&self) -> PolicyId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this policy's `create` choice stays consistent with where
    /// the path's parent directory already lives (the "ep" restriction).
    #[must_use]
    pub fn path_preserving(&self) -> bool {
        self.path_preserving
    }

    /// Look up a descriptor by canonical name (case-sensitive).
    ///
    /// A miss is a configuration error; validate requested names at startup
    /// rather than per call.
    pub fn find(name: &str) -> Result<&'static Policy> {
        POLICIES
            .iter()
            .find(|policy| policy.name == name)
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_owned()))
    }

    /// Look up a descriptor by identifier; fails only for the sentinel.
    pub fn from_id(id: PolicyId) -> Result<&'static Policy> {
        match id.index() {
            Some(index) => Ok(&POLICIES[index]),
            None => Err(PolicyError::UnknownPolicy(id.name().to_owned())),
        }
    }

    /// The canonical ordered registry, for listing and validation surfaces.
    #[must_use]
    pub fn all() -> &'static [Policy; PolicyId::COUNT] {
        &POLICIES
    }

    /// Run the selection algorithm for `category`.
    pub fn select<'b>(
        &self,
        category: Category,
        branches: &'b [Branch],
        rel: &Path,
        min_free: u64,
        probe: &dyn BranchProbe,
    ) -> Result<Vec<&'b Branch>> {
        trace!(
            policy = self.name,
            category = %category,
            path = %rel.display(),
            branches = branches.len(),
            min_free,
            "selecting branches"
        );
        let result = (self.func)(category, branches, rel, min_free, probe);
        match &result {
            Ok(selected) => debug!(
                policy = self.name,
                category = %category,
                selected = selected.len(),
                "branches selected"
            ),
            Err(error) => debug!(
                policy = self.name,
                category = %category,
                errno = error.to_errno(),
                error = %error,
                "selection failed"
            ),
        }
        result
    }

    /// Fix the category, yielding a callable for one call site.
    #[must_use]
    pub fn bind(&'static self, category: Category) -> BoundPolicy {
        BoundPolicy {
            policy: self,
            category,
        }
    }

    #[must_use]
    pub fn action(&'static self) -> BoundPolicy {
        self.bind(Category::Action)
    }

    #[must_use]
    pub fn create(&'static self) -> BoundPolicy {
        self.bind(Category::Create)
    }

    #[must_use]
    pub fn search(&'static self) -> BoundPolicy {
        self.bind(Category::Search)
    }
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Policy {}

impl PartialOrd for Policy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Policy {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

/// The process-wide policy registry, in canonical order.
///
/// Built once at compile time, never mutated; concurrent readers need no
/// synchronization. Order is part of the public contract: it drives
/// configuration listings and matches [`PolicyId`] discriminants.
pub static POLICIES: [Policy; PolicyId::COUNT] = [
    Policy::new(PolicyId::All, "all", algo::all, false),
    Policy::new(PolicyId::Epall, "epall", algo::epall, true),
    Policy::new(PolicyId::Epff, "epff", algo::epff, true),
    Policy::new(PolicyId::Eplfs, "eplfs", algo::eplfs, true),
    Policy::new(PolicyId::Eplus, "eplus", algo::eplus, true),
    Policy::new(PolicyId::Epmfs, "epmfs", algo::epmfs, true),
    Policy::new(PolicyId::Eprand, "eprand", algo::eprand, true),
    Policy::new(PolicyId::Erofs, "erofs", algo::erofs, false),
    Policy::new(PolicyId::Ff, "ff", algo::ff, false),
    Policy::new(PolicyId::Lfs, "lfs", algo::lfs, false),
    Policy::new(PolicyId::Lus, "lus", algo::lus, false),
    Policy::new(PolicyId::Mfs, "mfs", algo::mfs, false),
    Policy::new(PolicyId::Newest, "newest", algo::newest, false),
    Policy::new(PolicyId::Rand, "rand", algo::rand, false),
];

/// Explicit placeholder distinguishable from every registered descriptor.
///
/// Exists for callers that need a default slot before configuration is
/// applied; its algorithm always fails and [`Policy::find`] never returns it.
pub static INVALID: Policy = Policy::new(PolicyId::Invalid, "invalid", algo::invalid, false);

// ── Category-bound invocation ───────────────────────────────────────────────

/// A policy with the operation category fixed.
///
/// Cheap to construct per call or cache per call site; holds a non-owning
/// reference into the registry.
#[derive(Debug, Clone, Copy)]
pub struct BoundPolicy {
    policy: &'static Policy,
    category: Category,
}

impl BoundPolicy {
    #[must_use]
    pub fn policy(&self) -> &'static Policy {
        self.policy
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Run the selection with the bound category.
    pub fn select<'b>(
        &self,
        branches: &'b [Branch],
        rel: &Path,
        min_free: u64,
        probe: &dyn BranchProbe,
    ) -> Result<Vec<&'b Branch>> {
        self.policy
            .select(self.category, branches, rel, min_free, probe)
    }
}
