//! The fourteen branch-selection algorithms.
//!
//! Every algorithm is a pure function with the shared [`AlgoFn`] signature:
//! it filters the branch snapshot down to an eligible set, then reduces that
//! set with its selection rule. The filters depend on the operation
//! [`Category`] as much as on the algorithm:
//!
//! - existing-path ("ep") variants only ever consider branches that already
//!   hold the queried path; the plain variants add the same filter under
//!   `action` and `search`, where the path must predate the operation;
//! - read-only branches are dropped whenever the category writes
//!   (`action`/`create`), never under `search`;
//! - the free-space floor applies to `ff`, `lfs`, `rand` and their ep
//!   variants, again only when the category writes.
//!
//! Filters run in that order, and the reported error is the one for the
//! stage that emptied a previously non-empty set: no path anywhere is
//! `PathNotFound`, survivors all read-only is `ReadOnly`, survivors all
//! below the floor is `NoSpace`. A success is always a non-empty sequence
//! in configured-branch order (reduced to one element for the single-pick
//! rules).
//!
//! [`AlgoFn`]: crate::AlgoFn

use crate::probe::BranchProbe;
use meldfs_error::{PolicyError, Result};
use meldfs_types::{Branch, Category};
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::path::Path;
use std::time::SystemTime;

// ── Eligibility pipeline ────────────────────────────────────────────────────

/// Algorithm-specific filter switches; category-driven filters are implied.
#[derive(Debug, Clone, Copy)]
struct Filters {
    /// Restrict to branches where the path already exists, regardless of
    /// category (the "ep" restriction; also forced on by `newest`).
    existing: bool,
    /// Enforce the minimum-free-space floor when the category writes.
    floored: bool,
}

fn eligible<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
    filters: Filters,
) -> Result<Vec<&'b Branch>> {
    if branches.is_empty() {
        return Err(not_found(rel));
    }

    let mut set: Vec<&Branch> = branches.iter().collect();

    if filters.existing || category.requires_existing() {
        set.retain(|b| probe.exists(b, rel));
        if set.is_empty() {
            return Err(not_found(rel));
        }
    }

    if category.writes() {
        set.retain(|b| b.is_writable());
        if set.is_empty() {
            return Err(PolicyError::ReadOnly);
        }
    }

    if filters.floored && category.writes() {
        set.retain(|b| b.space.free >= min_free);
        if set.is_empty() {
            return Err(PolicyError::NoSpace);
        }
    }

    Ok(set)
}

fn not_found(rel: &Path) -> PolicyError {
    PolicyError::PathNotFound(rel.display().to_string())
}

// ── Selection rules ─────────────────────────────────────────────────────────
//
// The reducers take the eligible set by value and return a single-element
// sequence. The pipeline guarantees the set is non-empty; the `not_found`
// fallbacks below are unreachable and exist only to keep the reducers
// panic-free.

fn first<'b>(rel: &Path, set: Vec<&'b Branch>) -> Result<Vec<&'b Branch>> {
    match set.first() {
        Some(branch) => Ok(vec![*branch]),
        None => Err(not_found(rel)),
    }
}

/// Branch maximizing `metric`; exact ties keep the earliest-configured.
fn max_by_metric<'b>(
    rel: &Path,
    set: Vec<&'b Branch>,
    metric: impl Fn(&Branch) -> u64,
) -> Result<Vec<&'b Branch>> {
    let mut iter = set.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(not_found(rel));
    };
    for branch in iter {
        if metric(branch) > metric(best) {
            best = branch;
        }
    }
    Ok(vec![best])
}

/// Branch minimizing `metric`; exact ties keep the earliest-configured.
fn min_by_metric<'b>(
    rel: &Path,
    set: Vec<&'b Branch>,
    metric: impl Fn(&Branch) -> u64,
) -> Result<Vec<&'b Branch>> {
    let mut iter = set.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(not_found(rel));
    };
    for branch in iter {
        if metric(branch) < metric(best) {
            best = branch;
        }
    }
    Ok(vec![best])
}

/// Uniformly random pick over the eligible set.
///
/// `thread_rng` is per-thread, so concurrent selections never contend on a
/// shared random source.
fn pick_random<'b>(rel: &Path, set: Vec<&'b Branch>) -> Result<Vec<&'b Branch>> {
    match set.choose(&mut thread_rng()) {
        Some(branch) => Ok(vec![*branch]),
        None => Err(not_found(rel)),
    }
}

// ── The catalogue ───────────────────────────────────────────────────────────

/// `all`: every eligible branch, in configured order.
pub fn all<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: false,
            floored: false,
        },
    )
}

/// `epall`: every branch where the path exists.
pub fn epall<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: false,
        },
    )
}

/// `ff` (first found): first eligible branch in configured order.
pub fn ff<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: false,
            floored: true,
        },
    )?;
    first(rel, set)
}

/// `epff`: first branch, among those where the path exists.
pub fn epff<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: true,
        },
    )?;
    first(rel, set)
}

/// `mfs` (most free space): branch with the most free bytes.
pub fn mfs<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: false,
            floored: false,
        },
    )?;
    max_by_metric(rel, set, |b| b.space.free)
}

/// `epmfs`: most free space, among branches where the path exists.
pub fn epmfs<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: false,
        },
    )?;
    max_by_metric(rel, set, |b| b.space.free)
}

/// `lfs` (least free space): tightest branch still above the floor.
pub fn lfs<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: false,
            floored: true,
        },
    )?;
    min_by_metric(rel, set, |b| b.space.free)
}

/// `eplfs`: least free space, among branches where the path exists.
pub fn eplfs<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: true,
        },
    )?;
    min_by_metric(rel, set, |b| b.space.free)
}

/// `lus` (least used space): branch with the fewest used bytes.
pub fn lus<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: false,
            floored: false,
        },
    )?;
    min_by_metric(rel, set, |b| b.space.used)
}

/// `eplus`: least used space, among branches where the path exists.
pub fn eplus<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: false,
        },
    )?;
    min_by_metric(rel, set, |b| b.space.used)
}

/// `rand`: uniformly random eligible branch.
pub fn rand<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: false,
            floored: true,
        },
    )?;
    pick_random(rel, set)
}

/// `eprand`: random pick among branches where the path exists.
pub fn eprand<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: true,
        },
    )?;
    pick_random(rel, set)
}

/// `newest`: branch holding the most recently modified copy of the path.
///
/// Existence is filtered first; a branch whose mtime cannot be read
/// afterwards (the entry raced away) is skipped rather than failing the
/// whole selection.
pub fn newest<'b>(
    category: Category,
    branches: &'b [Branch],
    rel: &Path,
    min_free: u64,
    probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    let set = eligible(
        category,
        branches,
        rel,
        min_free,
        probe,
        Filters {
            existing: true,
            floored: false,
        },
    )?;

    let mut best: Option<(&Branch, SystemTime)> = None;
    for branch in set {
        let Some(mtime) = probe.mtime(branch, rel) else {
            continue;
        };
        match best {
            Some((_, best_mtime)) if mtime <= best_mtime => {}
            _ => best = Some((branch, mtime)),
        }
    }

    match best {
        Some((branch, _)) => Ok(vec![branch]),
        None => Err(not_found(rel)),
    }
}

/// `erofs`: deliberately read-only pseudo-policy; rejects every request.
pub fn erofs<'b>(
    _category: Category,
    _branches: &'b [Branch],
    _rel: &Path,
    _min_free: u64,
    _probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    Err(PolicyError::ReadOnly)
}

/// Placeholder algorithm for the `invalid` descriptor; never selectable
/// through configuration.
pub fn invalid<'b>(
    _category: Category,
    _branches: &'b [Branch],
    _rel: &Path,
    _min_free: u64,
    _probe: &dyn BranchProbe,
) -> Result<Vec<&'b Branch>> {
    Err(PolicyError::UnknownPolicy("invalid".to_owned()))
}
