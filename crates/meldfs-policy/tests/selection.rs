#![forbid(unsafe_code)]
//! End-to-end selection behavior across the registry, driven through the
//! public API the dispatch layer uses: `Policy::find` + `bind` + `select`.

use meldfs_policy::{
    Branch, BranchMode, BranchProbe, Category, DiskSpace, FsProbe, MemProbe, Policy, PolicyError,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const REL: &str = "media/track.flac";

fn rw(path: &str, total: u64, free: u64) -> Branch {
    Branch::new(path, BranchMode::ReadWrite, DiskSpace::new(total, free).unwrap())
}

fn selected_paths(selected: &[&Branch]) -> Vec<PathBuf> {
    selected.iter().map(|b| b.path.clone()).collect()
}

/// The documented three-branch scenario: A(free=100, used=900, path exists),
/// B(free=500, used=500, path exists), C(free=50, used=950, path absent),
/// category=create, floor=60.
fn scenario() -> (Vec<Branch>, MemProbe) {
    let branches = vec![
        rw("/mnt/a", 1000, 100),
        rw("/mnt/b", 1000, 500),
        rw("/mnt/c", 1000, 50),
    ];
    let mut probe = MemProbe::new();
    probe.insert("/mnt/a", REL);
    probe.insert("/mnt/b", REL);
    (branches, probe)
}

#[test]
fn scenario_mfs_selects_most_free() {
    let (branches, probe) = scenario();
    let selected = Policy::find("mfs")
        .unwrap()
        .create()
        .select(&branches, Path::new(REL), 60, &probe)
        .unwrap();
    assert_eq!(selected_paths(&selected), [PathBuf::from("/mnt/b")]);
}

#[test]
fn scenario_lfs_respects_floor_and_selects_tightest() {
    let (branches, probe) = scenario();
    // C(free=50) falls below the 60-byte floor; A(free=100) is the minimum
    // among the survivors.
    let selected = Policy::find("lfs")
        .unwrap()
        .create()
        .select(&branches, Path::new(REL), 60, &probe)
        .unwrap();
    assert_eq!(selected_paths(&selected), [PathBuf::from("/mnt/a")]);
}

#[test]
fn scenario_epmfs_excludes_absent_branch() {
    let (branches, probe) = scenario();
    let selected = Policy::find("epmfs")
        .unwrap()
        .create()
        .select(&branches, Path::new(REL), 60, &probe)
        .unwrap();
    assert_eq!(selected_paths(&selected), [PathBuf::from("/mnt/b")]);
}

#[test]
fn scenario_rand_never_selects_below_floor() {
    let (branches, probe) = scenario();
    let bound = Policy::find("rand").unwrap().create();
    for _ in 0..128 {
        let selected = bound.select(&branches, Path::new(REL), 60, &probe).unwrap();
        assert_ne!(selected_paths(&selected), [PathBuf::from("/mnt/c")]);
    }
}

#[test]
fn rand_covers_every_eligible_branch() {
    let branches: Vec<Branch> = (0..4).map(|i| rw(&format!("/mnt/d{i}"), 100, 50)).collect();
    let probe = MemProbe::new();
    let bound = Policy::find("rand").unwrap().create();

    let mut seen = HashSet::new();
    for _ in 0..512 {
        let selected = bound.select(&branches, Path::new(REL), 0, &probe).unwrap();
        assert_eq!(selected.len(), 1);
        seen.insert(selected[0].path.clone());
    }
    // 512 uniform draws over 4 branches miss one with probability ~1e-63.
    assert_eq!(seen.len(), branches.len());
}

#[test]
fn eprand_covers_only_existing_branches() {
    let branches: Vec<Branch> = (0..4).map(|i| rw(&format!("/mnt/d{i}"), 100, 50)).collect();
    let mut probe = MemProbe::new();
    probe.insert("/mnt/d1", REL);
    probe.insert("/mnt/d3", REL);

    let bound = Policy::find("eprand").unwrap().create();
    let mut seen = HashSet::new();
    for _ in 0..256 {
        let selected = bound.select(&branches, Path::new(REL), 0, &probe).unwrap();
        seen.insert(selected[0].path.clone());
    }
    let expected: HashSet<PathBuf> = [PathBuf::from("/mnt/d1"), PathBuf::from("/mnt/d3")]
        .into_iter()
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn all_and_epall_return_the_exact_eligible_set() {
    let (branches, probe) = scenario();

    let all = Policy::find("all").unwrap();
    let selected = all
        .create()
        .select(&branches, Path::new(REL), 0, &probe)
        .unwrap();
    assert_eq!(
        selected_paths(&selected),
        [
            PathBuf::from("/mnt/a"),
            PathBuf::from("/mnt/b"),
            PathBuf::from("/mnt/c"),
        ]
    );

    let epall = Policy::find("epall").unwrap();
    let selected = epall
        .create()
        .select(&branches, Path::new(REL), 0, &probe)
        .unwrap();
    assert_eq!(
        selected_paths(&selected),
        [PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]
    );

    // Zero branches is a failure, never a silently-empty success.
    assert!(all.create().select(&[], Path::new(REL), 0, &probe).is_err());
    assert!(epall.create().select(&[], Path::new(REL), 0, &probe).is_err());
}

#[test]
fn newest_prefers_latest_copy_across_branches() {
    let branches = vec![
        rw("/mnt/a", 1000, 100),
        rw("/mnt/b", 1000, 500),
        rw("/mnt/c", 1000, 900),
    ];
    let mut probe = MemProbe::new();
    let base = SystemTime::UNIX_EPOCH;
    probe.insert_with_mtime("/mnt/a", REL, base + Duration::from_secs(10));
    probe.insert_with_mtime("/mnt/c", REL, base + Duration::from_secs(20));

    let selected = Policy::find("newest")
        .unwrap()
        .action()
        .select(&branches, Path::new(REL), 0, &probe)
        .unwrap();
    assert_eq!(selected_paths(&selected), [PathBuf::from("/mnt/c")]);
}

#[test]
fn space_floor_rejects_the_only_branch() {
    let branches = vec![rw("/mnt/a", 1000, 10)];
    let probe = MemProbe::new();

    for name in ["ff", "lfs", "rand"] {
        let result = Policy::find(name)
            .unwrap()
            .create()
            .select(&branches, Path::new(REL), 100, &probe);
        assert_eq!(result, Err(PolicyError::NoSpace), "policy {name}");
    }
}

#[test]
fn erofs_policy_fails_every_category() {
    let (branches, probe) = scenario();
    let erofs = Policy::find("erofs").unwrap();
    for category in Category::ALL {
        assert_eq!(
            erofs.bind(category).select(&branches, Path::new(REL), 0, &probe),
            Err(PolicyError::ReadOnly)
        );
    }
}

#[test]
fn results_never_contain_ineligible_branches() {
    // Mixed set: read-only, starved, absent, and one fully eligible branch.
    let branches = vec![
        Branch::new("/mnt/ro", BranchMode::ReadOnly, DiskSpace::new(1000, 800).unwrap()),
        rw("/mnt/starved", 1000, 5),
        rw("/mnt/absent", 1000, 400),
        rw("/mnt/good", 1000, 300),
    ];
    let mut probe = MemProbe::new();
    for path in ["/mnt/ro", "/mnt/starved", "/mnt/good"] {
        probe.insert(path, REL);
    }

    for policy in Policy::all() {
        let Ok(selected) = policy
            .action()
            .select(&branches, Path::new(REL), 50, &probe)
        else {
            continue;
        };
        assert!(!selected.is_empty(), "empty success from {policy}");
        for branch in &selected {
            assert!(branch.is_writable(), "{policy} selected a read-only branch");
            assert!(
                probe.exists(branch, Path::new(REL)),
                "{policy} selected a branch without the path under action",
            );
        }
    }
}

#[test]
fn fs_probe_end_to_end_with_real_directories() {
    let older = tempfile::tempdir().unwrap();
    let newer = tempfile::tempdir().unwrap();
    let empty = tempfile::tempdir().unwrap();

    std::fs::create_dir_all(older.path().join("media")).unwrap();
    std::fs::create_dir_all(newer.path().join("media")).unwrap();
    std::fs::write(older.path().join(REL), b"v1").unwrap();
    let early = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
    let file = std::fs::File::options()
        .write(true)
        .open(older.path().join(REL))
        .unwrap();
    file.set_modified(early).unwrap();
    drop(file);
    std::fs::write(newer.path().join(REL), b"v2").unwrap();

    let branches = vec![
        Branch::new(older.path(), BranchMode::ReadWrite, DiskSpace::new(1000, 100).unwrap()),
        Branch::new(newer.path(), BranchMode::ReadWrite, DiskSpace::new(1000, 500).unwrap()),
        Branch::new(empty.path(), BranchMode::ReadWrite, DiskSpace::new(1000, 900).unwrap()),
    ];
    let probe = FsProbe;

    // Search finds both copies, in configured order.
    let selected = Policy::find("epall")
        .unwrap()
        .search()
        .select(&branches, Path::new(REL), 0, &probe)
        .unwrap();
    assert_eq!(
        selected_paths(&selected),
        [older.path().to_path_buf(), newer.path().to_path_buf()]
    );

    // The branch with no copy loses `newest` despite having the most space.
    let selected = Policy::find("newest")
        .unwrap()
        .search()
        .select(&branches, Path::new(REL), 0, &probe)
        .unwrap();
    assert_eq!(selected_paths(&selected), [newer.path().to_path_buf()]);

    // Create with mfs ignores existence and takes the emptiest branch.
    let selected = Policy::find("mfs")
        .unwrap()
        .create()
        .select(&branches, Path::new(REL), 0, &probe)
        .unwrap();
    assert_eq!(selected_paths(&selected), [empty.path().to_path_buf()]);
}
