#![forbid(unsafe_code)]
//! Policy inspection and dry-run tool.
//!
//! `policies` lists the registry in canonical order; `select` evaluates a
//! policy against declared branch specs, probing existence on the real
//! directory trees. Space figures come from the spec string rather than
//! statvfs so a selection can be rehearsed against hypothetical fill levels.

use anyhow::{bail, Context, Result};
use meldfs::{Branch, BranchMode, Category, DiskSpace, FsProbe, Policy};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct PolicyRow {
    name: &'static str,
    id: i8,
    path_preserving: bool,
}

#[derive(Debug, Serialize)]
struct SelectOutput {
    policy: &'static str,
    category: &'static str,
    selected: Vec<PathBuf>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "policies" => {
            let json = args.any(|arg| arg == "--json");
            policies_cmd(json)
        }
        "select" => select_cmd(args.collect()),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("meldfs-cli\n");
    println!("USAGE:");
    println!("  meldfs-cli policies [--json]");
    println!("  meldfs-cli select <policy> <category> <rel-path> \\");
    println!("      --branch <path>:<free>:<total>[:ro] ... [--min-free <bytes>] [--json]");
    println!();
    println!("Sizes accept K/M/G/T suffixes (binary). Existence of <rel-path>");
    println!("is probed under each branch path on the real filesystem.");
}

fn policies_cmd(json: bool) -> Result<()> {
    let rows: Vec<PolicyRow> = Policy::all()
        .iter()
        .map(|policy| PolicyRow {
            name: policy.name(),
            id: policy.id() as i8,
            path_preserving: policy.path_preserving(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{:<8} {:>3}  path-preserving", "name", "id");
        for row in rows {
            println!(
                "{:<8} {:>3}  {}",
                row.name,
                row.id,
                if row.path_preserving { "yes" } else { "no" }
            );
        }
    }
    Ok(())
}

fn select_cmd(args: Vec<String>) -> Result<()> {
    let mut positional = Vec::new();
    let mut branches = Vec::new();
    let mut min_free = 0_u64;
    let mut json = false;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--branch" | "-b" => {
                let Some(spec) = iter.next() else {
                    bail!("--branch requires a <path>:<free>:<total>[:ro] spec");
                };
                branches.push(parse_branch_spec(&spec)?);
            }
            "--min-free" => {
                let Some(value) = iter.next() else {
                    bail!("--min-free requires a byte count");
                };
                min_free = parse_bytes(&value)
                    .with_context(|| format!("bad --min-free value: {value}"))?;
            }
            "--json" => json = true,
            _ => positional.push(arg),
        }
    }

    let [policy_name, category_name, rel] = positional.as_slice() else {
        bail!("select requires <policy> <category> <rel-path>");
    };
    if branches.is_empty() {
        bail!("select requires at least one --branch spec");
    }

    let policy = Policy::find(policy_name)
        .with_context(|| format!("policy {policy_name:?} is not registered"))?;
    let category: Category = category_name
        .parse()
        .with_context(|| format!("bad category {category_name:?}"))?;

    let result = policy
        .bind(category)
        .select(&branches, Path::new(rel), min_free, &FsProbe);

    match result {
        Ok(selected) => {
            let output = SelectOutput {
                policy: policy.name(),
                category: category.as_str(),
                selected: selected.iter().map(|b| b.path.clone()).collect(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for path in &output.selected {
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
        Err(error) => {
            bail!("selection failed: {error} (errno {})", error.to_errno())
        }
    }
}

/// Parse `<path>:<free>:<total>[:ro]` into a branch with a declared space
/// snapshot.
///
/// The size and mode fields are taken from the right, so the branch path
/// itself may contain colons. A path whose final component is literally
/// `ro` or `rw` after a colon cannot be expressed; no size field can be.
fn parse_branch_spec(spec: &str) -> Result<Branch> {
    let mut rest = spec;
    let mode = match rest.rsplit_once(':') {
        Some((head, "ro")) => {
            rest = head;
            BranchMode::ReadOnly
        }
        Some((head, "rw")) => {
            rest = head;
            BranchMode::ReadWrite
        }
        _ => BranchMode::ReadWrite,
    };
    let Some((rest, total)) = rest.rsplit_once(':') else {
        bail!("bad branch spec {spec:?}: expected <path>:<free>:<total>[:ro]");
    };
    let Some((path, free)) = rest.rsplit_once(':') else {
        bail!("bad branch spec {spec:?}: expected <path>:<free>:<total>[:ro]");
    };
    if path.is_empty() {
        bail!("bad branch spec {spec:?}: empty branch path");
    }

    let free = parse_bytes(free).with_context(|| format!("bad free size in {spec:?}"))?;
    let total = parse_bytes(total).with_context(|| format!("bad total size in {spec:?}"))?;
    let space = DiskSpace::new(total, free)
        .with_context(|| format!("inconsistent space figures in {spec:?}"))?;

    Ok(Branch::new(PathBuf::from(path), mode, space))
}

/// Parse a byte count with an optional binary K/M/G/T suffix.
fn parse_bytes(value: &str) -> Result<u64> {
    let value = value.trim();
    let (digits, shift) = match value.as_bytes().last() {
        Some(b'K' | b'k') => (&value[..value.len() - 1], 10),
        Some(b'M' | b'm') => (&value[..value.len() - 1], 20),
        Some(b'G' | b'g') => (&value[..value.len() - 1], 30),
        Some(b'T' | b't') => (&value[..value.len() - 1], 40),
        _ => (value, 0),
    };
    let base: u64 = digits.parse().context("not a number")?;
    base.checked_mul(1_u64 << shift).context("size overflows u64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bytes_handles_suffixes() {
        assert_eq!(parse_bytes("0").unwrap(), 0);
        assert_eq!(parse_bytes("4096").unwrap(), 4096);
        assert_eq!(parse_bytes("4K").unwrap(), 4096);
        assert_eq!(parse_bytes("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_bytes("1g").unwrap(), 1 << 30);
        assert_eq!(parse_bytes("3T").unwrap(), 3_u64 << 40);
        assert!(parse_bytes("").is_err());
        assert!(parse_bytes("12X").is_err());
        assert!(parse_bytes("999999999T").is_err());
    }

    #[test]
    fn parse_branch_spec_variants() {
        let branch = parse_branch_spec("/mnt/a:10G:20G").unwrap();
        assert_eq!(branch.path, PathBuf::from("/mnt/a"));
        assert_eq!(branch.mode, BranchMode::ReadWrite);
        assert_eq!(branch.space.free, 10 << 30);
        assert_eq!(branch.space.total, 20_u64 << 30);
        assert_eq!(branch.space.used, 10 << 30);

        let branch = parse_branch_spec("/mnt/b:0:5M:ro").unwrap();
        assert_eq!(branch.mode, BranchMode::ReadOnly);

        assert!(parse_branch_spec("/mnt/c").is_err());
        assert!(parse_branch_spec("/mnt/c:1:2:rx").is_err());
        // free above total
        assert!(parse_branch_spec("/mnt/c:2M:1M").is_err());
    }

    #[test]
    fn parse_branch_spec_allows_colons_in_paths() {
        let branch = parse_branch_spec("/srv/pool:tier1:1G:4G").unwrap();
        assert_eq!(branch.path, PathBuf::from("/srv/pool:tier1"));
        assert_eq!(branch.mode, BranchMode::ReadWrite);
        assert_eq!(branch.space.free, 1 << 30);
        assert_eq!(branch.space.total, 4_u64 << 30);

        let branch = parse_branch_spec("/srv/pool:tier1:1G:4G:ro").unwrap();
        assert_eq!(branch.path, PathBuf::from("/srv/pool:tier1"));
        assert_eq!(branch.mode, BranchMode::ReadOnly);

        assert!(parse_branch_spec(":1:2").is_err());
    }
}
