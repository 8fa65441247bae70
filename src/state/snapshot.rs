//! Immutable timestamped copies of the state document, named
//! `state_<unix-ts>.json` alongside the current state (spec.md §4.1/§6).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{store, State};

pub fn snapshot_path(session_dir: &Path, ts: i64) -> PathBuf {
    session_dir.join(format!("state_{ts}.json"))
}

/// Write the current in-memory document to a new snapshot file and point
/// `@snapshot` at it. Returns the timestamp used as the snapshot id.
pub fn create(session_dir: &Path, state: &mut State, now_ts: i64) -> Result<i64> {
    fs::create_dir_all(session_dir)?;
    let path = snapshot_path(session_dir, now_ts);
    let json = serde_json::to_string_pretty(&state.to_json())
        .context("failed to serialize snapshot")?;
    fs::write(&path, json).with_context(|| format!("failed to write snapshot {}", path.display()))?;
    state.snapshot = Some(now_ts);
    Ok(now_ts)
}

/// Chronologically sorted list of snapshot timestamps present in
/// `session_dir`.
pub fn list(session_dir: &Path) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(session_dir) else {
        return Ok(out);
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("state_").and_then(|s| s.strip_suffix(".json")) {
            if let Ok(ts) = rest.parse::<i64>() {
                out.push(ts);
            }
        }
    }
    out.sort_unstable();
    Ok(out)
}

/// Selects which persisted document to load.
#[derive(Debug, Clone, Copy)]
pub enum Selector {
    Current,
    Timestamp(i64),
    /// Index into the chronologically sorted snapshot list.
    Index(usize),
    /// The latest snapshot with `ts <= given`.
    Before(i64),
}

pub fn load(session_dir: &Path, selector: Selector) -> Result<State> {
    match selector {
        Selector::Current => store::load(session_dir),
        Selector::Timestamp(ts) => load_snapshot_file(session_dir, ts),
        Selector::Index(idx) => {
            let snaps = list(session_dir)?;
            let ts = *snaps
                .get(idx)
                .ok_or_else(|| anyhow::anyhow!("no snapshot at index {idx}"))?;
            load_snapshot_file(session_dir, ts)
        }
        Selector::Before(cutoff) => {
            let snaps = list(session_dir)?;
            let ts = snaps
                .into_iter()
                .filter(|ts| *ts <= cutoff)
                .next_back()
                .ok_or_else(|| anyhow::anyhow!("no snapshot with ts <= {cutoff}"))?;
            load_snapshot_file(session_dir, ts)
        }
    }
}

fn load_snapshot_file(session_dir: &Path, ts: i64) -> Result<State> {
    let path = snapshot_path(session_dir, ts);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("snapshot {} is not valid JSON", path.display()))?;
    State::from_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_list_snapshots() {
        let dir = tempdir().unwrap();
        let mut state = State::empty();
        create(dir.path(), &mut state, 100).unwrap();
        create(dir.path(), &mut state, 200).unwrap();
        let snaps = list(dir.path()).unwrap();
        assert_eq!(snaps, vec![100, 200]);
        assert_eq!(state.snapshot, Some(200));
    }

    #[test]
    fn select_before_cutoff() {
        let dir = tempdir().unwrap();
        let mut state = State::empty();
        create(dir.path(), &mut state, 100).unwrap();
        create(dir.path(), &mut state, 200).unwrap();
        create(dir.path(), &mut state, 300).unwrap();
        let loaded = load(dir.path(), Selector::Before(250)).unwrap();
        assert_eq!(loaded.snapshot, Some(200));
    }

    #[test]
    fn select_index() {
        let dir = tempdir().unwrap();
        let mut state = State::empty();
        create(dir.path(), &mut state, 100).unwrap();
        create(dir.path(), &mut state, 200).unwrap();
        let loaded = load(dir.path(), Selector::Index(0)).unwrap();
        assert_eq!(loaded.snapshot, Some(100));
    }
}
