//! Load/save/migrate the state document at `<session_dir>/state.json`.
//! Grounded on `limistah-heimdal/src/state/versioned.rs` (atomic
//! temp-file+rename save) and the `nixval-declarch` state-io module's
//! `get_state_path`/load/save split.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use super::{upgrades, State, CURRENT_VERSION, MIN_VERSION};
use crate::utils::ReconcileError;

pub fn state_path(session_dir: &Path) -> PathBuf {
    session_dir.join("state.json")
}

/// Missing file on first run is not an error: an empty state is created.
/// JSON parse failure is a precondition error. Registered upgrade
/// functions run in order and the upgraded document is written back
/// immediately.
pub fn load(session_dir: &Path) -> Result<State> {
    let path = state_path(session_dir);
    if !path.exists() {
        return Ok(State::empty());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read state file: {}", path.display()))?;
    let mut doc: Value = serde_json::from_str(&content).map_err(|e| {
        ReconcileError::Precondition(format!("state file {} is not valid JSON: {e}", path.display()))
    })?;

    let version = doc
        .get("@version")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(CURRENT_VERSION);

    if version < MIN_VERSION {
        return Err(ReconcileError::Precondition(format!(
            "state file version {version} predates the minimum supported version {MIN_VERSION}"
        ))
        .into());
    }
    if version > CURRENT_VERSION {
        return Err(ReconcileError::Precondition(format!(
            "state file version {version} is newer than this binary supports ({CURRENT_VERSION})"
        ))
        .into());
    }

    let mut migrated = false;
    for (from, upgrade) in upgrades::UPGRADES {
        let cur = doc
            .get("@version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(CURRENT_VERSION);
        if cur == *from {
            upgrade(&mut doc, session_dir)?;
            migrated = true;
        }
    }

    let state = State::from_json(doc)?;
    if migrated {
        save(session_dir, &state)?;
    }
    Ok(state)
}

/// Atomic write: serialize to a temp file in the same directory, then
/// rename over the target, matching `HeimdallStateV2::save`'s pattern.
pub fn save(session_dir: &Path, state: &State) -> Result<()> {
    fs::create_dir_all(session_dir)
        .with_context(|| format!("failed to create session dir: {}", session_dir.display()))?;

    let path = state_path(session_dir);
    let tmp_path = path.with_extension("json.tmp");

    let json = serde_json::to_string_pretty(&state.to_json())
        .context("failed to serialize state document")?;

    let mut tmp = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create temp state file: {}", tmp_path.display()))?;
    tmp.write_all(json.as_bytes())
        .context("failed to write state document")?;
    tmp.sync_all().ok();
    drop(tmp);

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("failed to install state file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_is_empty_state() {
        let dir = tempdir().unwrap();
        let state = load(dir.path()).unwrap();
        assert!(state.profiles.is_empty());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let mut state = State::empty();
        state
            .profiles
            .insert("work".into(), crate::model::ProfileState::new("work"));
        save(dir.path(), &state).unwrap();
        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.profiles.len(), 1);
    }

    #[test]
    fn corrupt_json_is_precondition_error() {
        let dir = tempdir().unwrap();
        fs::write(state_path(dir.path()), "{not json").unwrap();
        let err = load(dir.path()).unwrap_err();
        let re = err.downcast_ref::<ReconcileError>().unwrap();
        assert_eq!(re.exit_code(), 103);
    }

    #[test]
    fn too_new_version_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            state_path(dir.path()),
            serde_json::json!({"@version": CURRENT_VERSION + 1}).to_string(),
        )
        .unwrap();
        let err = load(dir.path()).unwrap_err();
        let re = err.downcast_ref::<ReconcileError>().unwrap();
        assert_eq!(re.exit_code(), 103);
    }

    #[test]
    fn stone_age_document_migrates() {
        let dir = tempdir().unwrap();
        fs::write(
            state_path(dir.path()),
            serde_json::json!({
                "@version": 1,
                "work": {
                    "name": "work",
                    "installed": "2020-01-01T00:00:00Z",
                    "updated": "2020-01-01T00:00:00Z",
                    "links": []
                }
            })
            .to_string(),
        )
        .unwrap();
        let state = load(dir.path()).unwrap();
        assert_eq!(state.version, CURRENT_VERSION);
        assert!(state.profiles.contains_key("work"));
    }
}
