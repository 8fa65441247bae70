//! `RemoveProfileDiffSolver`: unconditionally remove named profiles and
//! their tracked links. Grounded on
//! `uberdot/differencesolver.py`'s `RemoveProfileDiffSolver`.

use crate::difflog::DiffLog;
use crate::state::State;
use crate::utils::ReconcileError;

/// For each named profile present in `state`, emit `remove_l` for every
/// tracked link, then `remove_p`. Profiles not found in `state` are
/// warned about (via an `info` op) rather than failing the whole run.
pub fn generate_operations(log: &mut DiffLog, state: &State, profile_names: &[String]) {
    for name in profile_names {
        remove_one(log, state, name);
    }
}

pub fn remove_one(log: &mut DiffLog, state: &State, name: &str) {
    let Some(profile) = state.profiles.get(name) else {
        log.info("_", format!("profile '{name}' is not installed, skipping removal"));
        return;
    };
    for link in &profile.links {
        log.remove_link(name.to_string(), link.clone());
    }
    log.remove_profile(name.to_string());
}

pub fn require_installed(state: &State, name: &str) -> anyhow::Result<()> {
    if !state.profiles.contains_key(name) {
        return Err(ReconcileError::User(format!("profile '{name}' is not installed")).into());
    }
    Ok(())
}
