//! `UninstallDiffSolver`: recursive removal honoring `exclude`. Grounded
//! on `uberdot/differencesolver.py`'s `UninstallDiffSolver`.

use crate::difflog::DiffLog;
use crate::state::State;

use super::remove_profile;

/// Remove every profile named in `include` (and their subprofiles found
/// by scanning `state` for `parent == name`), recursively. A subprofile
/// named in `exclude` is kept installed but reparented to `None` via
/// `update_prop` instead of being removed.
pub fn generate_operations(log: &mut DiffLog, state: &State, include: &[String], exclude: &[String]) {
    for name in include {
        generate_profile_remove(log, state, name, exclude);
    }
}

fn generate_profile_remove(log: &mut DiffLog, state: &State, name: &str, exclude: &[String]) {
    if exclude.iter().any(|e| e == name) {
        log.update_property(name.to_string(), "parent", None);
        return;
    }

    let subprofiles: Vec<String> = state
        .profiles
        .iter()
        .filter(|(_, p)| p.parent.as_deref() == Some(name))
        .map(|(n, _)| n.clone())
        .collect();

    for sub in &subprofiles {
        generate_profile_remove(log, state, sub, exclude);
    }

    remove_profile::remove_one(log, state, name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difflog::Operation;
    use crate::model::ProfileState;

    #[test]
    fn recursively_removes_subprofiles() {
        let mut state = State::empty();
        state.profiles.insert("parent".into(), ProfileState::new("parent"));
        let mut child = ProfileState::new("child");
        child.parent = Some("parent".into());
        state.profiles.insert("child".into(), child);

        let mut log = DiffLog::new();
        generate_operations(&mut log, &state, &["parent".to_string()], &[]);

        let removed: Vec<&str> = log
            .operations
            .iter()
            .filter_map(|op| match op {
                Operation::RemoveProfile { profile } => Some(profile.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec!["child", "parent"]);
    }

    #[test]
    fn excluded_subprofile_is_reparented_not_removed() {
        let mut state = State::empty();
        state.profiles.insert("parent".into(), ProfileState::new("parent"));
        let mut child = ProfileState::new("child");
        child.parent = Some("parent".into());
        state.profiles.insert("child".into(), child);

        let mut log = DiffLog::new();
        generate_operations(
            &mut log,
            &state,
            &["parent".to_string()],
            &["child".to_string()],
        );

        assert!(log.operations.iter().any(|op| matches!(
            op,
            Operation::UpdateProperty { profile, key, value }
                if profile == "child" && key == "parent" && value.is_none()
        )));
        assert!(!log
            .operations
            .iter()
            .any(|op| matches!(op, Operation::RemoveProfile { profile } if profile == "child")));
    }
}
