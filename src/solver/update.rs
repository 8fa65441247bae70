//! `UpdateDiffSolver`: the main solver run on every `dotty update`.
//! Grounded on `uberdot/differencesolver.py`'s `UpdateDiffSolver`.

use std::collections::HashSet;

use anyhow::Result;

use crate::difflog::DiffLog;
use crate::model::EventKind;
use crate::profile_builder::ProfileResult;
use crate::state::State;

use super::{link_diff, uninstall};

pub fn generate_operations(
    log: &mut DiffLog,
    state: &State,
    profile_results: &[ProfileResult],
    parent: Option<&str>,
    exclude: &[String],
) -> Result<()> {
    let mut all_names = HashSet::new();
    for p in profile_results {
        collect_names(p, &mut all_names);
    }

    for p in profile_results {
        generate_profile_link(log, state, p, parent, exclude, &all_names)?;
    }
    Ok(())
}

fn collect_names(p: &ProfileResult, out: &mut HashSet<String>) {
    out.insert(p.name.clone());
    for sub in &p.subprofiles {
        collect_names(sub, out);
    }
}

fn generate_profile_link(
    log: &mut DiffLog,
    state: &State,
    profile: &ProfileResult,
    parent_name: Option<&str>,
    exclude: &[String],
    all_names: &HashSet<String>,
) -> Result<()> {
    if exclude.iter().any(|e| e == &profile.name) {
        return Ok(());
    }

    let installed = state.profiles.get(&profile.name);
    let profile_new = installed.is_none();

    if profile_new {
        log.add_profile(profile.name.clone(), parent_name.map(str::to_string));
    }

    let installed_links = installed.map(|p| p.links.clone()).unwrap_or_default();
    let profile_changed = link_diff::solve_link_list(
        log,
        &profile.name,
        installed_links,
        profile.links.clone(),
    )?;

    if let Some(installed) = installed {
        remove_stale_subprofiles(log, state, profile, all_names, exclude);

        let parent_changed = installed.parent.as_deref() != parent_name;
        if parent_changed {
            log.update_property(
                profile.name.clone(),
                "parent",
                parent_name.map(str::to_string),
            );
        } else if profile_changed && !profile_new {
            log.update_profile(profile.name.clone());
        }

        for kind in EventKind::ALL {
            let old = installed.events.get(kind);
            let new = profile.events.get(kind);
            if old != new {
                log.update_property(
                    profile.name.clone(),
                    kind.field_name(),
                    if new.is_empty() {
                        None
                    } else {
                        Some(new.to_string())
                    },
                );
            }
        }
    }

    for sub in &profile.subprofiles {
        generate_profile_link(log, state, sub, Some(profile.name.as_str()), exclude, all_names)?;
    }

    Ok(())
}

/// Recursively uninstall old subprofiles (found in `state` by
/// `parent == profile.name`) that aren't in the new profile tree and
/// weren't just reparented elsewhere within it.
fn remove_stale_subprofiles(
    log: &mut DiffLog,
    state: &State,
    profile: &ProfileResult,
    all_names: &HashSet<String>,
    exclude: &[String],
) {
    let installed_subprofiles: Vec<String> = state
        .profiles
        .iter()
        .filter(|(_, p)| p.parent.as_deref() == Some(profile.name.as_str()))
        .map(|(n, _)| n.clone())
        .collect();

    let new_subprofile_names: HashSet<&str> = profile
        .subprofiles
        .iter()
        .map(|p| p.name.as_str())
        .collect();

    let to_remove: Vec<String> = installed_subprofiles
        .into_iter()
        .filter(|name| !new_subprofile_names.contains(name.as_str()))
        .filter(|name| !all_names.contains(name))
        .collect();

    if !to_remove.is_empty() {
        uninstall::generate_operations(log, state, &to_remove, exclude);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difflog::Operation;
    use crate::model::{LinkDescriptor, Owner, ProfileState};
    use std::path::PathBuf;

    fn link(path: &str, target: &str) -> LinkDescriptor {
        LinkDescriptor::symbolic(
            PathBuf::from(path),
            PathBuf::from(target),
            Owner::inherit(),
            None,
            false,
            None,
        )
    }

    #[test]
    fn new_profile_emits_add_profile() {
        let state = State::empty();
        let mut result = ProfileResult::new("work");
        result.links.push(link("/home/u/.a", "/repo/a"));

        let mut log = DiffLog::new();
        generate_operations(&mut log, &state, &[result], None, &[]).unwrap();

        assert!(log
            .operations
            .iter()
            .any(|op| matches!(op, Operation::AddProfile { profile, .. } if profile == "work")));
        assert!(log
            .operations
            .iter()
            .any(|op| matches!(op, Operation::AddLink { profile, .. } if profile == "work")));
    }

    #[test]
    fn idempotent_on_unchanged_profile() {
        let mut state = State::empty();
        let mut ps = ProfileState::new("work");
        ps.links.push(link("/home/u/.a", "/repo/a"));
        state.profiles.insert("work".into(), ps);

        let mut result = ProfileResult::new("work");
        result.links.push(link("/home/u/.a", "/repo/a"));

        let mut log = DiffLog::new();
        generate_operations(&mut log, &state, &[result], None, &[]).unwrap();

        assert!(log.operations.iter().all(|op| matches!(
            op,
            Operation::Info { .. }
        )));
    }

    #[test]
    fn reparented_profile_emits_update_property() {
        let mut state = State::empty();
        state.profiles.insert("work".into(), ProfileState::new("work"));

        let result = ProfileResult::new("work");
        let mut log = DiffLog::new();
        generate_operations(&mut log, &state, &[result], Some("new-parent"), &[]).unwrap();

        assert!(log.operations.iter().any(|op| matches!(
            op,
            Operation::UpdateProperty { profile, key, value }
                if profile == "work" && key == "parent" && value.as_deref() == Some("new-parent")
        )));
    }
}
