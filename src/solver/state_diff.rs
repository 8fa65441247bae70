//! `StateDiffSolver`: timewarp — compute the operations that transform
//! state `from` into state `to`. Grounded on
//! `uberdot/differencesolver.py`'s `StateDiffSolver`.

use anyhow::Result;

use crate::difflog::DiffLog;
use crate::model::EventKind;
use crate::state::State;

use super::{link_diff, remove_profile};

pub fn generate_operations(
    log: &mut DiffLog,
    from: &State,
    to: &State,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let in_scope = |name: &str| -> bool {
        if !include.is_empty() && !include.iter().any(|n| n == name) {
            return false;
        }
        !exclude.iter().any(|n| n == name)
    };

    // Profiles only in `from`: remove.
    for (name, _) in from.profiles.iter().filter(|(n, _)| in_scope(n)) {
        if !to.profiles.contains_key(name) {
            remove_profile::remove_one(log, from, name);
        }
    }

    // Profiles in both: diff links and non-link properties.
    for (name, to_profile) in to.profiles.iter().filter(|(n, _)| in_scope(n)) {
        let Some(from_profile) = from.profiles.get(name) else {
            continue;
        };

        let changed = link_diff::solve_link_list(
            log,
            name,
            from_profile.links.clone(),
            to_profile.links.clone(),
        )?;

        if from_profile.parent != to_profile.parent {
            log.update_property(name.clone(), "parent", to_profile.parent.clone());
        }
        for kind in EventKind::ALL {
            let old = from_profile.events.get(kind);
            let new = to_profile.events.get(kind);
            if old != new {
                log.update_property(
                    name.clone(),
                    kind.field_name(),
                    if new.is_empty() {
                        None
                    } else {
                        Some(new.to_string())
                    },
                );
            }
        }
        if changed {
            log.update_profile(name.clone());
        }
    }

    // Profiles only in `to`: add.
    for (name, to_profile) in to.profiles.iter().filter(|(n, _)| in_scope(n)) {
        if from.profiles.contains_key(name) {
            continue;
        }
        log.add_profile(name.clone(), to_profile.parent.clone());
        for kind in EventKind::ALL {
            let val = to_profile.events.get(kind);
            if !val.is_empty() {
                log.update_property(name.clone(), kind.field_name(), Some(val.to_string()));
            }
        }
        for link in &to_profile.links {
            log.add_link(name.clone(), link.clone());
        }
    }

    Ok(())
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
    fn profile_only_in_target_is_added() {
        let from = State::empty();
        let mut to = State::empty();
        let mut ps = ProfileState::new("work");
        ps.links.push(link("/home/u/.a", "/repo/a"));
        to.profiles.insert("work".into(), ps);

        let mut log = DiffLog::new();
        generate_operations(&mut log, &from, &to, &[], &[]).unwrap();

        assert!(log
            .operations
            .iter()
            .any(|op| matches!(op, Operation::AddProfile { profile, .. } if profile == "work")));
    }

    #[test]
    fn profile_only_in_source_is_removed() {
        let mut from = State::empty();
        from.profiles.insert("work".into(), ProfileState::new("work"));
        let to = State::empty();

        let mut log = DiffLog::new();
        generate_operations(&mut log, &from, &to, &[], &[]).unwrap();

        assert!(log
            .operations
            .iter()
            .any(|op| matches!(op, Operation::RemoveProfile { profile } if profile == "work")));
    }
}
