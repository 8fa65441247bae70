//! The shared four-phase link-list diff, the core of `UpdateDiffSolver`
//! and `StateDiffSolver`. Grounded on
//! `uberdot/differencesolver.py`'s `LinkListDiffSolver.solve_link_list`.

use anyhow::{bail, Result};

use crate::difflog::DiffLog;
use crate::model::LinkDescriptor;

/// Diff `installed` against `new`, emitting operations into `log`.
/// Returns whether the profile's link set actually changed (any
/// add/remove/update/track/untrack operation was emitted).
pub fn solve_link_list(
    log: &mut DiffLog,
    profile: &str,
    mut installed: Vec<LinkDescriptor>,
    mut new: Vec<LinkDescriptor>,
) -> Result<bool> {
    // Phase 1: drop exactly-equal pairs.
    let mut equal_count = 0usize;
    installed.retain(|inst| {
        if let Some(pos) = new.iter().position(|n| inst.is_equal(n)) {
            new.remove(pos);
            equal_count += 1;
            false
        } else {
            true
        }
    });
    if equal_count > 0 {
        log.info(
            profile,
            format!("{equal_count} link(s) unchanged"),
        );
    }

    let mut changed = false;

    // Phase 2: installed links with no similar counterpart in `new` are
    // removed.
    installed.retain(|inst| {
        let has_similar = new.iter().any(|n| inst.is_similar(n));
        if has_similar {
            true
        } else {
            log.remove_link(profile.to_string(), inst.clone());
            changed = true;
            false
        }
    });

    // Phase 3: every remaining new link either updates a similar installed
    // link or is freshly added/tracked. Each installed link is consumed at
    // most once.
    let drained: Vec<LinkDescriptor> = new.drain(..).collect();
    for n in drained {
        if let Some(pos) = installed.iter().position(|inst| inst.is_similar(&n)) {
            let old = installed.remove(pos);
            let same_content = old.same_file_content(&n).unwrap_or(false);
            if same_content {
                log.update_tracked(profile.to_string(), old, n);
            } else {
                log.update_link(profile.to_string(), old, n);
            }
            changed = true;
        } else if n.path.exists() {
            log.track_link(profile.to_string(), n);
            changed = true;
        } else {
            log.add_link(profile.to_string(), n);
            changed = true;
        }
    }
    // Phase 4: both working lists must now be empty.
    if !installed.is_empty() || !new.is_empty() {
        bail!(
            "couldn't resolve differences between the installed and new version of profile '{profile}' ({} installed, {} new left over)",
            installed.len(),
            new.len()
        );
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Owner;
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
    fn identical_lists_produce_no_mutations() {
        let mut log = DiffLog::new();
        let a = vec![link("/home/u/.a", "/repo/a")];
        let b = a.clone();
        let changed = solve_link_list(&mut log, "work", a, b).unwrap();
        assert!(!changed);
        assert!(log
            .operations
            .iter()
            .all(|op| matches!(op, crate::difflog::Operation::Info { .. })));
    }

    #[test]
    fn removed_link_not_similar_to_anything() {
        let mut log = DiffLog::new();
        let installed = vec![link("/home/u/.a", "/repo/a")];
        let new = vec![];
        let changed = solve_link_list(&mut log, "work", installed, new).unwrap();
        assert!(changed);
        assert!(matches!(
            log.operations[0],
            crate::difflog::Operation::RemoveLink { .. } | crate::difflog::Operation::UntrackLink { .. }
        ));
    }

    #[test]
    fn added_link_with_no_similar_counterpart() {
        let mut log = DiffLog::new();
        let installed = vec![];
        let new = vec![link("/home/u/.new", "/repo/new")];
        let changed = solve_link_list(&mut log, "work", installed, new).unwrap();
        assert!(changed);
        assert!(matches!(
            log.operations[0],
            crate::difflog::Operation::AddLink { .. }
        ));
    }

    #[test]
    fn similar_link_with_different_target_updates() {
        let mut log = DiffLog::new();
        let installed = vec![link("/home/u/.a", "/repo/a")];
        let new = vec![link("/home/u/.a", "/repo/a2")];
        let changed = solve_link_list(&mut log, "work", installed, new).unwrap();
        assert!(changed);
        assert!(matches!(
            log.operations[0],
            crate::difflog::Operation::UpdateLink { .. }
        ));
    }
}
