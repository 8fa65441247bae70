//! Compares the tracked state against the live filesystem. Grounded on
//! `uberdot/differencesolver.py`'s `StateFilesystemDiffSolver` /
//! `StateFilesystemDiffFinder`.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use anyhow::Result;

use crate::difflog::DiffLog;
use crate::model::LinkDescriptor;
use crate::state::State;

/// What's wrong with one tracked link compared to the live filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    Missing,
    Renamed(std::path::PathBuf),
    Retargeted,
    TypeFlipped,
    OwnerOrPermissionChanged,
}

/// The user's choice (or a pre-selected non-interactive action) for one
/// drifted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftChoice {
    Skip,
    Restore,
    TakeOver,
    Untrack,
}

pub fn detect_drift(link: &LinkDescriptor) -> Option<Drift> {
    if link.hard {
        // Hard links are identified by inode; "missing" means no path in
        // the profile's managed directory still shares that inode.
        return if link.path.exists() {
            None
        } else {
            Some(Drift::Missing)
        };
    }

    let meta = match std::fs::symlink_metadata(&link.path) {
        Ok(m) => m,
        Err(_) => return Some(Drift::Missing),
    };

    if !meta.file_type().is_symlink() {
        return Some(Drift::TypeFlipped);
    }

    let actual_target = match std::fs::read_link(&link.path) {
        Ok(t) => t,
        Err(_) => return Some(Drift::Missing),
    };

    if Some(actual_target.as_path()) != link.target.as_deref() {
        return Some(Drift::Retargeted);
    }

    if link.secure {
        if let Ok(target_meta) = std::fs::metadata(link.target()) {
            if let Some(user) = &link.owner.user {
                if let Some(expected_uid) = crate::utils::path_owner(link.target())
                    .ok()
                    .map(|(uid, _)| uid)
                {
                    if target_meta.uid() != expected_uid {
                        let _ = user;
                        return Some(Drift::OwnerOrPermissionChanged);
                    }
                }
            }
        }
    }

    None
}

/// Scan `dir` for a file whose inode matches `target_inode` (rename
/// detection for hard links and `StateFilesystemDiffSolver`'s
/// renamed-target case).
pub fn find_renamed(dir: &Path, target_inode: u64) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if let Ok(meta) = entry.metadata() {
            if meta.ino() == target_inode {
                return Some(entry.path());
            }
        }
    }
    None
}

/// For every tracked link in `state`, compare to the live filesystem and
/// emit the operation implied by `choice_for` for any drift found. Returns
/// whether anything was emitted (i.e. whether a fix-up run is needed).
pub fn generate_fixes<F>(
    log: &mut DiffLog,
    state: &State,
    exclude: &[String],
    mut choice_for: F,
) -> Result<bool>
where
    F: FnMut(&str, &LinkDescriptor, &Drift) -> DriftChoice,
{
    let mut any = false;
    for (profile_name, profile) in &state.profiles {
        if is_excluded(state, profile_name, exclude) {
            continue;
        }
        for link in &profile.links {
            let Some(drift) = detect_drift(link) else {
                continue;
            };
            any = true;
            match choice_for(profile_name, link, &drift) {
                DriftChoice::Skip => {
                    log.info(profile_name.clone(), format!("skipped drifted link {}", link.path.display()));
                }
                DriftChoice::Untrack => log.untrack_link(profile_name.clone(), link.clone()),
                DriftChoice::Restore => {
                    log.restore_link(profile_name.clone(), link.clone(), link.clone());
                }
                DriftChoice::TakeOver => {
                    if let Some(renamed) = link.target_inode.and_then(|ino| {
                        link.target()
                            .parent()
                            .and_then(|d| find_renamed(d, ino))
                    }) {
                        let mut updated = link.clone();
                        updated.target = Some(renamed);
                        log.update_tracked(profile_name.clone(), link.clone(), updated);
                    } else {
                        log.untrack_link(profile_name.clone(), link.clone());
                    }
                }
            }
        }
    }
    Ok(any)
}

fn is_excluded(state: &State, profile: &str, exclude: &[String]) -> bool {
    if exclude.iter().any(|e| e == profile) {
        return true;
    }
    let mut cur = state.profiles.get(profile).and_then(|p| p.parent.clone());
    while let Some(name) = cur {
        if exclude.iter().any(|e| *e == name) {
            return true;
        }
        cur = state.profiles.get(&name).and_then(|p| p.parent.clone());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Owner, ProfileState};
    use tempfile::tempdir;

    #[test]
    fn missing_target_is_drift() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link");
        let link = LinkDescriptor::symbolic(
            path,
            dir.path().join("missing-target"),
            Owner::inherit(),
            None,
            false,
            None,
        );
        assert_eq!(detect_drift(&link), Some(Drift::Missing));
    }

    #[test]
    fn exclude_applies_to_subprofiles() {
        let mut state = State::empty();
        let mut parent = ProfileState::new("parent");
        parent.parent = None;
        state.profiles.insert("parent".into(), parent);
        let mut child = ProfileState::new("child");
        child.parent = Some("parent".into());
        state.profiles.insert("child".into(), child);

        assert!(is_excluded(&state, "child", &["parent".to_string()]));
        assert!(!is_excluded(&state, "child", &[]));
    }
}
