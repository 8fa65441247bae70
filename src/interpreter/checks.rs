//! The seven check interpreters from spec.md §4.5. Each fails fast with a
//! precondition/integrity error before any filesystem mutation happens, so
//! a rejected DiffLog leaves state untouched (spec.md §7's recovery
//! policy). Grounded on `uberdot/interpreters.py`'s `Check*Interpreter`
//! family.

use std::collections::HashSet;

use regex::Regex;

use crate::difflog::Interpreter;
use crate::model::LinkDescriptor;
use crate::state::State;
use crate::utils::ReconcileError;

/// Every operation's stated precondition holds against the starting
/// state: `remove_l` references a tracked link, `add_l`'s target exists,
/// `update_l`'s old link is tracked and its new target exists.
pub struct CheckDiffsolverResult<'a> {
    state: &'a State,
}

impl<'a> CheckDiffsolverResult<'a> {
    pub fn new(state: &'a State) -> Self {
        CheckDiffsolverResult { state }
    }

    fn is_tracked(&self, profile: &str, link: &LinkDescriptor) -> bool {
        self.state
            .profiles
            .get(profile)
            .map(|p| p.links.iter().any(|l| l.path == link.path))
            .unwrap_or(false)
    }
}

impl<'a> Interpreter for CheckDiffsolverResult<'a> {
    fn on_remove_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        if !self.is_tracked(profile, link) {
            return Err(ReconcileError::Precondition(format!(
                "remove_l references untracked link {} in profile '{profile}'",
                link.path.display()
            ))
            .into());
        }
        Ok(())
    }

    fn on_add_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        if !link.hard {
            if !link.target().exists() {
                return Err(ReconcileError::Precondition(format!(
                    "add_l target {} does not exist (profile '{profile}')",
                    link.target().display()
                ))
                .into());
            }
        }
        Ok(())
    }

    fn on_update_link(&mut self, profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        if !self.is_tracked(profile, old) {
            return Err(ReconcileError::Precondition(format!(
                "update_l's old link {} is not tracked in profile '{profile}'",
                old.path.display()
            ))
            .into());
        }
        if !new.hard && !new.target().exists() {
            return Err(ReconcileError::Precondition(format!(
                "update_l's new target {} does not exist (profile '{profile}')",
                new.target().display()
            ))
            .into());
        }
        Ok(())
    }
}

/// No profile is added twice; a profile cannot be added and updated in the
/// same log; a profile already installed under root R cannot be
/// reinstalled under a different root unless `--parent` explicitly
/// requests it.
pub struct CheckProfiles<'a> {
    state: &'a State,
    explicit_parent: bool,
    added: HashSet<String>,
    updated: HashSet<String>,
}

impl<'a> CheckProfiles<'a> {
    pub fn new(state: &'a State, explicit_parent: bool) -> Self {
        CheckProfiles {
            state,
            explicit_parent,
            added: HashSet::new(),
            updated: HashSet::new(),
        }
    }
}

impl<'a> Interpreter for CheckProfiles<'a> {
    fn on_add_profile(&mut self, profile: &str, _parent: Option<&str>) -> anyhow::Result<()> {
        if !self.added.insert(profile.to_string()) {
            return Err(ReconcileError::Integrity(format!(
                "profile '{profile}' is added twice in the same run"
            ))
            .into());
        }
        if self.updated.contains(profile) {
            return Err(ReconcileError::Integrity(format!(
                "profile '{profile}' is both added and updated in the same run"
            ))
            .into());
        }
        if self.state.profiles.contains_key(profile) && !self.explicit_parent {
            return Err(ReconcileError::Integrity(format!(
                "profile '{profile}' is already installed; pass --parent to reinstall under a different root"
            ))
            .into());
        }
        Ok(())
    }

    fn on_update_profile(&mut self, profile: &str) -> anyhow::Result<()> {
        if self.added.contains(profile) {
            return Err(ReconcileError::Integrity(format!(
                "profile '{profile}' is both added and updated in the same run"
            ))
            .into());
        }
        self.updated.insert(profile.to_string());
        Ok(())
    }
}

/// No two operations create the same path; a path already installed by
/// another profile — the current user's or a foreign user's, seeded from
/// [`crate::state::global::GlobalState`] — is rejected unless it was
/// already removed earlier in the same log (which `--dui`'s
/// delete-before-insert reordering is what makes reachable).
pub struct CheckLinks {
    current_user: String,
    linklist: Vec<(std::path::PathBuf, String, String, bool)>,
}

impl CheckLinks {
    pub fn new(global: &crate::state::global::GlobalState) -> Self {
        CheckLinks {
            current_user: global.current_user.clone(),
            linklist: global
                .links
                .iter()
                .map(|l| (l.path.clone(), l.profile.clone(), l.user.clone(), l.installed))
                .collect(),
        }
    }

    fn add(&mut self, path: &std::path::Path, profile: &str) -> anyhow::Result<()> {
        if let Some((_, other_profile, other_user, installed)) =
            self.linklist.iter().find(|(p, ..)| p == path)
        {
            let verb = if *installed { "installed" } else { "defined" };
            let user_note = if other_user != &self.current_user {
                format!(" of user '{other_user}'")
            } else {
                String::new()
            };
            return Err(ReconcileError::Integrity(format!(
                "the link {} is already {verb} by '{other_profile}'{user_note} and would be overwritten by '{profile}'; this can sometimes be fixed with --dui",
                path.display()
            ))
            .into());
        }
        self.linklist.push((
            path.to_path_buf(),
            profile.to_string(),
            self.current_user.clone(),
            false,
        ));
        Ok(())
    }

    fn remove(&mut self, path: &std::path::Path) {
        if let Some(idx) = self.linklist.iter().position(|(p, ..)| p == path) {
            self.linklist.remove(idx);
        }
    }
}

impl Interpreter for CheckLinks {
    fn on_add_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.add(&link.path, profile)
    }
    fn on_track_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.add(&link.path, profile)
    }
    fn on_remove_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.remove(&link.path);
        Ok(())
    }
    fn on_untrack_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.remove(&link.path);
        Ok(())
    }
    fn on_update_link(&mut self, profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        self.remove(&old.path);
        self.add(&new.path, profile)
    }
}

/// Operations touching paths matching any blacklist pattern are rejected
/// unless `--superforce` is set (which also requires explicit `YES`
/// confirmation, enforced by the caller before this interpreter runs).
pub struct CheckLinkBlacklist {
    patterns: Vec<Regex>,
    superforce: bool,
}

impl CheckLinkBlacklist {
    pub fn new(patterns: Vec<Regex>, superforce: bool) -> Self {
        CheckLinkBlacklist { patterns, superforce }
    }

    fn check(&self, link: &LinkDescriptor) -> anyhow::Result<()> {
        let path_str = link.path.to_string_lossy();
        if self.superforce {
            return Ok(());
        }
        if let Some(pat) = self.patterns.iter().find(|p| p.is_match(&path_str)) {
            return Err(ReconcileError::Integrity(format!(
                "path {} matches blacklist pattern '{}'; re-run with --superforce to override",
                link.path.display(),
                pat.as_str()
            ))
            .into());
        }
        Ok(())
    }
}

impl Interpreter for CheckLinkBlacklist {
    fn on_add_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(link)
    }
    fn on_remove_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(link)
    }
    fn on_update_link(&mut self, _profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(old)?;
        self.check(new)
    }
}

/// If a link's parent directory does not exist and `--makedirs` is not
/// set, fail.
pub struct CheckLinkDirs {
    makedirs: bool,
}

impl CheckLinkDirs {
    pub fn new(makedirs: bool) -> Self {
        CheckLinkDirs { makedirs }
    }

    fn check(&self, link: &LinkDescriptor) -> anyhow::Result<()> {
        if self.makedirs {
            return Ok(());
        }
        if let Some(parent) = link.path.parent() {
            if !parent.exists() {
                return Err(ReconcileError::Precondition(format!(
                    "parent directory {} does not exist; re-run with --makedirs",
                    parent.display()
                ))
                .into());
            }
        }
        Ok(())
    }
}

impl Interpreter for CheckLinkDirs {
    fn on_add_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(link)
    }
    fn on_update_link(&mut self, _profile: &str, _old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(new)
    }
}

/// A pre-existing file or non-empty directory at the target path of
/// `add_l`/`update_l` is rejected unless `--force` is set (empty
/// directories still require `--force`).
pub struct CheckFileOverwrite {
    force: bool,
}

impl CheckFileOverwrite {
    pub fn new(force: bool) -> Self {
        CheckFileOverwrite { force }
    }

    fn check(&self, link: &LinkDescriptor) -> anyhow::Result<()> {
        if self.force {
            return Ok(());
        }
        let meta = match std::fs::symlink_metadata(&link.path) {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        if meta.file_type().is_symlink() {
            return Ok(());
        }
        Err(ReconcileError::Precondition(format!(
            "{} already exists and is not a symlink; re-run with --force to overwrite",
            link.path.display()
        ))
        .into())
    }
}

impl Interpreter for CheckFileOverwrite {
    fn on_add_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(link)
    }
    fn on_update_link(&mut self, _profile: &str, _old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(new)
    }
}

/// If an installed link points at a DynamicFile subdirectory and the
/// content hash no longer matches the name's recorded hash, fail with a
/// message instructing the user to run `sync`.
#[derive(Default)]
pub struct CheckDynamicFiles;

impl CheckDynamicFiles {
    fn check(&self, link: &LinkDescriptor) -> anyhow::Result<()> {
        let Some(target) = &link.target else {
            return Ok(());
        };
        let Some(fname) = target.file_name().and_then(|n| n.to_str()) else {
            return Ok(());
        };
        let Some((_, expected_sum)) = fname.rsplit_once('#') else {
            return Ok(());
        };
        let Ok(content) = std::fs::read(target) else {
            return Ok(());
        };
        let actual_sum = crate::dynamicfile::md5sum(&content);
        if actual_sum != expected_sum {
            return Err(ReconcileError::Precondition(format!(
                "{} content no longer matches its recorded checksum; run `dotty sync` first",
                target.display()
            ))
            .into());
        }
        Ok(())
    }
}

impl Interpreter for CheckDynamicFiles {
    fn on_add_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(link)
    }
    fn on_update_link(&mut self, _profile: &str, old: &LinkDescriptor, _new: &LinkDescriptor) -> anyhow::Result<()> {
        self.check(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difflog::DiffLog;
    use crate::model::{Owner, ProfileState};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn link(path: std::path::PathBuf, target: std::path::PathBuf) -> LinkDescriptor {
        LinkDescriptor::symbolic(path, target, Owner::inherit(), None, false, None)
    }

    #[test]
    fn check_profiles_rejects_double_add() {
        let state = State::empty();
        let mut log = DiffLog::new();
        log.add_profile("work", None);
        log.push(crate::difflog::Operation::AddProfile {
            profile: "work".into(),
            parent: None,
        });
        let mut check = CheckProfiles::new(&state, false);
        assert!(log.run(&mut [&mut check]).is_err());
    }

    #[test]
    fn check_profiles_rejects_reinstall_without_parent() {
        let mut state = State::empty();
        state.profiles.insert("work".into(), ProfileState::new("work"));
        let mut log = DiffLog::new();
        log.add_profile("work", None);
        let mut check = CheckProfiles::new(&state, false);
        assert!(log.run(&mut [&mut check]).is_err());

        let mut log2 = DiffLog::new();
        log2.add_profile("work", None);
        let mut check2 = CheckProfiles::new(&state, true);
        assert!(log2.run(&mut [&mut check2]).is_ok());
    }

    #[test]
    fn check_links_rejects_duplicate_path() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("t");
        std::fs::write(&target, b"x").unwrap();
        let path = dir.path().join("link");

        let mut log = DiffLog::new();
        log.add_link("a", link(path.clone(), target.clone()));
        log.track_link("b", link(path, target));

        let global = crate::state::global::GlobalState::load("me", &State::empty(), &[]);
        let mut check = CheckLinks::new(&global);
        assert!(log.run(&mut [&mut check]).is_err());
    }

    #[test]
    fn check_links_rejects_conflict_with_foreign_user() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("t");
        std::fs::write(&target, b"x").unwrap();
        let path = dir.path().join("shared-link");

        let mut foreign_state = State::empty();
        let mut foreign_profile = ProfileState::new("bobs-profile");
        foreign_profile.links.push(link(path.clone(), target.clone()));
        foreign_state
            .profiles
            .insert("bobs-profile".into(), foreign_profile);

        let foreign = crate::config::engine::ForeignUser {
            name: "bob".into(),
            session_dir: dir.path().join("bob-session"),
        };
        crate::state::store::save(&foreign.session_dir, &foreign_state).unwrap();

        let global = crate::state::global::GlobalState::load("alice", &State::empty(), &[foreign]);
        let mut log = DiffLog::new();
        log.add_link("mine", link(path, target));
        let mut check = CheckLinks::new(&global);
        let err = log.run(&mut [&mut check]).unwrap_err();
        assert!(err.to_string().contains("bob"));
    }

    #[test]
    fn blacklist_blocks_unless_superforce() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("t");
        std::fs::write(&target, b"x").unwrap();
        let path = dir.path().join("secret-key");

        let mut log = DiffLog::new();
        log.add_link("a", link(path.clone(), target.clone()));
        let patterns = vec![Regex::new("secret").unwrap()];

        let mut blocked = CheckLinkBlacklist::new(patterns.clone(), false);
        assert!(log.run(&mut [&mut blocked]).is_err());

        let mut allowed = CheckLinkBlacklist::new(patterns, true);
        assert!(log.run(&mut [&mut allowed]).is_ok());
    }

    #[test]
    fn overwrite_check_allows_symlinks_blocks_regular_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("t");
        std::fs::write(&target, b"x").unwrap();
        let path = dir.path().join("existing");
        std::fs::write(&path, b"conflict").unwrap();

        let mut log = DiffLog::new();
        log.add_link("a", link(path, target));
        let mut check = CheckFileOverwrite::new(false);
        assert!(log.run(&mut [&mut check]).is_err());
    }

    #[test]
    fn dirs_check_requires_makedirs() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("t");
        std::fs::write(&target, b"x").unwrap();
        let path = dir.path().join("nested").join("deep").join("link");

        let mut log = DiffLog::new();
        log.add_link("a", link(path, target));
        let mut check = CheckLinkDirs::new(false);
        assert!(log.run(&mut [&mut check]).is_err());
    }
}
