//! A read-only view across the current user's state plus other users'
//! state files, used only to detect cross-user link conflicts
//! (spec.md §3's `GlobalState`, `uberdot/state.py`'s `GlobalState`).
//! Foreign state files are never written back through this type.

use std::path::PathBuf;

use crate::config::engine::ForeignUser;

use super::{store, State};

/// One link as tracked for conflict detection: which path, which profile
/// and user own it, and whether it's already installed (vs. just added
/// earlier in the run being checked).
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub path: PathBuf,
    pub profile: String,
    pub user: String,
    pub installed: bool,
}

pub struct GlobalState {
    pub current_user: String,
    pub links: Vec<LinkRecord>,
}

impl GlobalState {
    /// Seeds the link list from the current user's state plus every
    /// foreign user's state file that loads successfully. A foreign user
    /// with no state file, or one that fails to load/migrate, is skipped
    /// with a debug log rather than failing the run, matching
    /// `GlobalState.try_load_user_session`'s best-effort behavior.
    pub fn load(current_user: &str, current_state: &State, foreign_users: &[ForeignUser]) -> Self {
        let mut links = Vec::new();
        for (profile_name, profile) in &current_state.profiles {
            for link in &profile.links {
                links.push(LinkRecord {
                    path: link.path.clone(),
                    profile: profile_name.clone(),
                    user: current_user.to_string(),
                    installed: true,
                });
            }
        }

        for foreign in foreign_users {
            let path = store::state_path(&foreign.session_dir);
            if !path.exists() {
                continue;
            }
            match store::load(&foreign.session_dir) {
                Ok(foreign_state) => {
                    for (profile_name, profile) in &foreign_state.profiles {
                        for link in &profile.links {
                            links.push(LinkRecord {
                                path: link.path.clone(),
                                profile: profile_name.clone(),
                                user: foreign.name.clone(),
                                installed: true,
                            });
                        }
                    }
                }
                Err(err) => {
                    log::debug!(
                        "ignoring state file of user '{}': {err}",
                        foreign.name
                    );
                }
            }
        }

        GlobalState {
            current_user: current_user.to_string(),
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProfileState;
    use tempfile::tempdir;

    #[test]
    fn loads_current_user_links() {
        let mut state = State::empty();
        let mut profile = ProfileState::new("work");
        profile.links.push(crate::model::LinkDescriptor::symbolic(
            PathBuf::from("/home/u/.vimrc"),
            PathBuf::from("/repo/vimrc"),
            crate::model::Owner::inherit(),
            None,
            false,
            None,
        ));
        state.profiles.insert("work".into(), profile);

        let global = GlobalState::load("alice", &state, &[]);
        assert_eq!(global.links.len(), 1);
        assert_eq!(global.links[0].user, "alice");
    }

    #[test]
    fn skips_foreign_user_with_no_state_file() {
        let dir = tempdir().unwrap();
        let foreign = ForeignUser {
            name: "bob".into(),
            session_dir: dir.path().to_path_buf(),
        };
        let global = GlobalState::load("alice", &State::empty(), &[foreign]);
        assert!(global.links.is_empty());
    }

    #[test]
    fn loads_foreign_user_links() {
        let dir = tempdir().unwrap();
        let mut foreign_state = State::empty();
        let mut profile = ProfileState::new("shared");
        profile.links.push(crate::model::LinkDescriptor::symbolic(
            PathBuf::from("/home/bob/.bashrc"),
            PathBuf::from("/repo/bashrc"),
            crate::model::Owner::inherit(),
            None,
            false,
            None,
        ));
        foreign_state.profiles.insert("shared".into(), profile);
        store::save(dir.path(), &foreign_state).unwrap();

        let foreign = ForeignUser {
            name: "bob".into(),
            session_dir: dir.path().to_path_buf(),
        };
        let global = GlobalState::load("alice", &State::empty(), &[foreign]);
        assert_eq!(global.links.len(), 1);
        assert_eq!(global.links[0].user, "bob");
    }
}
