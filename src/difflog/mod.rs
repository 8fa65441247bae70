//! Append-only operation list and visitor dispatch. Grounded on
//! `uberdot/differencesolver.py`'s `DiffLog`/`run_interpreter`.

pub mod operation;

pub use operation::Operation;

use serde::{Deserialize, Serialize};

use crate::model::LinkDescriptor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffLog {
    pub operations: Vec<Operation>,
}

impl DiffLog {
    pub fn new() -> Self {
        DiffLog::default()
    }

    pub fn push(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn info(&mut self, profile: impl Into<String>, message: impl Into<String>) {
        self.push(Operation::Info {
            profile: profile.into(),
            message: message.into(),
        });
    }

    pub fn add_profile(&mut self, profile: impl Into<String>, parent: Option<String>) {
        self.push(Operation::AddProfile {
            profile: profile.into(),
            parent,
        });
    }

    pub fn update_profile(&mut self, profile: impl Into<String>) {
        self.push(Operation::UpdateProfile {
            profile: profile.into(),
        });
    }

    pub fn remove_profile(&mut self, profile: impl Into<String>) {
        self.push(Operation::RemoveProfile {
            profile: profile.into(),
        });
    }

    pub fn update_property(
        &mut self,
        profile: impl Into<String>,
        key: impl Into<String>,
        value: Option<String>,
    ) {
        self.push(Operation::UpdateProperty {
            profile: profile.into(),
            key: key.into(),
            value,
        });
    }

    pub fn add_link(&mut self, profile: impl Into<String>, link: LinkDescriptor) {
        self.push(Operation::AddLink {
            profile: profile.into(),
            link,
        });
    }

    /// Delegates to `untrack_link` when the link doesn't actually exist on
    /// disk anymore (matching `DiffLog.remove_link`'s behavior in the
    /// original).
    pub fn remove_link(&mut self, profile: impl Into<String>, link: LinkDescriptor) {
        let profile = profile.into();
        let exists = link.hard || link.target.as_deref().map(|t| t.exists()).unwrap_or(false);
        if exists && link_path_matches_target(&link) {
            self.push(Operation::RemoveLink { profile, link });
        } else {
            self.push(Operation::UntrackLink { profile, link });
        }
    }

    pub fn update_link(&mut self, profile: impl Into<String>, old: LinkDescriptor, new: LinkDescriptor) {
        self.push(Operation::UpdateLink {
            profile: profile.into(),
            old,
            new,
        });
    }

    pub fn track_link(&mut self, profile: impl Into<String>, link: LinkDescriptor) {
        self.push(Operation::TrackLink {
            profile: profile.into(),
            link,
        });
    }

    pub fn untrack_link(&mut self, profile: impl Into<String>, link: LinkDescriptor) {
        self.push(Operation::UntrackLink {
            profile: profile.into(),
            link,
        });
    }

    pub fn restore_link(&mut self, profile: impl Into<String>, saved: LinkDescriptor, actual: LinkDescriptor) {
        self.push(Operation::RestoreLink {
            profile: profile.into(),
            saved,
            actual,
        });
    }

    pub fn update_tracked(&mut self, profile: impl Into<String>, old: LinkDescriptor, new: LinkDescriptor) {
        self.push(Operation::UpdateTracked {
            profile: profile.into(),
            old,
            new,
        });
    }

    /// Feed every operation, bracketed by `Start`/`Fin` sentinels, to each
    /// interpreter in turn.
    pub fn run(&self, interpreters: &mut [&mut dyn Interpreter]) -> anyhow::Result<()> {
        for interp in interpreters.iter_mut() {
            interp.on_start()?;
        }
        for op in &self.operations {
            for interp in interpreters.iter_mut() {
                interp.dispatch(op)?;
            }
        }
        for interp in interpreters.iter_mut() {
            interp.on_fin(self)?;
        }
        Ok(())
    }
}

fn link_path_matches_target(link: &LinkDescriptor) -> bool {
    if link.hard {
        return true;
    }
    std::fs::symlink_metadata(&link.path)
        .ok()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// A visitor over a [`DiffLog`]. Each method defaults to a no-op so an
/// interpreter only overrides the operation kinds it cares about.
pub trait Interpreter {
    fn on_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_fin(&mut self, _log: &DiffLog) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_info(&mut self, _profile: &str, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_add_profile(&mut self, _profile: &str, _parent: Option<&str>) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_update_profile(&mut self, _profile: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_remove_profile(&mut self, _profile: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_update_property(&mut self, _profile: &str, _key: &str, _value: Option<&str>) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_add_link(&mut self, _profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_remove_link(&mut self, _profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_update_link(&mut self, _profile: &str, _old: &LinkDescriptor, _new: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_track_link(&mut self, _profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_untrack_link(&mut self, _profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_restore_link(&mut self, _profile: &str, _saved: &LinkDescriptor, _actual: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }
    fn on_update_tracked(&mut self, _profile: &str, _old: &LinkDescriptor, _new: &LinkDescriptor) -> anyhow::Result<()> {
        Ok(())
    }

    fn dispatch(&mut self, op: &Operation) -> anyhow::Result<()> {
        match op {
            Operation::Info { profile, message } => self.on_info(profile, message),
            Operation::AddProfile { profile, parent } => {
                self.on_add_profile(profile, parent.as_deref())
            }
            Operation::UpdateProfile { profile } => self.on_update_profile(profile),
            Operation::RemoveProfile { profile } => self.on_remove_profile(profile),
            Operation::UpdateProperty { profile, key, value } => {
                self.on_update_property(profile, key, value.as_deref())
            }
            Operation::AddLink { profile, link } => self.on_add_link(profile, link),
            Operation::RemoveLink { profile, link } => self.on_remove_link(profile, link),
            Operation::UpdateLink { profile, old, new } => self.on_update_link(profile, old, new),
            Operation::TrackLink { profile, link } => self.on_track_link(profile, link),
            Operation::UntrackLink { profile, link } => self.on_untrack_link(profile, link),
            Operation::RestoreLink { profile, saved, actual } => {
                self.on_restore_link(profile, saved, actual)
            }
            Operation::UpdateTracked { profile, old, new } => {
                self.on_update_tracked(profile, old, new)
            }
            Operation::Start | Operation::Fin => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        adds: usize,
        removes: usize,
        started: bool,
        finished: bool,
    }

    impl Interpreter for Counter {
        fn on_start(&mut self) -> anyhow::Result<()> {
            self.started = true;
            Ok(())
        }
        fn on_fin(&mut self, _log: &DiffLog) -> anyhow::Result<()> {
            self.finished = true;
            Ok(())
        }
        fn on_add_link(&mut self, _profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
            self.adds += 1;
            Ok(())
        }
        fn on_remove_link(&mut self, _profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
            self.removes += 1;
            Ok(())
        }
    }

    fn link(path: &str) -> LinkDescriptor {
        LinkDescriptor::symbolic(
            std::path::PathBuf::from(path),
            std::path::PathBuf::from("/repo/x"),
            crate::model::Owner::inherit(),
            None,
            false,
            None,
        )
    }

    #[test]
    fn dispatch_routes_by_kind() {
        let mut log = DiffLog::new();
        log.add_link("work", link("/home/u/.a"));
        log.add_link("work", link("/home/u/.b"));
        log.push(Operation::RemoveLink {
            profile: "work".into(),
            link: link("/home/u/.c"),
        });

        let mut counter = Counter::default();
        log.run(&mut [&mut counter]).unwrap();

        assert!(counter.started);
        assert!(counter.finished);
        assert_eq!(counter.adds, 2);
        assert_eq!(counter.removes, 1);
    }
}
