use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::link::LinkDescriptor;

/// The six event kinds a profile may carry a script hash for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeInstall,
    AfterInstall,
    BeforeUpdate,
    AfterUpdate,
    BeforeUninstall,
    AfterUninstall,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::BeforeInstall,
        EventKind::AfterInstall,
        EventKind::BeforeUpdate,
        EventKind::AfterUpdate,
        EventKind::BeforeUninstall,
        EventKind::AfterUninstall,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            EventKind::BeforeInstall => "beforeInstall",
            EventKind::AfterInstall => "afterInstall",
            EventKind::BeforeUpdate => "beforeUpdate",
            EventKind::AfterUpdate => "afterUpdate",
            EventKind::BeforeUninstall => "beforeUninstall",
            EventKind::AfterUninstall => "afterUninstall",
        }
    }

    pub fn is_before(self) -> bool {
        matches!(
            self,
            EventKind::BeforeInstall | EventKind::BeforeUpdate | EventKind::BeforeUninstall
        )
    }
}

/// The six optional event-script hash fields a profile may carry. An empty
/// string (rather than absent) means "no script configured", matching the
/// `flexible_events` upgrade's default-fill behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHashes {
    #[serde(default)]
    pub before_install: String,
    #[serde(default)]
    pub after_install: String,
    #[serde(default)]
    pub before_update: String,
    #[serde(default)]
    pub after_update: String,
    #[serde(default)]
    pub before_uninstall: String,
    #[serde(default)]
    pub after_uninstall: String,
}

impl EventHashes {
    pub fn get(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::BeforeInstall => &self.before_install,
            EventKind::AfterInstall => &self.after_install,
            EventKind::BeforeUpdate => &self.before_update,
            EventKind::AfterUpdate => &self.after_update,
            EventKind::BeforeUninstall => &self.before_uninstall,
            EventKind::AfterUninstall => &self.after_uninstall,
        }
    }

    pub fn set(&mut self, kind: EventKind, value: String) {
        match kind {
            EventKind::BeforeInstall => self.before_install = value,
            EventKind::AfterInstall => self.after_install = value,
            EventKind::BeforeUpdate => self.before_update = value,
            EventKind::AfterUpdate => self.after_update = value,
            EventKind::BeforeUninstall => self.before_uninstall = value,
            EventKind::AfterUninstall => self.after_uninstall = value,
        }
    }
}

/// The persisted record of one installed profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub installed: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub links: Vec<LinkDescriptor>,
    #[serde(flatten)]
    pub events: EventHashes,
}

impl ProfileState {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        ProfileState {
            name: name.into(),
            parent: None,
            installed: now,
            updated: now,
            links: Vec::new(),
            events: EventHashes::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_hash_roundtrip() {
        let mut e = EventHashes::default();
        e.set(EventKind::BeforeUpdate, "deadbeef".to_string());
        assert_eq!(e.get(EventKind::BeforeUpdate), "deadbeef");
        assert_eq!(e.get(EventKind::AfterUpdate), "");
    }

    #[test]
    fn before_classification() {
        assert!(EventKind::BeforeInstall.is_before());
        assert!(!EventKind::AfterInstall.is_before());
    }
}
