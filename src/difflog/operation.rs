use serde::{Deserialize, Serialize};

use crate::model::LinkDescriptor;

/// One operation in the log. Grounded on the kind table in spec.md §4.3
/// and `uberdot/differencesolver.py`'s `DiffLog.add_*`/`*_link` methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    Info {
        profile: String,
        message: String,
    },
    AddProfile {
        profile: String,
        parent: Option<String>,
    },
    UpdateProfile {
        profile: String,
    },
    RemoveProfile {
        profile: String,
    },
    UpdateProperty {
        profile: String,
        key: String,
        value: Option<String>,
    },
    AddLink {
        profile: String,
        link: LinkDescriptor,
    },
    RemoveLink {
        profile: String,
        link: LinkDescriptor,
    },
    UpdateLink {
        profile: String,
        old: LinkDescriptor,
        new: LinkDescriptor,
    },
    TrackLink {
        profile: String,
        link: LinkDescriptor,
    },
    UntrackLink {
        profile: String,
        link: LinkDescriptor,
    },
    RestoreLink {
        profile: String,
        saved: LinkDescriptor,
        actual: LinkDescriptor,
    },
    /// Update the state record of a link without touching the filesystem
    /// (the `update_t` shortcut taken when `is_same_file` holds).
    UpdateTracked {
        profile: String,
        old: LinkDescriptor,
        new: LinkDescriptor,
    },
    Start,
    Fin,
}

impl Operation {
    pub fn profile(&self) -> Option<&str> {
        match self {
            Operation::Info { profile, .. }
            | Operation::AddProfile { profile, .. }
            | Operation::UpdateProfile { profile }
            | Operation::RemoveProfile { profile }
            | Operation::UpdateProperty { profile, .. }
            | Operation::AddLink { profile, .. }
            | Operation::RemoveLink { profile, .. }
            | Operation::UpdateLink { profile, .. }
            | Operation::TrackLink { profile, .. }
            | Operation::UntrackLink { profile, .. }
            | Operation::RestoreLink { profile, .. }
            | Operation::UpdateTracked { profile, .. } => Some(profile),
            Operation::Start | Operation::Fin => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::Info { .. } => "info",
            Operation::AddProfile { .. } => "add_p",
            Operation::UpdateProfile { .. } => "update_p",
            Operation::RemoveProfile { .. } => "remove_p",
            Operation::UpdateProperty { .. } => "update_prop",
            Operation::AddLink { .. } => "add_l",
            Operation::RemoveLink { .. } => "remove_l",
            Operation::UpdateLink { .. } => "update_l",
            Operation::TrackLink { .. } => "track_l",
            Operation::UntrackLink { .. } => "untrack_l",
            Operation::RestoreLink { .. } => "restore_l",
            Operation::UpdateTracked { .. } => "update_t",
            Operation::Start => "start",
            Operation::Fin => "fin",
        }
    }
}
