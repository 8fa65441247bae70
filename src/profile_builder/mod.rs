//! The profile authoring surface, kept out of the reconciliation core per
//! spec.md §1/§9: the core never parses or executes user profile scripts,
//! it only consumes a [`ProfileResult`]. This replaces the original's
//! technique of injecting `link(...)`-style builtins into the process
//! namespace with an explicit trait a user implements in Rust.

pub mod yaml;

pub use yaml::YamlProfileSource;

use crate::model::{EventHashes, LinkDescriptor};

/// Context a profile builder may consult while producing its result:
/// target directory, active profile selector, and OS/hostname/env lookups
/// (what profile scripts could query in the original).
pub struct ProfileContext {
    pub target_dir: std::path::PathBuf,
    pub active_profile: String,
    pub hostname: String,
    pub os: String,
}

impl ProfileContext {
    pub fn new(target_dir: std::path::PathBuf, active_profile: impl Into<String>) -> Self {
        ProfileContext {
            target_dir,
            active_profile: active_profile.into(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_default(),
            os: crate::utils::os_name(),
        }
    }
}

/// The in-memory result of evaluating one profile: its link list plus
/// subprofile results and the six event-hash fields.
#[derive(Debug, Clone, Default)]
pub struct ProfileResult {
    pub name: String,
    pub parent: Option<String>,
    pub links: Vec<LinkDescriptor>,
    pub events: EventHashes,
    pub subprofiles: Vec<ProfileResult>,
}

impl ProfileResult {
    pub fn new(name: impl Into<String>) -> Self {
        ProfileResult {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Implemented by whatever produces a profile's desired link set. The core
/// only ever calls `build`; it has no idea whether the implementation is
/// hand-written Rust or a declarative loader like [`YamlProfileSource`].
pub trait ProfileBuilder {
    fn name(&self) -> &str;
    fn build(&self, ctx: &ProfileContext) -> anyhow::Result<ProfileResult>;
}
