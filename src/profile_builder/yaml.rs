//! Bundled declarative adapter: reads a profile list from YAML and
//! implements [`ProfileBuilder`] by direct translation, so `dotty update`
//! is runnable without writing Rust. Grounded on
//! `limistah-heimdal/src/config/loader.rs`'s serde_yaml loading idiom,
//! redesigned with a schema specific to this spec (not the teacher's
//! package-manager-oriented one — see DESIGN.md).

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{EventHashes, EventKind, LinkDescriptor, Owner};

use super::{ProfileBuilder, ProfileContext, ProfileResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlLink {
    pub path: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub hard: bool,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub permission: Option<u32>,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct YamlEvents {
    #[serde(default)]
    pub before_install: Option<String>,
    #[serde(default)]
    pub after_install: Option<String>,
    #[serde(default)]
    pub before_update: Option<String>,
    #[serde(default)]
    pub after_update: Option<String>,
    #[serde(default)]
    pub before_uninstall: Option<String>,
    #[serde(default)]
    pub after_uninstall: Option<String>,
}

impl YamlEvents {
    fn get(&self, kind: EventKind) -> Option<&str> {
        match kind {
            EventKind::BeforeInstall => self.before_install.as_deref(),
            EventKind::AfterInstall => self.after_install.as_deref(),
            EventKind::BeforeUpdate => self.before_update.as_deref(),
            EventKind::AfterUpdate => self.after_update.as_deref(),
            EventKind::BeforeUninstall => self.before_uninstall.as_deref(),
            EventKind::AfterUninstall => self.after_uninstall.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlProfile {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub links: Vec<YamlLink>,
    #[serde(default)]
    pub events: YamlEvents,
    #[serde(default)]
    pub profiles: Vec<YamlProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct YamlProfileDocument {
    #[serde(default)]
    pub profiles: Vec<YamlProfile>,
}

pub struct YamlProfileSource {
    pub profiles: Vec<YamlProfile>,
}

impl YamlProfileSource {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile source {}", path.display()))?;
        let doc: YamlProfileDocument = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse profile source {}", path.display()))?;
        Ok(YamlProfileSource {
            profiles: doc.profiles,
        })
    }

    pub fn build_named(&self, name: &str, ctx: &ProfileContext) -> Result<ProfileResult> {
        let profile = self
            .profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow::anyhow!("no profile named '{name}' in profile source"))?;
        build_profile(profile, ctx)
    }
}

impl ProfileBuilder for YamlProfileSource {
    fn name(&self) -> &str {
        "yaml"
    }

    fn build(&self, ctx: &ProfileContext) -> Result<ProfileResult> {
        self.build_named(&ctx.active_profile, ctx)
    }
}

fn build_profile(profile: &YamlProfile, ctx: &ProfileContext) -> Result<ProfileResult> {
    let mut result = ProfileResult::new(profile.name.clone());
    result.parent = profile.parent.clone();

    for link in &profile.links {
        let path = expand(&link.path)?;
        let descriptor = if link.hard {
            let target = link
                .target
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("hard link '{}' needs a target", link.path))?;
            let target_path = ctx.target_dir.join(target);
            let inode = std::fs::metadata(&target_path)
                .map(|m| {
                    use std::os::unix::fs::MetadataExt;
                    m.ino()
                })
                .unwrap_or(0);
            LinkDescriptor::hard(
                path,
                inode,
                parse_owner(&link.owner),
                link.permission,
                link.secure,
                None,
            )
        } else {
            let target = link
                .target
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("link '{}' needs a target", link.path))?;
            let target_path = ctx.target_dir.join(target);
            LinkDescriptor::symbolic(
                path,
                target_path,
                parse_owner(&link.owner),
                link.permission,
                link.secure,
                None,
            )
        };
        result.links.push(descriptor);
    }

    let mut events = EventHashes::default();
    for kind in EventKind::ALL {
        if let Some(script) = profile.events.get(kind) {
            events.set(kind, hash_script(script)?);
        }
    }
    result.events = events;

    for sub in &profile.profiles {
        let mut sub_result = build_profile(sub, ctx)?;
        sub_result.parent = Some(profile.name.clone());
        result.subprofiles.push(sub_result);
    }

    Ok(result)
}

fn parse_owner(owner: &Option<String>) -> Owner {
    owner
        .as_deref()
        .map(|s| s.parse().unwrap_or_else(|_| Owner::inherit()))
        .unwrap_or_else(Owner::inherit)
}

fn expand(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::tilde(raw);
    Ok(PathBuf::from(expanded.into_owned()))
}

fn hash_script(path: &str) -> Result<String> {
    let content = std::fs::read(expand(path)?)
        .with_context(|| format!("failed to read event script {path}"))?;
    Ok(format!("{:x}", md5::compute(content)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let yaml = r#"
profiles:
  - name: work
    links:
      - path: "~/.vimrc"
        target: "vimrc"
"#;
        let doc: YamlProfileDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.profiles.len(), 1);
        assert_eq!(doc.profiles[0].links[0].target.as_deref(), Some("vimrc"));
    }

    #[test]
    fn builds_profile_result_with_links() {
        let yaml = r#"
profiles:
  - name: work
    links:
      - path: "/home/u/.vimrc"
        target: "vimrc"
"#;
        let doc: YamlProfileDocument = serde_yaml::from_str(yaml).unwrap();
        let ctx = ProfileContext::new(PathBuf::from("/repo"), "work");
        let result = build_profile(&doc.profiles[0], &ctx).unwrap();
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].target(), std::path::Path::new("/repo/vimrc"));
    }
}
