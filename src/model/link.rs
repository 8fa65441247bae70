use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `"user:group"` ownership descriptor. Either half may be empty to mean
/// "inherit from the containing directory". Serialized as the single
/// string `"user:group"` (matching `uberdot/state.py`'s `owner` field),
/// not as a `{user, group}` object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Owner {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Serialize for Owner {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Owner {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().expect("Owner::from_str is infallible"))
    }
}

impl Owner {
    pub fn inherit() -> Self {
        Owner {
            user: None,
            group: None,
        }
    }

    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Owner {
            user: Some(user.into()),
            group: Some(group.into()),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.user.as_deref().unwrap_or(""),
            self.group.as_deref().unwrap_or("")
        )
    }
}

impl std::str::FromStr for Owner {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, group) = s.split_once(':').unwrap_or((s, ""));
        Ok(Owner {
            user: if user.is_empty() {
                None
            } else {
                Some(user.to_string())
            },
            group: if group.is_empty() {
                None
            } else {
                Some(group.to_string())
            },
        })
    }
}

/// One link the engine manages: either a symbolic link (`target` is the
/// absolute path it points at) or a hard link (identified by
/// `target_inode`, `target` unused).
///
/// Per the resolved Open Question in SPEC_FULL.md §9: hard links never
/// carry a usable `target`; the only two ways to build a `LinkDescriptor`
/// are [`LinkDescriptor::symbolic`] and [`LinkDescriptor::hard`], so no
/// caller can observe a symbolic link with `target = None` or a hard link
/// whose `target_inode` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_inode: Option<u64>,
    pub hard: bool,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<u32>,
    #[serde(default)]
    pub secure: bool,
    /// Name of the DynamicFile chain that produced `target`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildup: Option<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

impl LinkDescriptor {
    /// Build a symbolic link descriptor. `path` and `target` must already
    /// be absolute and normalized; this is enforced with a debug assertion
    /// rather than a fallible constructor since every producer in this
    /// crate (profile builders, upgrade functions) normalizes paths first.
    #[allow(clippy::too_many_arguments)]
    pub fn symbolic(
        path: PathBuf,
        target: PathBuf,
        owner: Owner,
        permission: Option<u32>,
        secure: bool,
        buildup: Option<String>,
    ) -> Self {
        debug_assert!(path.is_absolute(), "link path must be absolute: {path:?}");
        debug_assert!(
            target.is_absolute(),
            "link target must be absolute: {target:?}"
        );
        let now = Utc::now();
        LinkDescriptor {
            path,
            target: Some(target),
            target_inode: None,
            hard: false,
            owner,
            permission,
            secure,
            buildup,
            created: now,
            updated: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn hard(
        path: PathBuf,
        target_inode: u64,
        owner: Owner,
        permission: Option<u32>,
        secure: bool,
        buildup: Option<String>,
    ) -> Self {
        debug_assert!(path.is_absolute(), "link path must be absolute: {path:?}");
        let now = Utc::now();
        LinkDescriptor {
            path,
            target: None,
            target_inode: Some(target_inode),
            hard: true,
            owner,
            permission,
            secure,
            buildup,
            created: now,
            updated: now,
        }
    }

    /// The symbolic target path. Panics if called on a hard link — every
    /// call site is expected to branch on `hard` first.
    pub fn target(&self) -> &Path {
        self.target
            .as_deref()
            .expect("target() called on a hard link; compare by target_inode instead")
    }

    /// Two links are *similar* iff they share `path`, OR (for soft links)
    /// share `target`, OR (for hard links) share `target_inode`.
    pub fn is_similar(&self, other: &LinkDescriptor) -> bool {
        if self.path == other.path {
            return true;
        }
        match (self.hard, other.hard) {
            (false, false) => self.target == other.target,
            (true, true) => self.target_inode == other.target_inode,
            _ => false,
        }
    }

    /// Two links are *equal* iff path, target/inode, owner, permission,
    /// hard, and secure all match.
    pub fn is_equal(&self, other: &LinkDescriptor) -> bool {
        self.path == other.path
            && self.hard == other.hard
            && self.target == other.target
            && self.target_inode == other.target_inode
            && self.owner == other.owner
            && self.permission == other.permission
            && self.secure == other.secure
    }

    /// Whether this link's recorded target and `other`'s recorded target
    /// are byte-identical on disk (used to choose `update_t` over
    /// `update_l` when only state metadata, not file content, changed).
    pub fn same_file_content(&self, other: &LinkDescriptor) -> std::io::Result<bool> {
        if self.hard || other.hard {
            return Ok(self.target_inode == other.target_inode);
        }
        let a = std::fs::read(self.target())?;
        let b = std::fs::read(other.target())?;
        Ok(a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn owner_roundtrip() {
        let o: Owner = "me:staff".parse().unwrap();
        assert_eq!(o.to_string(), "me:staff");
        let empty: Owner = "".parse().unwrap();
        assert_eq!(empty, Owner::inherit());
    }

    #[test]
    fn similar_by_path() {
        let a = link("/home/u/.vimrc", "/repo/vimrc");
        let b = link("/home/u/.vimrc", "/repo/other/vimrc");
        assert!(a.is_similar(&b));
        assert!(!a.is_equal(&b));
    }

    #[test]
    fn similar_by_target() {
        let a = link("/home/u/.vimrc", "/repo/vimrc");
        let b = link("/home/u/.vimrc2", "/repo/vimrc");
        assert!(a.is_similar(&b));
    }

    #[test]
    fn not_similar_different_everything() {
        let a = link("/home/u/.a", "/repo/a");
        let b = link("/home/u/.b", "/repo/b");
        assert!(!a.is_similar(&b));
    }

    #[test]
    fn equal_requires_all_fields() {
        let a = link("/home/u/.vimrc", "/repo/vimrc");
        let mut b = link("/home/u/.vimrc", "/repo/vimrc");
        assert!(a.is_equal(&b));
        b.permission = Some(0o644);
        assert!(!a.is_equal(&b));
    }

    #[test]
    fn hard_link_similar_by_inode() {
        let a = LinkDescriptor::hard(
            PathBuf::from("/home/u/.a"),
            42,
            Owner::inherit(),
            None,
            false,
            None,
        );
        let b = LinkDescriptor::hard(
            PathBuf::from("/home/u/.b"),
            42,
            Owner::inherit(),
            None,
            false,
            None,
        );
        assert!(a.is_similar(&b));
    }
}
