//! `ExecuteInterpreter`: the only interpreter that touches the
//! filesystem. Applies the primitive ordering from spec.md §5 —
//! `unlink -> symlink/link -> lchown -> chmod -> chown target if secure`
//! — and cleans up parent directories left empty by a removal. Grounded
//! on `uberdot/interpreters.py`'s `ExecuteInterpreter` and the
//! lchown-via-nix idiom already used in [`crate::utils::os`].

use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use nix::unistd::{Gid, Uid};

use crate::difflog::Interpreter;
use crate::model::{LinkDescriptor, Owner};
use crate::utils::ReconcileError;

/// Applies link operations to the real filesystem. `dryrun` turns every
/// mutating call into a log line via the wrapped printer instead.
pub struct ExecuteInterpreter {
    makedirs: bool,
}

impl ExecuteInterpreter {
    pub fn new(makedirs: bool) -> Self {
        ExecuteInterpreter { makedirs }
    }

    fn ensure_parent(&self, path: &Path) -> anyhow::Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if parent.exists() {
            return Ok(());
        }
        if !self.makedirs {
            return Err(ReconcileError::Precondition(format!(
                "parent directory {} does not exist; re-run with --makedirs",
                parent.display()
            ))
            .into());
        }
        makedirs(parent)
    }

    fn place(&self, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.ensure_parent(&link.path)?;
        unlink_if_present(&link.path)?;

        if link.hard {
            let target = find_by_inode(link.target_inode.expect("hard link without inode"))
                .ok_or_else(|| {
                    ReconcileError::Fatal(format!(
                        "no file found with inode {:?} for hard link {}",
                        link.target_inode,
                        link.path.display()
                    ))
                })?;
            fs::hard_link(&target, &link.path).map_err(|e| {
                ReconcileError::Unknown(format!(
                    "hard_link {} -> {} failed: {e}",
                    target.display(),
                    link.path.display()
                ))
            })?;
        } else {
            symlink(link.target(), &link.path).map_err(|e| {
                ReconcileError::Unknown(format!(
                    "symlink {} -> {} failed: {e}",
                    link.path.display(),
                    link.target().display()
                ))
            })?;
        }

        apply_ownership(&link.path, &link.owner)?;

        if let Some(mode) = link.permission {
            fs::set_permissions(&link.path, fs::Permissions::from_mode(mode)).map_err(|e| {
                ReconcileError::Unknown(format!("chmod {} failed: {e}", link.path.display()))
            })?;
        }

        if link.secure && !link.hard {
            chown_target(link.target(), &link.owner)?;
        }

        Ok(())
    }

    fn remove(&self, link: &LinkDescriptor) -> anyhow::Result<()> {
        unlink_if_present(&link.path)?;
        if let Some(parent) = link.path.parent() {
            remove_if_empty(parent);
        }
        Ok(())
    }
}

impl Interpreter for ExecuteInterpreter {
    fn on_add_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.place(link)
    }

    fn on_remove_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.remove(link)
    }

    fn on_update_link(&mut self, _profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        self.remove(old)?;
        self.place(new)
    }

    fn on_restore_link(&mut self, _profile: &str, saved: &LinkDescriptor, _actual: &LinkDescriptor) -> anyhow::Result<()> {
        self.place(saved)
    }

    // track_l/untrack_l/update_t only touch state, not the filesystem;
    // the orchestrator applies their effect to `State` directly rather
    // than through this interpreter.
}

fn unlink_if_present(path: &Path) -> anyhow::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_dir() => {
            fs::remove_dir(path)
                .map_err(|e| ReconcileError::Unknown(format!("rmdir {} failed: {e}", path.display())))?;
        }
        Ok(_) => {
            fs::remove_file(path)
                .map_err(|e| ReconcileError::Unknown(format!("unlink {} failed: {e}", path.display())))?;
        }
        Err(_) => {}
    }
    Ok(())
}

fn remove_if_empty(dir: &Path) {
    if fs::read_dir(dir).map(|mut it| it.next().is_none()).unwrap_or(false) {
        let _ = fs::remove_dir(dir);
    }
}

fn apply_ownership(path: &Path, owner: &Owner) -> anyhow::Result<()> {
    if owner.user.is_none() && owner.group.is_none() {
        return Ok(());
    }
    let uid = owner
        .user
        .as_deref()
        .and_then(resolve_uid)
        .map(Uid::from_raw);
    let gid = owner
        .group
        .as_deref()
        .and_then(resolve_gid)
        .map(Gid::from_raw);
    nix::unistd::lchown(path, uid, gid)
        .map_err(|e| ReconcileError::Unknown(format!("lchown {} failed: {e}", path.display())))?;
    Ok(())
}

fn chown_target(target: &Path, owner: &Owner) -> anyhow::Result<()> {
    if owner.user.is_none() && owner.group.is_none() {
        return Ok(());
    }
    let uid = owner
        .user
        .as_deref()
        .and_then(resolve_uid)
        .map(Uid::from_raw);
    let gid = owner
        .group
        .as_deref()
        .and_then(resolve_gid)
        .map(Gid::from_raw);
    nix::unistd::chown(target, uid, gid)
        .map_err(|e| ReconcileError::Unknown(format!("chown {} failed: {e}", target.display())))?;
    Ok(())
}

fn resolve_uid(name: &str) -> Option<u32> {
    name.parse().ok().or_else(|| {
        nix::unistd::User::from_name(name)
            .ok()
            .flatten()
            .map(|u| u.uid.as_raw())
    })
}

fn resolve_gid(name: &str) -> Option<u32> {
    name.parse().ok().or_else(|| {
        nix::unistd::Group::from_name(name)
            .ok()
            .flatten()
            .map(|g| g.gid.as_raw())
    })
}

/// Create `dir` and every missing ancestor, then apply the deepest
/// pre-existing ancestor's owner to every directory created (spec.md
/// §4.6's `makedirs` clause — new directories inherit the ownership of
/// the nearest real parent, not root's).
fn makedirs(dir: &Path) -> anyhow::Result<()> {
    let mut to_create = Vec::new();
    let mut cur = dir;
    while !cur.exists() {
        to_create.push(cur.to_path_buf());
        match cur.parent() {
            Some(p) => cur = p,
            None => break,
        }
    }
    let inherited_owner = crate::utils::path_owner(cur).ok();

    for path in to_create.iter().rev() {
        fs::create_dir(path)
            .map_err(|e| ReconcileError::Unknown(format!("mkdir {} failed: {e}", path.display())))?;
        if let Some((uid, gid)) = inherited_owner {
            let _ = nix::unistd::chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)));
        }
    }
    Ok(())
}

fn find_by_inode(inode: u64) -> Option<std::path::PathBuf> {
    use std::os::unix::fs::MetadataExt;
    for entry in walkdir::WalkDir::new("/")
        .max_depth(6)
        .into_iter()
        .filter_map(Result::ok)
    {
        if let Ok(meta) = entry.metadata() {
            if meta.ino() == inode {
                return Some(entry.path().to_path_buf());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn symlink_desc(path: std::path::PathBuf, target: std::path::PathBuf) -> LinkDescriptor {
        LinkDescriptor::symbolic(path, target, Owner::inherit(), None, false, None)
    }

    #[test]
    fn places_and_removes_a_symlink() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("source");
        fs::write(&target, b"hi").unwrap();
        let path = dir.path().join("link");

        let mut exec = ExecuteInterpreter::new(false);
        let link = symlink_desc(path.clone(), target.clone());
        exec.place(&link).unwrap();
        assert!(fs::symlink_metadata(&path).unwrap().file_type().is_symlink());

        exec.remove(&link).unwrap();
        assert!(fs::symlink_metadata(&path).is_err());
    }

    #[test]
    fn makedirs_creates_missing_ancestors() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("source");
        fs::write(&target, b"hi").unwrap();
        let path = dir.path().join("a").join("b").join("link");

        let mut exec = ExecuteInterpreter::new(true);
        let link = symlink_desc(path.clone(), target);
        exec.place(&link).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn refuses_missing_parent_without_makedirs() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("source");
        fs::write(&target, b"hi").unwrap();
        let path = dir.path().join("nope").join("link");

        let mut exec = ExecuteInterpreter::new(false);
        let link = symlink_desc(path, target);
        assert!(exec.place(&link).is_err());
    }

    #[test]
    fn remove_cleans_up_empty_parent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("source");
        fs::write(&target, b"hi").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let path = sub.join("link");

        let mut exec = ExecuteInterpreter::new(false);
        let link = symlink_desc(path, target);
        exec.place(&link).unwrap();
        exec.remove(&link).unwrap();
        assert!(!sub.exists());
    }
}
