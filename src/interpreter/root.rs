//! Root-privilege handling: detect whether any pending operation needs it,
//! optionally skip those operations, or re-exec the whole process under
//! `sudo` and resume from a serialized DiffLog. Grounded on the
//! demote-after-elevate idiom in `limistah-heimdal/src/utils/os.rs`
//! (SUDO_UID/SUDO_GID) and the hidden-subcommand resume pattern common to
//! privilege-separated CLIs.

use std::io::Write as _;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::difflog::{DiffLog, Interpreter, Operation};
use crate::interpreter::RunFlags;
use crate::model::LinkDescriptor;
use crate::utils::{is_root, ReconcileError};

/// Whether a single operation needs elevated privileges: its target path
/// (or, for a profile op, nothing) is outside paths the current user can
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRequirement {
    NotNeeded,
    Needed,
}

fn requirement_for_link(link: &LinkDescriptor) -> RootRequirement {
    let dir = match link.path.parent() {
        Some(p) => p,
        None => return RootRequirement::NotNeeded,
    };
    if crate::utils::can_write_dir(dir) {
        RootRequirement::NotNeeded
    } else {
        RootRequirement::Needed
    }
}

/// Scans a DiffLog and records whether *any* operation needs root,
/// without rejecting or mutating anything. Read the result with
/// [`DetectRoot::any_needed`] after `run`.
#[derive(Default)]
pub struct DetectRoot {
    any_needed: bool,
}

impl DetectRoot {
    pub fn any_needed(&self) -> bool {
        self.any_needed
    }
}

impl Interpreter for DetectRoot {
    fn on_add_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        if requirement_for_link(link) == RootRequirement::Needed {
            self.any_needed = true;
        }
        Ok(())
    }
    fn on_remove_link(&mut self, _profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        if requirement_for_link(link) == RootRequirement::Needed {
            self.any_needed = true;
        }
        Ok(())
    }
    fn on_update_link(&mut self, _profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        if requirement_for_link(old) == RootRequirement::Needed
            || requirement_for_link(new) == RootRequirement::Needed
        {
            self.any_needed = true;
        }
        Ok(())
    }
}

/// When `--skiproot` is set, drop operations that would need root rather
/// than escalating, recording which ones were dropped.
#[derive(Default)]
pub struct SkipRoot {
    pub dropped: Vec<String>,
}

impl SkipRoot {
    /// Filter `log`, returning a new DiffLog with root-needing link
    /// operations removed.
    pub fn filter(log: &DiffLog) -> (DiffLog, Vec<String>) {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for op in &log.operations {
            let needs_root = match op {
                Operation::AddLink { link, .. } | Operation::RemoveLink { link, .. } => {
                    requirement_for_link(link) == RootRequirement::Needed
                }
                Operation::UpdateLink { old, new, .. } => {
                    requirement_for_link(old) == RootRequirement::Needed
                        || requirement_for_link(new) == RootRequirement::Needed
                }
                _ => false,
            };
            if needs_root {
                dropped.push(op.kind_name().to_string());
            } else {
                kept.push(op.clone());
            }
        }
        (DiffLog { operations: kept }, dropped)
    }
}

/// Wire envelope handed to the resumed `dotty resume` process: the
/// approved DiffLog plus enough of the original run's flags to repeat
/// the same filesystem primitives and printing.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResumeConfig {
    pub schema_version: u32,
    pub log: DiffLog,
    pub flags: SerializableFlags,
}

/// `RunFlags` minus `parent` (not needed post-root-check) in a
/// bincode-friendly shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableFlags {
    pub dryrun: bool,
    pub force: bool,
    pub superforce: bool,
    pub makedirs: bool,
}

impl From<&RunFlags> for SerializableFlags {
    fn from(f: &RunFlags) -> Self {
        SerializableFlags {
            dryrun: f.dryrun,
            force: f.force,
            superforce: f.superforce,
            makedirs: f.makedirs,
        }
    }
}

pub const RESUME_SCHEMA_VERSION: u32 = 1;

/// Re-exec the current binary under `sudo -S`, piping a bincode-encoded
/// [`ResumeConfig`] to its stdin via the hidden `resume` subcommand, and
/// wait for it to finish. Returns the child's exit status.
pub struct GainRoot;

impl GainRoot {
    pub fn elevate(log: &DiffLog, flags: &RunFlags) -> anyhow::Result<i32> {
        if is_root() {
            return Err(ReconcileError::Fatal(
                "GainRoot::elevate called while already root".into(),
            )
            .into());
        }

        let config = ResumeConfig {
            schema_version: RESUME_SCHEMA_VERSION,
            log: log.clone(),
            flags: flags.into(),
        };
        let payload = bincode::serialize(&config)
            .map_err(|e| ReconcileError::Fatal(format!("failed to encode resume payload: {e}")))?;

        let exe = std::env::current_exe()?;
        let mut child = Command::new("sudo")
            .arg("-S")
            .arg(exe)
            .arg("resume")
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| ReconcileError::SystemAbortion(format!("failed to spawn sudo: {e}")))?;

        child
            .stdin
            .take()
            .expect("piped stdin")
            .write_all(&payload)?;

        let status = child.wait()?;
        Ok(status.code().unwrap_or(105))
    }
}

/// Decode a [`ResumeConfig`] from the resumed process's stdin.
pub fn read_resume_config(reader: impl std::io::Read) -> anyhow::Result<ResumeConfig> {
    let config: ResumeConfig = bincode::deserialize_from(reader)
        .map_err(|e| ReconcileError::Fatal(format!("failed to decode resume payload: {e}")))?;
    if config.schema_version != RESUME_SCHEMA_VERSION {
        return Err(ReconcileError::Fatal(format!(
            "resume payload schema version {} does not match {}",
            config.schema_version, RESUME_SCHEMA_VERSION
        ))
        .into());
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Owner;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn link(path: std::path::PathBuf) -> LinkDescriptor {
        LinkDescriptor::symbolic(path, PathBuf::from("/repo/x"), Owner::inherit(), None, false, None)
    }

    #[test]
    fn detect_root_flags_unwritable_dir() {
        let mut log = DiffLog::new();
        log.add_link("a", link(PathBuf::from("/root/.nope/.a")));
        let mut detect = DetectRoot::default();
        log.run(&mut [&mut detect]).unwrap();
        assert!(detect.any_needed());
    }

    #[test]
    fn detect_root_ignores_writable_dir() {
        let dir = tempdir().unwrap();
        let mut log = DiffLog::new();
        log.add_link("a", link(dir.path().join("a")));
        let mut detect = DetectRoot::default();
        log.run(&mut [&mut detect]).unwrap();
        assert!(!detect.any_needed());
    }

    #[test]
    fn skip_root_drops_only_unwritable_ops() {
        let dir = tempdir().unwrap();
        let mut log = DiffLog::new();
        log.add_link("a", link(dir.path().join("a")));
        log.add_link("a", link(PathBuf::from("/root/.nope/.b")));

        let (kept, dropped) = SkipRoot::filter(&log);
        assert_eq!(kept.operations.len(), 1);
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn resume_config_roundtrips_through_bincode() {
        let mut log = DiffLog::new();
        log.info("a", "hello");
        let flags = RunFlags::default();
        let config = ResumeConfig {
            schema_version: RESUME_SCHEMA_VERSION,
            log,
            flags: (&flags).into(),
        };
        let bytes = bincode::serialize(&config).unwrap();
        let decoded = read_resume_config(&bytes[..]).unwrap();
        assert_eq!(decoded.log.operations.len(), 1);
    }
}
