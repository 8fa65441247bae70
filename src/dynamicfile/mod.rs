//! Content-addressed generated files with bidirectional sync, grounded on
//! `uberdot/dynamicfile.py`. The subprocess-shelling idiom for
//! `EncryptedFile`/`FilteredFile` is grounded on
//! `limistah-heimdal/src/hooks/mod.rs`'s `execute_simple_hook`.

pub mod encrypted;
pub mod filtered;
pub mod splitted;
pub mod static_file;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use encrypted::EncryptedFile;
pub use filtered::FilteredFile;
pub use splitted::SplittedFile;
pub use static_file::StaticFile;

/// Error returned by [`AbstractFile::reverse_sync`] for variants that
/// can't propagate edits back to their sources (`FilteredFile`).
#[derive(Debug, thiserror::Error)]
#[error("reverse sync is not supported for this file type")]
pub struct ReverseSyncUnsupported;

/// Common contract every DynamicFile variant implements.
pub trait AbstractFile {
    /// Stable name used in the content-addressed path.
    fn name(&self) -> &str;

    /// Fixed subdirectory per variant: `static`, `decrypted`, `piped`,
    /// `merged`.
    fn subdir(&self) -> &'static str;

    /// Compute this file's content from its sources.
    fn generate_content(&self) -> Result<Vec<u8>>;

    /// Propagate `new_content` (the edited, installed file) back through
    /// the source chain. Default: unsupported.
    fn update_from_content(&self, _new_content: &[u8]) -> Result<()> {
        Err(ReverseSyncUnsupported.into())
    }
}

pub fn md5sum(content: &[u8]) -> String {
    format!("{:x}", md5::compute(content))
}

pub fn canonical_path(session_dir: &Path, file: &dyn AbstractFile, sum: &str) -> PathBuf {
    session_dir
        .join("files")
        .join(file.subdir())
        .join(format!("{}#{}", file.name(), sum))
}

/// Compute content, write it to its content-addressed path plus a `.bak`
/// sibling, but only if that exact checksum's file doesn't already exist
/// (content-addressed caching — property 4 in spec.md §8). Returns the
/// path written (or already present).
pub fn update_from_source(session_dir: &Path, file: &dyn AbstractFile) -> Result<PathBuf> {
    let content = file
        .generate_content()
        .with_context(|| format!("failed to generate content for '{}'", file.name()))?;
    let sum = md5sum(&content);
    let path = canonical_path(session_dir, file, &sum);

    if path.exists() {
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &content).with_context(|| format!("failed to write {}", path.display()))?;
    fs::write(path.with_extension("bak"), &content)
        .with_context(|| format!("failed to write backup for {}", path.display()))?;

    Ok(path)
}

/// The user's choice when a DynamicFile conflict (both the generated file
/// and its source changed) is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Ignore,
    DiffFile,
    DiffSource,
    WriteFile,
    CreatePatch,
    UseSource,
    DiscardAll,
}

impl ConflictChoice {
    pub const MENU: [(&'static str, ConflictChoice); 7] = [
        ("ignore", ConflictChoice::Ignore),
        ("diff-file", ConflictChoice::DiffFile),
        ("diff-source", ConflictChoice::DiffSource),
        ("write-file", ConflictChoice::WriteFile),
        ("create-patch", ConflictChoice::CreatePatch),
        ("use-source", ConflictChoice::UseSource),
        ("discard-all", ConflictChoice::DiscardAll),
    ];
}

/// True if both the installed (generated) file and at least one source
/// have changed since the last recorded generation.
pub fn detect_conflict(installed_changed: bool, source_changed: bool) -> bool {
    installed_changed && source_changed
}

/// Overwrite the source atomically: backup -> write -> remove backup.
pub fn write_file_to_source(source_path: &Path, new_content: &[u8]) -> Result<()> {
    let backup = source_path.with_extension("dotty-bak");
    fs::copy(source_path, &backup)
        .with_context(|| format!("failed to back up {}", source_path.display()))?;
    match fs::write(source_path, new_content) {
        Ok(()) => {
            let _ = fs::remove_file(&backup);
            Ok(())
        }
        Err(e) => {
            let _ = fs::rename(&backup, source_path);
            Err(e).with_context(|| format!("failed to write {}", source_path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixed(&'static str, Vec<u8>);
    impl AbstractFile for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn subdir(&self) -> &'static str {
            "static"
        }
        fn generate_content(&self) -> Result<Vec<u8>> {
            Ok(self.1.clone())
        }
    }

    #[test]
    fn content_addressing_is_idempotent() {
        let dir = tempdir().unwrap();
        let file = Fixed("x", b"hello".to_vec());
        let p1 = update_from_source(dir.path(), &file).unwrap();
        let meta1 = fs::metadata(&p1).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let p2 = update_from_source(dir.path(), &file).unwrap();
        assert_eq!(p1, p2);
        let meta2 = fs::metadata(&p2).unwrap().modified().unwrap();
        assert_eq!(meta1, meta2);
        assert!(p1.with_extension("bak").exists());
    }

    #[test]
    fn conflict_requires_both_sides_changed() {
        assert!(!detect_conflict(true, false));
        assert!(!detect_conflict(false, true));
        assert!(detect_conflict(true, true));
    }
}
