use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::AbstractFile;

/// Sole source is a path on disk; content is that file's bytes verbatim.
/// Supports reverse sync: edits to the installed link are written straight
/// back to the source file.
pub struct StaticFile {
    pub name: String,
    pub source: PathBuf,
}

impl StaticFile {
    pub fn new(name: impl Into<String>, source: PathBuf) -> Self {
        StaticFile {
            name: name.into(),
            source,
        }
    }
}

impl AbstractFile for StaticFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn subdir(&self) -> &'static str {
        "static"
    }

    fn generate_content(&self) -> Result<Vec<u8>> {
        fs::read(&self.source)
            .with_context(|| format!("failed to read source {}", self.source.display()))
    }

    fn update_from_content(&self, new_content: &[u8]) -> Result<()> {
        super::write_file_to_source(&self.source, new_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reverse_sync_is_identity() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src.txt");
        fs::write(&source, b"original").unwrap();

        let file = StaticFile::new("src", source.clone());
        let generated = file.generate_content().unwrap();
        file.update_from_content(&generated).unwrap();
        assert_eq!(fs::read(&source).unwrap(), b"original");
    }

    #[test]
    fn reverse_sync_writes_new_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src.txt");
        fs::write(&source, b"original").unwrap();

        let file = StaticFile::new("src", source.clone());
        file.update_from_content(b"edited").unwrap();
        assert_eq!(fs::read(&source).unwrap(), b"edited");
    }
}
