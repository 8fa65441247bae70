use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

use super::AbstractFile;

/// Source is another [`AbstractFile`] plus a shell command; content is
/// `cat <source> | <cmd>`'s stdout. Reverse sync is unsupported — there is
/// no general way to invert an arbitrary shell filter.
pub struct FilteredFile {
    pub name: String,
    pub source: Box<dyn AbstractFile>,
    pub command: String,
}

impl FilteredFile {
    pub fn new(name: impl Into<String>, source: Box<dyn AbstractFile>, command: impl Into<String>) -> Self {
        FilteredFile {
            name: name.into(),
            source,
            command: command.into(),
        }
    }
}

impl AbstractFile for FilteredFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn subdir(&self) -> &'static str {
        "piped"
    }

    fn generate_content(&self) -> Result<Vec<u8>> {
        let input = self.source.generate_content()?;
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn filter '{}'", self.command))?;
        child
            .stdin
            .take()
            .expect("piped stdin")
            .write_all(&input)
            .context("failed to write to filter stdin")?;
        let output = child
            .wait_with_output()
            .with_context(|| format!("filter '{}' did not complete", self.command))?;
        if !output.status.success() {
            bail!(
                "filter '{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(output.stdout)
    }

    // update_from_content deliberately falls through to the trait default
    // (ReverseSyncUnsupported): an arbitrary shell filter has no inverse.
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<u8>);
    impl AbstractFile for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn subdir(&self) -> &'static str {
            "static"
        }
        fn generate_content(&self) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn pipes_through_shell_command() {
        let f = FilteredFile::new("x", Box::new(Fixed(b"hello\n".to_vec())), "tr a-z A-Z");
        let out = f.generate_content().unwrap();
        assert_eq!(out, b"HELLO\n");
    }

    #[test]
    fn reverse_sync_is_unsupported() {
        let f = FilteredFile::new("x", Box::new(Fixed(b"hello\n".to_vec())), "cat");
        assert!(f.update_from_content(b"anything").is_err());
    }
}
