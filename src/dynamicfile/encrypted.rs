use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

use super::AbstractFile;

/// Source is another [`AbstractFile`]; content is its GPG-decrypted bytes.
/// Reverse sync re-encrypts with a symmetric cipher and feeds the result
/// back through the source's own `update_from_content`.
pub struct EncryptedFile {
    pub name: String,
    pub source: Box<dyn AbstractFile>,
    pub passphrase: Option<String>,
}

impl EncryptedFile {
    pub fn new(name: impl Into<String>, source: Box<dyn AbstractFile>) -> Self {
        EncryptedFile {
            name: name.into(),
            source,
            passphrase: None,
        }
    }

    fn gpg(&self, args: &[&str], input: &[u8]) -> Result<Vec<u8>> {
        let mut cmd = Command::new("gpg");
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().context("failed to spawn gpg")?;
        child
            .stdin
            .take()
            .expect("piped stdin")
            .write_all(input)
            .context("failed to write to gpg stdin")?;
        let output = child.wait_with_output().context("gpg did not complete")?;
        if !output.status.success() {
            bail!(
                "gpg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(output.stdout)
    }
}

impl AbstractFile for EncryptedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn subdir(&self) -> &'static str {
        "decrypted"
    }

    fn generate_content(&self) -> Result<Vec<u8>> {
        let encrypted = self.source.generate_content()?;
        self.gpg(&["--quiet", "--batch", "--decrypt"], &encrypted)
    }

    fn update_from_content(&self, new_content: &[u8]) -> Result<()> {
        let reencrypted = self.gpg(&["--quiet", "--batch", "--yes", "--symmetric"], new_content)?;
        self.source.update_from_content(&reencrypted)
    }
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
    fn subdir_is_decrypted() {
        let f = EncryptedFile::new("x", Box::new(Fixed(vec![])));
        assert_eq!(f.subdir(), "decrypted");
    }
}
