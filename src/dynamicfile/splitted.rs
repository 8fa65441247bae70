use std::cell::RefCell;

use anyhow::{Context, Result};

use super::AbstractFile;

/// Sources are an ordered list of [`AbstractFile`]s; content is their
/// newline-joined concatenation. Records each source's line count at
/// generation time so a reverse sync can redistribute an edited file's
/// lines back across the original sources.
pub struct SplittedFile {
    pub name: String,
    pub sources: Vec<Box<dyn AbstractFile>>,
    /// Line counts recorded by the most recent `generate_content()` call.
    line_counts: RefCell<Vec<usize>>,
}

impl SplittedFile {
    pub fn new(name: impl Into<String>, sources: Vec<Box<dyn AbstractFile>>) -> Self {
        SplittedFile {
            name: name.into(),
            sources,
            line_counts: RefCell::new(Vec::new()),
        }
    }
}

impl AbstractFile for SplittedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn subdir(&self) -> &'static str {
        "merged"
    }

    fn generate_content(&self) -> Result<Vec<u8>> {
        let mut counts = Vec::with_capacity(self.sources.len());
        let mut out = Vec::new();
        for (i, source) in self.sources.iter().enumerate() {
            let content = source
                .generate_content()
                .with_context(|| format!("source {i} of '{}' failed", self.name))?;
            let lines = content.split(|b| *b == b'\n').count();
            counts.push(lines);
            out.extend_from_slice(&content);
            if i + 1 < self.sources.len() && !content.ends_with(b"\n") {
                out.push(b'\n');
            }
        }
        *self.line_counts.borrow_mut() = counts;
        Ok(out)
    }

    fn update_from_content(&self, new_content: &[u8]) -> Result<()> {
        let counts = self.line_counts.borrow();
        if counts.len() != self.sources.len() {
            anyhow::bail!("splitted file '{}' has no recorded line layout; run generate_content first", self.name);
        }
        let all_lines: Vec<&[u8]> = new_content.split(|b| *b == b'\n').collect();
        let mut idx = 0usize;
        for (source, &count) in self.sources.iter().zip(counts.iter()) {
            let end = (idx + count).min(all_lines.len());
            let chunk = all_lines[idx..end].join(&b'\n');
            source.update_from_content(&chunk)?;
            idx = end;
        }
        Ok(())
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
    fn concatenates_with_newline_join() {
        let f = SplittedFile::new(
            "merged",
            vec![
                Box::new(Fixed(b"a\nb".to_vec())),
                Box::new(Fixed(b"c".to_vec())),
            ],
        );
        let out = f.generate_content().unwrap();
        assert_eq!(out, b"a\nb\nc");
    }
}
