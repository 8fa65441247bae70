//! The engine's own configuration: target/session directories, the
//! blacklist, and which profile sources to load. Deliberately does not
//! reuse [`super::schema::HeimdallConfig`] (package-manager sources,
//! profile inheritance by merge) — that schema solves a different
//! problem than SPEC_FULL.md's link-reconciliation config and carrying
//! it forward would just bolt unused fields onto this type. See
//! DESIGN.md for the Open Question this resolves.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Root configuration document, normally `~/.dotty/dotty.yaml` or
/// pointed at via `--config`/`DOTTY_CONFIG`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory dotfiles are linked relative to (the repo root).
    pub target_dir: PathBuf,
    /// Directory holding state.json, snapshots, and the DynamicFile
    /// content-addressed store. Defaults to `~/.dotty`.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
    /// Path to a newline-delimited regex blacklist file.
    #[serde(default)]
    pub blacklist_file: Option<PathBuf>,
    /// YAML profile source files loaded via `YamlProfileSource`.
    #[serde(default)]
    pub profile_sources: Vec<PathBuf>,
    /// Shell used to run event scripts.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Per-event-script timeout in seconds.
    #[serde(default = "default_event_timeout")]
    pub event_timeout_secs: u64,
    /// Other users' session directories, read-only, used only to detect
    /// cross-user link conflicts (spec.md §3's `GlobalState`).
    #[serde(default)]
    pub foreign_users: Vec<ForeignUser>,
}

/// One other user's session directory, named so `CheckLinks` can report
/// which user a conflicting link belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignUser {
    pub name: String,
    pub session_dir: PathBuf,
}

fn default_session_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dotty")
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_event_timeout() -> u64 {
    300
}

impl EngineConfig {
    pub fn load_blacklist(&self) -> Result<Vec<regex::Regex>> {
        let Some(path) = &self.blacklist_file else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read blacklist file {}", path.display()))?;
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| regex::Regex::new(l).with_context(|| format!("invalid blacklist pattern: {l}")))
            .collect()
    }
}

pub fn load(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: EngineConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<()> {
    if !config.target_dir.is_absolute() {
        anyhow::bail!(
            "target_dir must be an absolute path, got {}",
            config.target_dir.display()
        );
    }
    if config.profile_sources.is_empty() {
        anyhow::bail!("at least one entry is required in profile_sources");
    }
    Ok(())
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dotty")
        .join("dotty.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_relative_target_dir() {
        let config = EngineConfig {
            target_dir: PathBuf::from("repo"),
            session_dir: default_session_dir(),
            blacklist_file: None,
            profile_sources: vec![PathBuf::from("profiles.yaml")],
            shell: default_shell(),
            event_timeout_secs: default_event_timeout(),
            foreign_users: Vec::new(),
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn loads_minimal_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dotty.yaml");
        std::fs::write(
            &path,
            format!(
                "target_dir: {}\nprofile_sources:\n  - profiles.yaml\n",
                dir.path().display()
            ),
        )
        .unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.profile_sources.len(), 1);
    }

    #[test]
    fn blacklist_skips_comments_and_blanks() {
        let dir = tempdir().unwrap();
        let blacklist = dir.path().join("black.list");
        std::fs::write(&blacklist, "# comment\n\n^/etc/shadow$\n").unwrap();
        let config = EngineConfig {
            target_dir: dir.path().to_path_buf(),
            session_dir: default_session_dir(),
            blacklist_file: Some(blacklist),
            profile_sources: vec![PathBuf::from("x.yaml")],
            shell: default_shell(),
            event_timeout_secs: default_event_timeout(),
            foreign_users: Vec::new(),
        };
        let patterns = config.load_blacklist().unwrap();
        assert_eq!(patterns.len(), 1);
    }
}
