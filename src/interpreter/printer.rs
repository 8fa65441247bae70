//! Printer interpreters: `PrintPlain` (raw dump), `PrintPretty` (pretty
//! per-operation), `PrintSummary` (per-profile counters on `fin`).

use std::collections::HashMap;

use colored::Colorize;

use crate::difflog::{DiffLog, Interpreter, Operation};
use crate::model::LinkDescriptor;

#[derive(Default)]
pub struct PrintPlain {
    pub lines: Vec<String>,
}

impl Interpreter for PrintPlain {
    fn on_info(&mut self, profile: &str, message: &str) -> anyhow::Result<()> {
        self.lines.push(format!("[{profile}] info: {message}"));
        Ok(())
    }
    fn on_add_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] add_l: {}", link.path.display()));
        Ok(())
    }
    fn on_remove_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] remove_l: {}", link.path.display()));
        Ok(())
    }
    fn on_update_link(&mut self, profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines.push(format!(
            "[{profile}] update_l: {} -> {}",
            old.path.display(),
            new.path.display()
        ));
        Ok(())
    }
    fn on_track_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] track_l: {}", link.path.display()));
        Ok(())
    }
    fn on_untrack_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] untrack_l: {}", link.path.display()));
        Ok(())
    }
    fn on_restore_link(&mut self, profile: &str, saved: &LinkDescriptor, _actual: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] restore_l: {}", saved.path.display()));
        Ok(())
    }
    fn on_update_tracked(&mut self, profile: &str, old: &LinkDescriptor, _new: &LinkDescriptor) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] update_t: {}", old.path.display()));
        Ok(())
    }
    fn on_add_profile(&mut self, profile: &str, parent: Option<&str>) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] add_p (parent={:?})", parent));
        Ok(())
    }
    fn on_update_profile(&mut self, profile: &str) -> anyhow::Result<()> {
        self.lines.push(format!("[{profile}] update_p"));
        Ok(())
    }
    fn on_remove_profile(&mut self, profile: &str) -> anyhow::Result<()> {
        self.lines.push(format!("[{profile}] remove_p"));
        Ok(())
    }
    fn on_update_property(&mut self, profile: &str, key: &str, value: Option<&str>) -> anyhow::Result<()> {
        self.lines
            .push(format!("[{profile}] update_prop: {key}={value:?}"));
        Ok(())
    }
}

/// Human-facing colored per-operation printer.
#[derive(Default)]
pub struct PrintPretty;

impl Interpreter for PrintPretty {
    fn on_info(&mut self, profile: &str, message: &str) -> anyhow::Result<()> {
        crate::utils::info(&format!("[{profile}] {message}"));
        Ok(())
    }
    fn on_add_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        println!(
            "  {} [{}] {}",
            "+".green().bold(),
            profile,
            link.path.display()
        );
        Ok(())
    }
    fn on_remove_link(&mut self, profile: &str, link: &LinkDescriptor) -> anyhow::Result<()> {
        println!(
            "  {} [{}] {}",
            "-".red().bold(),
            profile,
            link.path.display()
        );
        Ok(())
    }
    fn on_update_link(&mut self, profile: &str, old: &LinkDescriptor, new: &LinkDescriptor) -> anyhow::Result<()> {
        println!(
            "  {} [{}] {} -> {}",
            "~".yellow().bold(),
            profile,
            old.path.display(),
            new.target().display()
        );
        Ok(())
    }
    fn on_add_profile(&mut self, profile: &str, _parent: Option<&str>) -> anyhow::Result<()> {
        println!("{} {}", "profile".cyan().bold(), profile);
        Ok(())
    }
    fn on_remove_profile(&mut self, profile: &str) -> anyhow::Result<()> {
        println!("{} {}", "removing profile".red().bold(), profile);
        Ok(())
    }
}

/// Per-profile operation counters, emitted on `fin`.
#[derive(Default)]
pub struct PrintSummary {
    counts: HashMap<String, HashMap<&'static str, usize>>,
}

impl PrintSummary {
    fn bump(&mut self, profile: &str, kind: &'static str) {
        *self
            .counts
            .entry(profile.to_string())
            .or_default()
            .entry(kind)
            .or_insert(0) += 1;
    }

    pub fn counts_for(&self, profile: &str) -> HashMap<&'static str, usize> {
        self.counts.get(profile).cloned().unwrap_or_default()
    }
}

impl Interpreter for PrintSummary {
    fn on_add_link(&mut self, profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        self.bump(profile, "add_l");
        Ok(())
    }
    fn on_remove_link(&mut self, profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        self.bump(profile, "remove_l");
        Ok(())
    }
    fn on_update_link(&mut self, profile: &str, _old: &LinkDescriptor, _new: &LinkDescriptor) -> anyhow::Result<()> {
        self.bump(profile, "update_l");
        Ok(())
    }
    fn on_track_link(&mut self, profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        self.bump(profile, "track_l");
        Ok(())
    }
    fn on_untrack_link(&mut self, profile: &str, _link: &LinkDescriptor) -> anyhow::Result<()> {
        self.bump(profile, "untrack_l");
        Ok(())
    }

    fn on_fin(&mut self, _log: &DiffLog) -> anyhow::Result<()> {
        for (profile, counts) in &self.counts {
            let total: usize = counts.values().sum();
            crate::utils::step(&format!("{profile}: {total} change(s)"));
        }
        Ok(())
    }
}
