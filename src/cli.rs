use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dotty")]
#[command(author, version, about = "A declarative dotfile reconciliation engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the root config file (defaults to ~/.dotty/dotty.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session directory override (state, snapshots, DynamicFile store)
    #[arg(long, global = true)]
    pub session: Option<PathBuf>,

    /// Write the run's log output to this file in addition to stderr
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,
}

/// Flags shared by every mode that builds and applies a DiffLog.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Only print what would change, make no changes
    #[arg(long)]
    pub dryrun: bool,

    /// Print a diff of filesystem changes without applying them
    #[arg(long)]
    pub changes: bool,

    /// Overwrite conflicting files that aren't already managed links
    #[arg(long)]
    pub force: bool,

    /// Allow touching blacklisted paths after a literal YES confirmation
    #[arg(long)]
    pub superforce: bool,

    /// Create missing parent directories for new links
    #[arg(long)]
    pub makedirs: bool,

    /// Reorder the DiffLog as delete, update, insert before execution
    #[arg(long)]
    pub dui: bool,

    /// Never elevate to root; drop operations that would require it
    #[arg(long)]
    pub skiproot: bool,

    /// Skip before-install/before-uninstall/before-update event scripts
    #[arg(long)]
    pub skipbefore: bool,

    /// Skip after-install/after-uninstall/after-update event scripts
    #[arg(long)]
    pub skipafter: bool,

    /// Skip all event scripts
    #[arg(long)]
    pub skipevents: bool,

    /// Install the named profiles as children of this already-installed parent
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate configured profiles and reconcile the filesystem to match
    Update {
        #[command(flatten)]
        run: RunArgs,

        /// Profile names to skip even if configured
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Unconditionally remove the named profiles
    Remove {
        #[command(flatten)]
        run: RunArgs,

        /// Profile names to remove
        profiles: Vec<String>,

        /// Remove every installed root profile
        #[arg(long, conflicts_with = "profiles")]
        all: bool,
    },

    /// Re-evaluate DynamicFiles and reinstall profiles whose content changed
    Sync {
        #[command(flatten)]
        run: RunArgs,

        /// Profile names to skip even if configured
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Show installed profiles and their links
    Show {
        /// Profile name (defaults to all installed profiles)
        profile: Option<String>,
    },

    /// Fuzzy-search installed link paths and targets
    Find {
        /// Search query
        query: String,
    },

    /// List state snapshots
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Reconcile the filesystem against a past or future state snapshot
    Timewarp {
        #[command(flatten)]
        run: RunArgs,

        /// Snapshot selector to diff from: "current", a unix timestamp, "#<index>", or "before:<timestamp>"
        #[arg(long, default_value = "current")]
        from: String,

        /// Snapshot selector to diff to
        #[arg(long)]
        to: String,

        /// Profile names to include (defaults to all)
        #[arg(long)]
        include: Vec<String>,

        /// Profile names to exclude
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Resume a run after root elevation (internal, invoked by `dotty` itself)
    #[command(hide = true)]
    Resume,
}

/// Parse a `--from`/`--to` snapshot selector string.
pub fn parse_selector(s: &str) -> anyhow::Result<crate::state::snapshot::Selector> {
    use crate::state::snapshot::Selector;

    if s == "current" {
        return Ok(Selector::Current);
    }
    if let Some(rest) = s.strip_prefix('#') {
        let idx: usize = rest.parse()?;
        return Ok(Selector::Index(idx));
    }
    if let Some(rest) = s.strip_prefix("before:") {
        let ts: i64 = rest.parse()?;
        return Ok(Selector::Before(ts));
    }
    let ts: i64 = s.parse()?;
    Ok(Selector::Timestamp(ts))
}

impl From<&RunArgs> for crate::interpreter::RunFlags {
    fn from(run: &RunArgs) -> Self {
        crate::interpreter::RunFlags {
            dryrun: run.dryrun,
            changes: run.changes,
            force: run.force,
            superforce: run.superforce,
            makedirs: run.makedirs,
            dui: run.dui,
            skiproot: run.skiproot,
            skipbefore: run.skipbefore,
            skipafter: run.skipafter,
            skipevents: run.skipevents,
            parent: run.parent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_selector() {
        assert!(matches!(
            parse_selector("current").unwrap(),
            crate::state::snapshot::Selector::Current
        ));
    }

    #[test]
    fn parses_index_selector() {
        assert!(matches!(
            parse_selector("#2").unwrap(),
            crate::state::snapshot::Selector::Index(2)
        ));
    }

    #[test]
    fn parses_timestamp_selector() {
        assert!(matches!(
            parse_selector("1700000000").unwrap(),
            crate::state::snapshot::Selector::Timestamp(1700000000)
        ));
    }
}
