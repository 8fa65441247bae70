//! Ties solver -> checks -> execution and owns the engine's transactional
//! semantics. Grounded on spec.md §4.6's nine-step sequence and
//! `uberdot/dotmanager.py`'s top-level `install`/`uninstall` drivers for
//! the overall shape (load -> diff -> check -> root -> events -> execute
//! -> persist).

use std::time::Duration;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::difflog::DiffLog;
use crate::interpreter::{
    CheckDiffsolverResult, CheckDynamicFiles, CheckFileOverwrite, CheckLinkBlacklist,
    CheckLinkDirs, CheckLinks, CheckProfiles, DetectRoot, EventExecInterpreter, ExecuteInterpreter,
    GainRoot, PendingEvent, PrintPretty, PrintSummary, ResumeConfig, RunFlags, SkipRoot,
};
use crate::model::EventKind;
use crate::profile_builder::{ProfileContext, ProfileResult, YamlProfileSource};
use crate::solver::{remove_profile, state_diff, state_fs, uninstall, update};
use crate::state::{global::GlobalState, snapshot, store, State};
use crate::utils::{is_root, ReconcileError};

/// Entry points corresponding to the CLI's non-hidden subcommands.
pub struct Orchestrator {
    pub config: EngineConfig,
    pub flags: RunFlags,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, flags: RunFlags) -> Self {
        Orchestrator { config, flags }
    }

    fn session_dir(&self) -> std::path::PathBuf {
        self.config.session_dir.clone()
    }

    /// Step 1: load state, detect drift against the live filesystem, and
    /// fold in fixes for anything the user approves.
    fn reconcile_drift(&self, state: &mut State) -> Result<()> {
        let mut log = DiffLog::new();
        let any = state_fs::generate_fixes(&mut log, state, &[], |profile, link, drift| {
            crate::utils::step(&format!(
                "[{profile}] {} drifted: {drift:?}",
                link.path.display()
            ));
            match crate::utils::choice(
                "how should this drift be resolved?",
                &["skip", "restore from state", "take over filesystem", "untrack"],
            ) {
                Some(1) => state_fs::DriftChoice::Restore,
                Some(2) => state_fs::DriftChoice::TakeOver,
                Some(3) => state_fs::DriftChoice::Untrack,
                _ => state_fs::DriftChoice::Skip,
            }
        })?;
        if any {
            self.apply(state, log, false)?;
        }
        Ok(())
    }

    /// Evaluate every configured profile source's active profile into a
    /// `[ProfileResult]` tree (step 2).
    fn evaluate_profiles(&self) -> Result<Vec<ProfileResult>> {
        let ctx = ProfileContext::new(self.config.target_dir.clone(), active_profile_name());
        let mut results = Vec::new();
        for source_path in &self.config.profile_sources {
            let source = YamlProfileSource::load(source_path)?;
            for profile in &source.profiles {
                results.push(source.build_named(&profile.name, &ctx)?);
            }
        }
        Ok(results)
    }

    /// `dotty update`: reconcile drift, evaluate profiles, solve, check,
    /// execute, persist.
    pub fn update(&self, exclude: &[String]) -> Result<()> {
        let mut state = store::load(&self.session_dir())?;
        self.reconcile_drift(&mut state)?;

        let profile_results = self.evaluate_profiles()?;

        let mut log = DiffLog::new();
        update::generate_operations(&mut log, &state, &profile_results, self.flags.parent.as_deref(), exclude)?;

        self.apply(&mut state, log, true)
    }

    /// `dotty remove`: unconditional removal of named profiles.
    pub fn remove(&self, profiles: &[String]) -> Result<()> {
        let mut state = store::load(&self.session_dir())?;
        for name in profiles {
            remove_profile::require_installed(&state, name)?;
        }

        let mut log = DiffLog::new();
        remove_profile::generate_operations(&mut log, &state, profiles);

        self.apply(&mut state, log, true)
    }

    /// `dotty sync`: re-derive every DynamicFile's content and reinstall
    /// profiles whose generated content changed, honoring `--exclude`.
    pub fn sync(&self, exclude: &[String]) -> Result<()> {
        self.update(exclude)
    }

    /// `dotty timewarp`: diff two persisted states (by selector) and
    /// apply the transformation.
    pub fn timewarp(
        &self,
        from: snapshot::Selector,
        to: snapshot::Selector,
        include: &[String],
        exclude: &[String],
    ) -> Result<()> {
        let from_state = snapshot::load(&self.session_dir(), from)?;
        let to_state = snapshot::load(&self.session_dir(), to)?;

        let mut log = DiffLog::new();
        state_diff::generate_operations(&mut log, &from_state, &to_state, include, exclude)?;

        let mut current = store::load(&self.session_dir())?;
        self.apply(&mut current, log, true)
    }

    /// Removes every installed profile (step toward a clean uninstall,
    /// the `uninstall` mode exposed through `dotty remove --all`).
    pub fn uninstall_all(&self, exclude: &[String]) -> Result<()> {
        let mut state = store::load(&self.session_dir())?;
        let roots: Vec<String> = state
            .profiles
            .iter()
            .filter(|(_, p)| p.parent.is_none())
            .map(|(n, _)| n.clone())
            .collect();

        let mut log = DiffLog::new();
        uninstall::generate_operations(&mut log, &state, &roots, exclude);

        self.apply(&mut state, log, true)
    }

    /// Steps 4-9: checks, DUI, root, before-events, execute+print,
    /// after-events, persist. `persist` is false for the drift-fixing
    /// sub-run inside `reconcile_drift`, which shouldn't snapshot twice.
    fn apply(&self, state: &mut State, mut log: DiffLog, persist: bool) -> Result<()> {
        self.run_checks(state, &log)?;

        if self.flags.dui {
            log = crate::interpreter::dui::reorder(&log);
        }

        if !self.flags.skiproot && !is_root() {
            let mut detect = DetectRoot::default();
            log.run(&mut [&mut detect])?;
            if detect.any_needed() {
                let code = GainRoot::elevate(&log, &self.flags)?;
                if code != 0 {
                    std::process::exit(code);
                }
                return Ok(());
            }
        } else if self.flags.skiproot {
            let (kept, dropped) = SkipRoot::filter(&log);
            for kind in &dropped {
                crate::utils::warning(&format!("skipped {kind} operation requiring root (--skiproot)"));
            }
            log = kept;
        }

        self.resume(state, log, persist)
    }

    /// Steps 6-9, also the entry point for the resumed `dotty resume`
    /// process (root re-exec lands here with the elevated process's
    /// own `State` reloaded from disk).
    pub fn resume(&self, state: &mut State, log: DiffLog, persist: bool) -> Result<()> {
        if !self.flags.skipbefore {
            self.run_events(state, &log, EventKind::is_before)?;
        }

        let mut recheck = CheckDiffsolverResult::new(state);
        log.run(&mut [&mut recheck])?;
        let mut overwrite = CheckFileOverwrite::new(self.flags.force);
        log.run(&mut [&mut overwrite])?;

        self.execute(state, &log)?;

        if !self.flags.skipafter {
            self.run_events(state, &log, |k| !k.is_before())?;
        }

        if persist && !self.flags.dryrun {
            touch_updated_profiles(state, &log);
            store::save(&self.session_dir(), state)?;
            let ts = chrono::Utc::now().timestamp();
            snapshot::create(&self.session_dir(), state, ts)?;
        }

        Ok(())
    }

    fn run_checks(&self, state: &State, log: &DiffLog) -> Result<()> {
        let mut diffsolver_check = CheckDiffsolverResult::new(state);
        log.run(&mut [&mut diffsolver_check])?;

        let mut profiles_check = CheckProfiles::new(state, self.flags.parent.is_some());
        log.run(&mut [&mut profiles_check])?;

        let current_user = whoami::username();
        let global = GlobalState::load(&current_user, state, &self.config.foreign_users);
        let mut links_check = CheckLinks::new(&global);
        log.run(&mut [&mut links_check])?;

        let patterns = self.config.load_blacklist()?;
        if !patterns.is_empty() {
            if self.flags.superforce && !confirm_superforce()? {
                return Err(ReconcileError::UserAbortion(
                    "--superforce requires a literal YES confirmation".into(),
                )
                .into());
            }
            let mut blacklist_check = CheckLinkBlacklist::new(patterns, self.flags.superforce);
            log.run(&mut [&mut blacklist_check])?;
        }

        let mut dirs_check = CheckLinkDirs::new(self.flags.makedirs);
        log.run(&mut [&mut dirs_check])?;

        let mut overwrite_check = CheckFileOverwrite::new(self.flags.force);
        log.run(&mut [&mut overwrite_check])?;

        let mut dynamic_check = CheckDynamicFiles;
        log.run(&mut [&mut dynamic_check])?;

        Ok(())
    }

    fn run_events(&self, state: &State, log: &DiffLog, matches: impl Fn(EventKind) -> bool) -> Result<()> {
        if self.flags.skipevents {
            return Ok(());
        }
        let touched: std::collections::HashSet<&str> = log
            .operations
            .iter()
            .filter_map(|op| op.profile())
            .collect();

        let mut exec = EventExecInterpreter::new(
            self.config.shell.clone(),
            Duration::from_secs(self.config.event_timeout_secs),
            true,
        );
        for profile_name in touched {
            let Some(profile) = state.profiles.get(profile_name) else {
                continue;
            };
            for kind in EventKind::ALL.into_iter().filter(|k| matches(*k)) {
                let hash = profile.events.get(kind);
                if hash.is_empty() {
                    continue;
                }
                let script_path = self
                    .session_dir()
                    .join(format!("{profile_name}.{}.{hash}", kind.field_name()));
                if !script_path.exists() {
                    continue;
                }
                let event = PendingEvent {
                    profile: profile_name.to_string(),
                    kind,
                    script_path,
                };
                if self.flags.dryrun {
                    crate::utils::info(&format!(
                        "[{profile_name}] would run {} event",
                        kind.field_name()
                    ));
                } else {
                    exec.run(&event)?;
                }
            }
        }
        Ok(())
    }

    fn execute(&self, state: &mut State, log: &DiffLog) -> Result<()> {
        if self.flags.dryrun || self.flags.changes {
            let mut printer = PrintPretty;
            log.run(&mut [&mut printer])?;
            return Ok(());
        }

        let mut exec = ExecuteInterpreter::new(self.flags.makedirs);
        let mut printer = PrintPretty;
        let mut summary = PrintSummary::default();
        log.run(&mut [&mut exec, &mut printer, &mut summary])?;

        apply_state_effects(state, log);
        Ok(())
    }
}

/// Resume handler for the hidden `dotty resume` subcommand: reconstruct
/// the orchestrator's flags and DiffLog from a [`ResumeConfig`] piped on
/// stdin and finish the run from step 6.
pub fn run_resume(config: EngineConfig, resume: ResumeConfig) -> Result<()> {
    let flags = RunFlags {
        dryrun: resume.flags.dryrun,
        force: resume.flags.force,
        superforce: resume.flags.superforce,
        makedirs: resume.flags.makedirs,
        skiproot: true,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(config, flags);
    let mut state = store::load(&orchestrator.session_dir())?;
    orchestrator.resume(&mut state, resume.log, true)
}

fn confirm_superforce() -> Result<bool> {
    Ok(crate::utils::confirm_yes_exact(
        "this run touches blacklisted paths",
    ))
}

fn active_profile_name() -> String {
    std::env::var("DOTTY_PROFILE").unwrap_or_else(|_| whoami::username())
}

/// Apply operations' state-only effects (profile/link bookkeeping) after
/// a successful filesystem execution. `ExecuteInterpreter` never touches
/// `State` directly; it only acts on the filesystem.
fn apply_state_effects(state: &mut State, log: &DiffLog) {
    use crate::difflog::Operation;
    use crate::model::ProfileState;

    for op in &log.operations {
        match op {
            Operation::AddProfile { profile, parent } => {
                let mut ps = ProfileState::new(profile.clone());
                ps.parent = parent.clone();
                state.profiles.insert(profile.clone(), ps);
            }
            Operation::RemoveProfile { profile } => {
                state.profiles.remove(profile);
            }
            Operation::UpdateProperty { profile, key, value } => {
                if let Some(ps) = state.profiles.get_mut(profile) {
                    apply_property(ps, key, value.clone());
                }
            }
            Operation::AddLink { profile, link } | Operation::TrackLink { profile, link } => {
                if let Some(ps) = state.profiles.get_mut(profile) {
                    ps.links.push(link.clone());
                }
            }
            Operation::RemoveLink { profile, link } | Operation::UntrackLink { profile, link } => {
                if let Some(ps) = state.profiles.get_mut(profile) {
                    ps.links.retain(|l| l.path != link.path);
                }
            }
            Operation::UpdateLink { profile, old, new } | Operation::UpdateTracked { profile, old, new } => {
                if let Some(ps) = state.profiles.get_mut(profile) {
                    ps.links.retain(|l| l.path != old.path);
                    ps.links.push(new.clone());
                }
            }
            Operation::RestoreLink { profile, saved, .. } => {
                if let Some(ps) = state.profiles.get_mut(profile) {
                    if !ps.links.iter().any(|l| l.path == saved.path) {
                        ps.links.push(saved.clone());
                    }
                }
            }
            Operation::Info { .. } | Operation::Start | Operation::Fin | Operation::UpdateProfile { .. } => {}
        }
    }
}

fn apply_property(ps: &mut crate::model::ProfileState, key: &str, value: Option<String>) {
    if key == "parent" {
        ps.parent = value;
        return;
    }
    for kind in EventKind::ALL {
        if kind.field_name() == key {
            ps.events.set(kind, value.unwrap_or_default());
            return;
        }
    }
}

fn touch_updated_profiles(state: &mut State, log: &DiffLog) {
    let touched: std::collections::HashSet<String> = log
        .operations
        .iter()
        .filter_map(|op| op.profile().map(str::to_string))
        .collect();
    let now = chrono::Utc::now();
    for name in touched {
        if let Some(ps) = state.profiles.get_mut(&name) {
            ps.updated = now;
        }
    }
}
