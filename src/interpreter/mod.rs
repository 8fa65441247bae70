//! The Interpreter pipeline from spec.md §4.5, grounded on
//! `uberdot/interpreters.py` in full.

pub mod checks;
pub mod dui;
pub mod events;
pub mod executor;
pub mod printer;
pub mod root;

pub use checks::{
    CheckDiffsolverResult, CheckDynamicFiles, CheckFileOverwrite, CheckLinkBlacklist,
    CheckLinkDirs, CheckLinks, CheckProfiles,
};
pub use events::{EventExecInterpreter, EventOutcome, EventPrintInterpreter, PendingEvent};
pub use executor::ExecuteInterpreter;
pub use printer::{PrintPlain, PrintPretty, PrintSummary};
pub use root::{
    read_resume_config, DetectRoot, GainRoot, ResumeConfig, RootRequirement, SerializableFlags,
    SkipRoot, RESUME_SCHEMA_VERSION,
};

/// Orthogonal run flags threaded through checks, root detection, and the
/// executor (spec.md §6's CLI flag list).
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub dryrun: bool,
    pub changes: bool,
    pub force: bool,
    pub superforce: bool,
    pub makedirs: bool,
    pub dui: bool,
    pub skiproot: bool,
    pub skipbefore: bool,
    pub skipafter: bool,
    pub skipevents: bool,
    pub parent: Option<String>,
}
