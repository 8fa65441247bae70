//! Event-script interpreters: `EventPrintInterpreter` (dry-run preview)
//! and `EventExecInterpreter` (actually spawns the scripts, demoting to
//! the real user when running as root). Grounded on
//! `limistah-heimdal/src/hooks/mod.rs`'s subprocess-with-stdout-streaming
//! idiom, generalized from a single hook kind to the six profile event
//! kinds in spec.md §4.1/§4.5.

use std::io::{BufRead, BufReader};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use crate::model::EventKind;
use crate::utils::{is_root, real_identity, ReconcileError};

/// One event script due to run, resolved by the orchestrator from a
/// profile's `EventHashes` plus its on-disk session path.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub profile: String,
    pub kind: EventKind,
    pub script_path: std::path::PathBuf,
}

/// Dry-run/plan preview: just lists which scripts would run, in order.
#[derive(Default)]
pub struct EventPrintInterpreter {
    pub planned: Vec<String>,
}

impl EventPrintInterpreter {
    pub fn record(&mut self, event: &PendingEvent) {
        self.planned.push(format!(
            "[{}] {} -> {}",
            event.profile,
            event.kind.field_name(),
            event.script_path.display()
        ));
    }
}

/// Result of running one event script.
pub struct EventOutcome {
    pub event: PendingEvent,
    pub exit_code: i32,
}

/// Runs event scripts for real. Demotes to the real (pre-sudo) uid/gid
/// before spawning when the current process is root, matching
/// `limistah-heimdal`'s hook runner. Streams stdout/stderr line-by-line
/// to the logger via a background thread so slow scripts don't appear to
/// hang.
pub struct EventExecInterpreter {
    shell: String,
    timeout: std::time::Duration,
    failures: usize,
    abort_after_first_failure: bool,
}

impl EventExecInterpreter {
    pub fn new(shell: impl Into<String>, timeout: std::time::Duration, abort_after_first_failure: bool) -> Self {
        EventExecInterpreter {
            shell: shell.into(),
            timeout,
            failures: 0,
            abort_after_first_failure,
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Run one event script to completion, streaming its output.
    /// Returns `Ok` with the exit code even on nonzero exit; the caller
    /// decides whether a nonzero before-event aborts the run (spec.md
    /// §4.5: a failed after-event never aborts).
    pub fn run(&mut self, event: &PendingEvent) -> anyhow::Result<EventOutcome> {
        if self.abort_after_first_failure && self.failures > 0 {
            return Err(ReconcileError::SystemAbortion(
                "a previous event script failed; skipping remaining events".into(),
            )
            .into());
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&event.script_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if is_root() {
            let identity = real_identity();
            unsafe {
                cmd.pre_exec(move || {
                    nix::unistd::setgid(nix::unistd::Gid::from_raw(identity.gid))
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                    nix::unistd::setuid(nix::unistd::Uid::from_raw(identity.uid))
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                    Ok(())
                });
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ReconcileError::Generation(format!("failed to spawn event script: {e}")))?;

        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let done_watcher = done.clone();
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        let timeout = self.timeout;
        let watcher = thread::spawn(move || {
            thread::sleep(timeout);
            if !done_watcher.load(std::sync::atomic::Ordering::SeqCst) {
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
            }
        });

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let (tx, rx) = mpsc::channel::<String>();
        let tx2 = tx.clone();
        let profile = event.profile.clone();

        let out_thread = thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                let _ = tx.send(line);
            }
        });
        let err_thread = thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                let _ = tx2.send(line);
            }
        });

        for line in rx {
            crate::utils::step(&format!("[{profile}] {line}"));
        }
        let _ = out_thread.join();
        let _ = err_thread.join();

        let status = child
            .wait()
            .map_err(|e| ReconcileError::Generation(format!("event script wait failed: {e}")))?;
        done.store(true, std::sync::atomic::Ordering::SeqCst);
        let _ = watcher.join();
        let exit_code = status.code().unwrap_or(-1);

        if exit_code != 0 {
            self.failures += 1;
            return Err(ReconcileError::Generation(format!(
                "event script {} (profile '{}', {}) exited with status {}",
                event.script_path.display(),
                event.profile,
                event.kind.field_name(),
                exit_code
            ))
            .into());
        }

        Ok(EventOutcome {
            event: event.clone(),
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_interpreter_records_plan() {
        let mut printer = EventPrintInterpreter::default();
        printer.record(&PendingEvent {
            profile: "work".into(),
            kind: EventKind::BeforeInstall,
            script_path: "/tmp/script.sh".into(),
        });
        assert_eq!(printer.planned.len(), 1);
        assert!(printer.planned[0].contains("beforeInstall"));
    }

    #[test]
    fn exec_interpreter_reports_nonzero_exit() {
        let mut exec = EventExecInterpreter::new("sh", std::time::Duration::from_secs(5), false);
        let event = PendingEvent {
            profile: "work".into(),
            kind: EventKind::AfterInstall,
            script_path: "/bin/false".into(),
        };
        let result = exec.run(&event);
        assert!(result.is_err());
        assert_eq!(exec.failures(), 1);
    }

    #[test]
    fn exec_interpreter_aborts_after_prior_failure_when_configured() {
        let mut exec = EventExecInterpreter::new("sh", std::time::Duration::from_secs(5), true);
        exec.failures = 1;
        let event = PendingEvent {
            profile: "work".into(),
            kind: EventKind::AfterInstall,
            script_path: "/bin/true".into(),
        };
        assert!(exec.run(&event).is_err());
    }
}
