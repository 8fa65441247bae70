use colored::Colorize;
use thiserror::Error;

/// The eight error kinds the reconciliation engine can raise, each mapped
/// to a fixed process exit code.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A broken invariant in the engine's own logic (e.g. a link-list diff
    /// that didn't converge). Unrecoverable.
    #[error("internal invariant violated: {0}")]
    Fatal(String),

    /// Bad CLI usage or config.
    #[error("{0}")]
    User(String),

    /// Two profiles would install the same link, a profile is reinstalled
    /// under a different root, or a blacklist violation.
    #[error("{0}")]
    Integrity(String),

    /// State/FS drift the engine refuses to silently fix.
    #[error("{0}")]
    Precondition(String),

    /// Profile evaluation error or event-script failure.
    #[error("{0}")]
    Generation(String),

    /// Any exception from inside a critical section, wrapped with context.
    #[error("{0}")]
    Unknown(String),

    /// An interactive prompt was answered with abort.
    #[error("aborted: {0}")]
    UserAbortion(String),

    /// One or more event scripts failed, or cancellation was triggered.
    #[error("{0}")]
    SystemAbortion(String),
}

impl ReconcileError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconcileError::Fatal(_) => 69,
            ReconcileError::User(_) => 101,
            ReconcileError::Integrity(_) => 102,
            ReconcileError::Precondition(_) => 103,
            ReconcileError::Generation(_) => 104,
            ReconcileError::Unknown(_) => 105,
            ReconcileError::UserAbortion(_) => 106,
            ReconcileError::SystemAbortion(_) => 107,
        }
    }

    /// Resolve the exit code for an arbitrary error, defaulting to Unknown
    /// (105) when it isn't one of our own kinds.
    pub fn exit_code_for(err: &anyhow::Error) -> i32 {
        err.downcast_ref::<ReconcileError>()
            .map(|e| e.exit_code())
            .unwrap_or(105)
    }
}

/// Format an error message with helpful context, causes, and solutions.
pub fn format_error_with_help(error: &str, causes: Vec<String>, solutions: Vec<String>) -> String {
    let mut output = String::new();

    output.push_str(&format!("{} {}\n\n", "✗".red().bold(), error.red().bold()));

    if !causes.is_empty() {
        output.push_str(&format!("  {}\n", "This usually happens when:".dimmed()));
        for cause in causes {
            output.push_str(&format!("    {} {}\n", "•".dimmed(), cause.dimmed()));
        }
        output.push('\n');
    }

    if !solutions.is_empty() {
        output.push_str(&format!("  {}\n", "Possible solutions:".yellow()));
        for (i, solution) in solutions.iter().enumerate() {
            output.push_str(&format!(
                "    {}. {}\n",
                (i + 1).to_string().yellow(),
                solution
            ));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "  {} {}\n",
        "Need help?".cyan(),
        "Run: dotty --help".cyan().bold()
    ));

    output
}

/// Format a link-conflict error with helpful suggestions.
pub fn link_error(path: &str, existing_type: LinkErrorType) -> String {
    let (error_msg, causes, solutions) = match existing_type {
        LinkErrorType::FileExists => (
            format!("Cannot create link at {}", path),
            vec![
                "A non-symlink file already exists there".to_string(),
                "Another profile already manages it".to_string(),
            ],
            vec![
                "Re-run with --force to overwrite".to_string(),
                format!("Inspect the existing file: ls -la {}", path),
            ],
        ),
        LinkErrorType::PermissionDenied => (
            format!("Permission denied when creating link at {}", path),
            vec!["The target directory requires elevated permissions".to_string()],
            vec!["Re-run under sudo; dotty will re-exec with --skiproot cleared".to_string()],
        ),
        LinkErrorType::DirectoryNotFound => (
            format!("Cannot create link at {}", path),
            vec!["The parent directory doesn't exist".to_string()],
            vec!["Re-run with --makedirs".to_string()],
        ),
        LinkErrorType::Blacklisted => (
            format!("Refusing to touch blacklisted path {}", path),
            vec!["The path matches an entry in black.list".to_string()],
            vec!["Re-run with --superforce and confirm YES if this is intentional".to_string()],
        ),
    };

    format_error_with_help(&error_msg, causes, solutions)
}

pub enum LinkErrorType {
    FileExists,
    PermissionDenied,
    DirectoryNotFound,
    Blacklisted,
}

/// Format a configuration error.
pub fn config_error(file: &str, error_type: ConfigErrorType) -> String {
    let (error_msg, causes, solutions) = match error_type {
        ConfigErrorType::FileNotFound => (
            format!("Configuration file not found: {}", file),
            vec!["You haven't created a config yet".to_string()],
            vec![format!("Check if the file exists: ls {}", file)],
        ),
        ConfigErrorType::ParseError(ref reason) => (
            format!("Failed to parse configuration file: {}", file),
            vec![reason.clone()],
            vec!["Validate the file's YAML/TOML syntax".to_string()],
        ),
        ConfigErrorType::ValidationError(ref field, ref reason) => (
            format!("Invalid configuration in {}: {}", file, field),
            vec![reason.clone()],
            vec!["Check the field's expected type and required-ness".to_string()],
        ),
    };

    format_error_with_help(&error_msg, causes, solutions)
}

pub enum ConfigErrorType {
    FileNotFound,
    ParseError(String),
    ValidationError(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_with_help() {
        let result = format_error_with_help(
            "Test error",
            vec!["Cause 1".to_string()],
            vec!["Solution 1".to_string()],
        );

        assert!(result.contains("Test error"));
        assert!(result.contains("Cause 1"));
        assert!(result.contains("Solution 1"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ReconcileError::Fatal("x".into()).exit_code(), 69);
        assert_eq!(ReconcileError::User("x".into()).exit_code(), 101);
        assert_eq!(ReconcileError::Integrity("x".into()).exit_code(), 102);
        assert_eq!(ReconcileError::Precondition("x".into()).exit_code(), 103);
        assert_eq!(ReconcileError::Generation("x".into()).exit_code(), 104);
        assert_eq!(ReconcileError::Unknown("x".into()).exit_code(), 105);
        assert_eq!(ReconcileError::UserAbortion("x".into()).exit_code(), 106);
        assert_eq!(ReconcileError::SystemAbortion("x".into()).exit_code(), 107);
    }

    #[test]
    fn test_link_error() {
        let result = link_error("/home/user/.vimrc", LinkErrorType::FileExists);
        assert!(result.contains(".vimrc"));
        assert!(result.contains("already exists"));
    }
}
