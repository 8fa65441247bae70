pub mod error;
pub mod logger;
pub mod os;
pub mod prompt;

pub use error::{config_error, format_error_with_help, link_error, ConfigErrorType, LinkErrorType, ReconcileError};
pub use logger::{error, header, info, step, success, warning};
pub use os::{can_write_dir, detect_os, is_linux, is_macos, is_root, os_name, path_owner, real_identity, RealIdentity};
pub use prompt::{choice, confirm, confirm_yes_exact, prompt};
