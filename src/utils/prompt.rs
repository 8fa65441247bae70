use std::io::{self, Write};

use dialoguer::Confirm;

pub fn confirm(prompt: &str) -> bool {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Require the literal string "YES" (case-sensitive), used for the
/// `--superforce` blacklist override.
pub fn confirm_yes_exact(prompt: &str) -> bool {
    print!("{} (type YES to confirm): ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    input.trim() == "YES"
}

pub fn prompt(prompt: &str) -> String {
    print!("{}: ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();

    input.trim().to_string()
}

/// Present a numbered list of choices and return the selected index.
pub fn choice(prompt: &str, options: &[&str]) -> Option<usize> {
    dialoguer::Select::new()
        .with_prompt(prompt)
        .items(options)
        .default(0)
        .interact_opt()
        .unwrap_or(None)
}
