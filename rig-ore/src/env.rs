//! Utilities for reading environment variables.

use std::ffi::OsStr;

/// Returns true if `value` is one of `'0', '', 'no', 'false'`, ignoring case.
pub fn is_falsey(value: &OsStr) -> bool {
    static CANDIDATES: &[&str] = &["0", "", "no", "false"];

    let mut value = value.to_os_string();
    value.make_ascii_lowercase();
    CANDIDATES.iter().any(|falsey| value == *falsey)
}

/// Name of the environment variable that overrides the setting `name`, e.g.
/// `RIG_FOLLOW_SYMLINKS` for `follow_symlinks` with the prefix `RIG`.
pub fn override_var(prefix: &str, name: &str) -> String {
    let mut var = String::with_capacity(prefix.len() + name.len() + 1);
    var.push_str(prefix);
    var.push('_');
    var.extend(name.chars().map(|c| match c {
        '-' | '.' => '_',
        c => c.to_ascii_uppercase(),
    }));
    var
}
