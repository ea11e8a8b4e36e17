//! Login name of the invoking user.

use std::env;

/// Strip a `domain\` prefix (Windows account names) and keep the user part,
/// i.e. the segment right after the first backslash.
pub fn normalize_username(raw: &str) -> String {
    raw.split('\\').nth(1).unwrap_or(raw).to_string()
}

/// Current OS user's login name.
/// Unix: passwd entry for the real uid, falling back to USER/LOGNAME.
/// Elsewhere: USERNAME/USER.
pub fn current_username() -> Option<String> {
    #[cfg(unix)]
    {
        use nix::unistd::{getuid, User};
        if let Ok(Some(u)) = User::from_uid(getuid()) {
            if !u.name.is_empty() {
                return Some(normalize_username(&u.name));
            }
        }
    }
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .map(|v| normalize_username(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_domain() {
        assert_eq!(normalize_username("CORP\\alice"), "alice");
        assert_eq!(normalize_username("alice"), "alice");
        assert_eq!(normalize_username(""), "");
        assert_eq!(normalize_username("CORP\\alice\\extra"), "alice");
    }

    #[test]
    fn test_current_username_not_empty_when_present() {
        if let Some(u) = current_username() {
            assert!(!u.is_empty());
            assert!(!u.contains('\\'));
        }
    }
}
