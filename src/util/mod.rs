#![allow(clippy::module_name_repetitions)]
//! Small utilities: shell quoting for command previews, permission-aware fs helpers,
//! process execution and free-port lookup.

pub mod exec;
pub mod fs;

use std::io;
use std::net::{Ipv4Addr, TcpListener};

pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}

/// Ask the OS for an unused local TCP port.
/// The listener is dropped before returning, so the port is only likely to stay free.
pub fn find_free_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_escape_simple() {
        assert_eq!(shell_escape("type=bind,source=/a,target=/b"), "type=bind,source=/a,target=/b");
    }

    #[test]
    fn test_shell_escape_with_spaces_and_quotes() {
        assert_eq!(shell_escape("a b c"), "'a b c'");
        assert_eq!(shell_escape("O'Reilly"), "'O'\"'\"'Reilly'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_shell_join() {
        let args = vec!["docker".to_string(), "b c".to_string(), "d".to_string()];
        assert_eq!(shell_join(&args), "docker 'b c' d");
    }

    #[test]
    fn test_find_free_port_nonzero() {
        let port = find_free_port().expect("free port");
        assert_ne!(port, 0);
    }
}
