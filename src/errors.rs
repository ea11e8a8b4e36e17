//! Error mapping guide:
//! - Map io::ErrorKind::NotFound to exit code 127; all others to 1.
//! - `KdkError::Environment` marks unrecoverable precondition failures (home directory,
//!   login name). They are reported once and never retried.
//! - A missing container runtime is `KdkError::Runtime` with `NotFound`, hence 127.
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

#[derive(Debug)]
pub enum KdkError {
    /// The host environment cannot support the manager at all.
    Environment(String),
    /// Filesystem failure tied to a concrete path.
    Io { path: PathBuf, source: io::Error },
    Yaml(serde_yaml::Error),
    KeyGen(String),
    Prompt(io::Error),
    Runtime(io::Error),
    Message(String),
}

impl KdkError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        KdkError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for KdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KdkError::Environment(s) => write!(f, "environment error: {s}"),
            KdkError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            KdkError::Yaml(e) => write!(f, "yaml error: {e}"),
            KdkError::KeyGen(s) => write!(f, "ssh key generation failed: {s}"),
            KdkError::Prompt(e) => write!(f, "prompt failed: {e}"),
            KdkError::Runtime(e) => write!(f, "{e}"),
            KdkError::Message(s) => f.write_str(s),
        }
    }
}

impl std::error::Error for KdkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KdkError::Io { source, .. } => Some(source),
            KdkError::Yaml(e) => Some(e),
            KdkError::Prompt(e) | KdkError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for KdkError {
    fn from(e: serde_yaml::Error) -> Self {
        KdkError::Yaml(e)
    }
}

/// Convert KdkError to exit code (parity with io::Error mapping).
pub fn exit_code_for_kdk_error(e: &KdkError) -> u8 {
    match e {
        KdkError::Io { source, .. } => exit_code_for_io_error(source),
        KdkError::Runtime(ioe) | KdkError::Prompt(ioe) => exit_code_for_io_error(ioe),
        _ => 1,
    }
}
