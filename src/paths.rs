//! Filesystem layout under the per-user config root (~/.kdk).

use std::env;
use std::path::{Path, PathBuf};

use crate::errors::KdkError;

pub const CONFIG_ROOT_NAME: &str = ".kdk";
pub const KEYPAIR_DIR_NAME: &str = "ssh";
pub const PRIVATE_KEY_NAME: &str = "id_rsa";
pub const PUBLIC_KEY_NAME: &str = "id_rsa.pub";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the home directory used for the config root.
/// KDK_HOME wins over the platform home so tests and sandboxes can relocate everything.
pub fn home_dir() -> Result<PathBuf, KdkError> {
    if let Ok(v) = env::var("KDK_HOME") {
        let v = v.trim();
        if !v.is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    match home::home_dir() {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        _ => Err(KdkError::Environment(
            "unable to determine the current user's home directory".to_string(),
        )),
    }
}

/// Paths derived from a home directory. Everything except the per-profile
/// entries is independent of the profile name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdkPaths {
    home: PathBuf,
}

impl KdkPaths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn resolve() -> Result<Self, KdkError> {
        Ok(Self::new(home_dir()?))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// ~/.kdk
    pub fn config_root_dir(&self) -> PathBuf {
        self.home.join(CONFIG_ROOT_NAME)
    }

    /// ~/.kdk/ssh
    pub fn keypair_dir(&self) -> PathBuf {
        self.config_root_dir().join(KEYPAIR_DIR_NAME)
    }

    /// ~/.kdk/ssh/id_rsa
    pub fn private_key_path(&self) -> PathBuf {
        self.keypair_dir().join(PRIVATE_KEY_NAME)
    }

    /// ~/.kdk/ssh/id_rsa.pub
    pub fn public_key_path(&self) -> PathBuf {
        self.keypair_dir().join(PUBLIC_KEY_NAME)
    }

    /// ~/.kdk/<name>
    pub fn config_dir(&self, name: &str) -> PathBuf {
        self.config_root_dir().join(name)
    }

    /// ~/.kdk/<name>/config.yaml
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.config_dir(name).join(CONFIG_FILE_NAME)
    }

    /// Advisory lock file guarding mutating commands.
    pub fn lock_path(&self) -> PathBuf {
        self.config_root_dir().join(".lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_paths_follow_root() {
        let p = KdkPaths::new("/home/alice");
        for name in ["kdk", "work", "a.b-c_d"] {
            assert_eq!(
                p.config_path(name),
                p.config_root_dir().join(name).join("config.yaml")
            );
            assert_eq!(p.config_dir(name), PathBuf::from("/home/alice/.kdk").join(name));
        }
    }

    #[test]
    fn test_keypair_paths_are_name_independent() {
        let p = KdkPaths::new("/home/alice");
        assert_eq!(p.keypair_dir(), PathBuf::from("/home/alice/.kdk/ssh"));
        assert_eq!(
            p.private_key_path(),
            PathBuf::from("/home/alice/.kdk/ssh/id_rsa")
        );
        assert_eq!(
            p.public_key_path(),
            PathBuf::from("/home/alice/.kdk/ssh/id_rsa.pub")
        );
    }
}
