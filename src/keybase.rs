//! Optional keybase (KBFS) mount discovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use which::which;

use crate::errors::KdkError;
use crate::util::exec::{ExecRequest, ExecService};

/// Where KBFS appears inside the container.
pub const KEYBASE_CONTAINER_TARGET: &str = "/keybase";

/// Resolves an extra bind mount; failures are expected and non-fatal for callers.
pub trait MountResolver {
    /// Returns (host source, container target).
    fn resolve(&self, config_root: &Path) -> Result<(PathBuf, String), KdkError>;
}

/// Never yields a mount (`--no-keybase`, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMount;

impl MountResolver for NoMount {
    fn resolve(&self, _config_root: &Path) -> Result<(PathBuf, String), KdkError> {
        Err(KdkError::Message("keybase mount disabled".to_string()))
    }
}

/// Locates the host KBFS mount point.
///
/// Lookup order: `<config root>/keybase` (operator-provided link), the mountdir reported
/// by `keybase config get -d -b mountdir`, then the platform default.
#[derive(Debug, Clone)]
pub struct KeybaseResolver {
    exec: ExecService,
}

impl Default for KeybaseResolver {
    fn default() -> Self {
        KeybaseResolver {
            exec: ExecService::new(Duration::from_secs(10)),
        }
    }
}

fn platform_default_mount() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from("/Volumes/Keybase"))
    } else if cfg!(target_os = "windows") {
        Some(PathBuf::from("k:\\"))
    } else if cfg!(unix) {
        Some(PathBuf::from("/keybase"))
    } else {
        None
    }
}

impl KeybaseResolver {
    fn configured_mountdir(&self) -> Option<PathBuf> {
        let keybase = which("keybase").ok()?;
        let out = self
            .exec
            .run(ExecRequest::new(keybase).args(["config", "get", "-d", "-b", "mountdir"]))
            .ok()?;
        if !out.status.success() {
            return None;
        }
        let s = out.stdout.trim();
        if s.is_empty() {
            None
        } else {
            Some(PathBuf::from(s))
        }
    }
}

impl MountResolver for KeybaseResolver {
    fn resolve(&self, config_root: &Path) -> Result<(PathBuf, String), KdkError> {
        let candidates = [
            Some(config_root.join("keybase")),
            self.configured_mountdir(),
            platform_default_mount(),
        ];
        for c in candidates.into_iter().flatten() {
            if c.is_dir() {
                tracing::debug!(source = %c.display(), "keybase mount found");
                return Ok((c, KEYBASE_CONTAINER_TARGET.to_string()));
            }
        }
        Err(KdkError::Message(
            "keybase mount not found (is KBFS running?)".to_string(),
        ))
    }
}
