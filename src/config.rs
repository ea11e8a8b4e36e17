#![allow(clippy::module_name_repetitions)]
//! Profile data model and its on-disk YAML form (~/.kdk/<name>/config.yaml).
//!
//! Field names mirror the Docker Engine API (`Hostname`, `ExposedPorts`, `PortBindings`,
//! ...) so a saved profile reads like the container/host configs it describes.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::KdkError;

pub const DEFAULT_NAME: &str = "kdk";
pub const DEFAULT_IMAGE_REPOSITORY: &str = "ciscosso/kdk";
pub const DEFAULT_IMAGE_TAG: &str = "debian-latest";
pub const DEFAULT_DOTFILES_REPO: &str = "https://github.com/cisco-sso/yadm-dotfiles.git";
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// SSH port exposed inside the container.
pub const SSH_CONTAINER_PORT: &str = "2022/tcp";
/// Label key carrying the kdk version that produced the container config.
pub const VERSION_LABEL: &str = "kdk";

/// Marker value for Docker's set-like maps (`{"2022/tcp": {}}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    pub name: String,
    pub port: String,
    pub image_repository: String,
    pub image_tag: String,
    pub dotfiles_repo: String,
    pub shell: String,
    #[serde(default)]
    pub debug: bool,
}

impl AppConfig {
    /// Defaults overlaid with KDK_* values returned by `lookup`.
    pub fn from_lookup<F>(lookup: F, default_port: u16) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let debug = lookup("KDK_DEBUG")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        AppConfig {
            name: get("KDK_NAME", DEFAULT_NAME),
            port: get("KDK_PORT", &default_port.to_string()),
            image_repository: get("KDK_IMAGE_REPOSITORY", DEFAULT_IMAGE_REPOSITORY),
            image_tag: get("KDK_IMAGE_TAG", DEFAULT_IMAGE_TAG),
            dotfiles_repo: get("KDK_DOTFILES_REPO", DEFAULT_DOTFILES_REPO),
            shell: get("KDK_SHELL", DEFAULT_SHELL),
            debug,
        }
    }

    /// Image pull reference, e.g. `ciscosso/kdk:debian-latest`.
    pub fn image_coordinates(&self) -> String {
        format!("{}:{}", self.image_repository, self.image_tag)
    }

    /// Reject values that would produce an unusable profile path or container config.
    pub fn validate(&self) -> Result<(), KdkError> {
        validate_name(&self.name)?;
        match self.port.trim().parse::<u16>() {
            Ok(p) if p != 0 => {}
            _ => {
                return Err(KdkError::Message(format!(
                    "invalid port '{}': expected 1-65535",
                    self.port
                )))
            }
        }
        if self.image_repository.trim().is_empty() || self.image_tag.trim().is_empty() {
            return Err(KdkError::Message(
                "image repository and tag must not be empty".to_string(),
            ));
        }
        validate_repo_url(&self.dotfiles_repo)?;
        if self.shell.trim().is_empty() {
            return Err(KdkError::Message("shell must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Profile names double as directory names and container hostnames.
pub fn validate_name(name: &str) -> Result<(), KdkError> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name != crate::paths::KEYPAIR_DIR_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c));
    if ok {
        Ok(())
    } else {
        Err(KdkError::Message(format!(
            "invalid profile name '{name}': use letters, digits, '-', '_' or '.'"
        )))
    }
}

/// Accept a parseable URL or scp-style `user@host:path`.
pub fn validate_repo_url(repo: &str) -> Result<(), KdkError> {
    let repo = repo.trim();
    if repo.contains("://") {
        return url::Url::parse(repo)
            .map(|_| ())
            .map_err(|e| KdkError::Message(format!("invalid dotfiles repo '{repo}': {e}")));
    }
    let scp_like = repo
        .split_once('@')
        .and_then(|(user, rest)| rest.split_once(':').map(|(host, path)| (user, host, path)))
        .map(|(u, h, p)| !u.is_empty() && !h.is_empty() && !p.is_empty())
        .unwrap_or(false);
    if scp_like {
        Ok(())
    } else {
        Err(KdkError::Message(format!(
            "invalid dotfiles repo '{repo}': expected a URL or user@host:path"
        )))
    }
}

/// kdk only writes `Bind`; `Volume` and `Tmpfs` keep hand-edited profiles loadable and
/// are passed through to `docker create --mount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Bind,
    Volume,
    Tmpfs,
}

impl MountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountType::Bind => "bind",
            MountType::Volume => "volume",
            MountType::Tmpfs => "tmpfs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mount {
    #[serde(rename = "Type")]
    pub kind: MountType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl Mount {
    pub fn bind(source: impl Into<String>, target: impl Into<String>, read_only: bool) -> Self {
        Mount {
            kind: MountType::Bind,
            source: source.into(),
            target: target.into(),
            read_only,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_ip: String,
    pub host_port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    pub image: String,
    #[serde(default)]
    pub tty: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exposed_ports: BTreeMap<String, Empty>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Empty>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default)]
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
}

/// Everything persisted as ~/.kdk/<name>/config.yaml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFile {
    pub app_config: AppConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_config: Option<ContainerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
}

impl ConfigFile {
    pub fn new(app_config: AppConfig) -> Self {
        ConfigFile {
            app_config,
            container_config: None,
            host_config: None,
        }
    }

    pub fn to_yaml(&self) -> Result<String, KdkError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(s: &str) -> Result<Self, KdkError> {
        Ok(serde_yaml::from_str(s)?)
    }
}

/// Read and parse a saved profile.
pub fn load_config(path: &Path) -> Result<ConfigFile, KdkError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            KdkError::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "KDK config not found; run `kdk init`"),
            )
        } else {
            KdkError::io(path, e)
        }
    })?;
    ConfigFile::from_yaml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppConfig {
        AppConfig {
            name: "kdk".into(),
            port: "2222".into(),
            image_repository: "ciscosso/kdk".into(),
            image_tag: "debian-latest".into(),
            dotfiles_repo: DEFAULT_DOTFILES_REPO.into(),
            shell: "/bin/zsh".into(),
            debug: false,
        }
    }

    #[test]
    fn test_image_coordinates() {
        assert_eq!(app().image_coordinates(), "ciscosso/kdk:debian-latest");
    }

    #[test]
    fn test_unset_sections_absent_on_wire() {
        let y = ConfigFile::new(app()).to_yaml().expect("yaml");
        assert!(y.contains("AppConfig:"), "yaml:\n{y}");
        assert!(!y.contains("ContainerConfig"), "yaml:\n{y}");
        assert!(!y.contains("HostConfig"), "yaml:\n{y}");
        assert!(!y.contains("null"), "yaml:\n{y}");
    }

    #[test]
    fn test_full_profile_roundtrip() {
        let mut cf = ConfigFile::new(app());
        let mut volumes = BTreeMap::new();
        volumes.insert("/tmp/id_rsa.pub".to_string(), Empty {});
        let mut exposed = BTreeMap::new();
        exposed.insert(SSH_CONTAINER_PORT.to_string(), Empty {});
        cf.container_config = Some(ContainerConfig {
            hostname: "kdk".into(),
            image: "ciscosso/kdk:debian-latest".into(),
            tty: true,
            env: vec!["KDK_USERNAME=alice".into()],
            exposed_ports: exposed,
            volumes,
            labels: [(VERSION_LABEL.to_string(), "0.9.2".to_string())]
                .into_iter()
                .collect(),
        });
        let mut bindings = BTreeMap::new();
        bindings.insert(
            SSH_CONTAINER_PORT.to_string(),
            vec![PortBinding {
                host_ip: String::new(),
                host_port: "2222".into(),
            }],
        );
        cf.host_config = Some(HostConfig {
            privileged: true,
            port_bindings: bindings,
            mounts: vec![
                Mount::bind("/home/alice/.kdk/ssh/id_rsa.pub", "/tmp/id_rsa.pub", true),
                Mount::bind("/src", "/home/alice/src", false),
            ],
        });
        let y = cf.to_yaml().expect("yaml");
        assert!(y.contains("ReadOnly: true"), "yaml:\n{y}");
        assert!(y.contains("Type: bind"), "yaml:\n{y}");
        assert!(y.contains("HostPort:"), "yaml:\n{y}");
        let back = ConfigFile::from_yaml(&y).expect("parse");
        assert_eq!(back, cf);
    }

    #[test]
    fn test_from_lookup_defaults_and_overrides() {
        let d = AppConfig::from_lookup(|_| None, 40123);
        assert_eq!(d.name, DEFAULT_NAME);
        assert_eq!(d.port, "40123");
        assert_eq!(d.image_coordinates(), "ciscosso/kdk:debian-latest");
        assert!(!d.debug);

        let o = AppConfig::from_lookup(
            |k| match k {
                "KDK_NAME" => Some("work".into()),
                "KDK_IMAGE_TAG" => Some("ubuntu-latest".into()),
                "KDK_SHELL" => Some("  ".into()),
                "KDK_DEBUG" => Some("true".into()),
                _ => None,
            },
            1,
        );
        assert_eq!(o.name, "work");
        assert_eq!(o.image_tag, "ubuntu-latest");
        assert_eq!(o.shell, DEFAULT_SHELL);
        assert!(o.debug);
    }

    #[test]
    fn test_validate() {
        assert!(app().validate().is_ok());

        let mut a = app();
        a.name = String::new();
        assert!(a.validate().is_err());
        a.name = "ssh".into();
        assert!(a.validate().is_err());
        a.name = "../etc".into();
        assert!(a.validate().is_err());

        let mut a = app();
        a.port = "0".into();
        assert!(a.validate().is_err());
        a.port = "70000".into();
        assert!(a.validate().is_err());

        let mut a = app();
        a.dotfiles_repo = "git@github.com:me/dotfiles.git".into();
        assert!(a.validate().is_ok());
        a.dotfiles_repo = "not a repo".into();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_load_config_missing_is_not_found() {
        let td = tempfile::tempdir().expect("tmpdir");
        let err = load_config(&td.path().join("nope.yaml")).unwrap_err();
        match err {
            KdkError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
