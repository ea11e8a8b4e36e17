#![allow(clippy::module_name_repetitions)]
//! Environment profile manager: assembles the container/host configuration for a named
//! profile, persists it under the config root and provisions the shared SSH keypair.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{
    load_config, AppConfig, ConfigFile, ContainerConfig, Empty, HostConfig, Mount, PortBinding,
    SSH_CONTAINER_PORT, VERSION_LABEL,
};
use crate::docker::RuntimeClient;
use crate::errors::KdkError;
use crate::identity::current_username;
use crate::keybase::MountResolver;
use crate::paths::KdkPaths;
use crate::prompt::{confirm, MountSource, PromptMountSource, Prompter};
use crate::ssh::{write_key_to_file, KeyGenerator, KEY_BITS, PRIVATE_KEY_MODE, PUBLIC_KEY_MODE};
use crate::util::fs::{ensure_dir_with_mode, write_file_with_mode};

/// Container path the public key is mounted at; the image's bootstrap copies it into
/// the user's authorized_keys with strict permissions.
pub const PUBLIC_KEY_CONTAINER_TARGET: &str = "/tmp/id_rsa.pub";
/// Upper bound on additional mounts collected for one profile.
pub const MAX_EXTRA_MOUNTS: usize = 64;
pub const CONFIG_DIR_MODE: u32 = 0o700;
pub const CONFIG_FILE_MODE: u32 = 0o600;

pub const OVERWRITE_TEXT: &str = "Overwrite existing KDK config? [y/n] ";

/// Process-level inputs fixed at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub version: String,
    pub paths: KdkPaths,
    pub username: String,
}

impl Settings {
    /// Resolve home directory and login name; either failing is fatal for the manager.
    pub fn detect(version: impl Into<String>) -> Result<Self, KdkError> {
        let paths = KdkPaths::resolve()?;
        let username = current_username().ok_or_else(|| {
            KdkError::Environment("unable to determine the current user name".to_string())
        })?;
        Ok(Settings {
            version: version.into(),
            paths,
            username,
        })
    }
}

/// Result of persisting a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Overwritten,
    /// A profile already existed and the operator chose to keep it.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypairOutcome {
    Generated,
    Exists,
}

pub struct KdkEnv {
    settings: Settings,
    pub config_file: ConfigFile,
    runtime: Option<RuntimeClient>,
}

impl KdkEnv {
    pub fn new(settings: Settings, app_config: AppConfig) -> Self {
        KdkEnv {
            settings,
            config_file: ConfigFile::new(app_config),
            runtime: None,
        }
    }

    /// Load the saved profile `name`.
    pub fn load(settings: Settings, name: &str) -> Result<Self, KdkError> {
        let config_file = load_config(&settings.paths.config_path(name))?;
        Ok(KdkEnv {
            settings,
            config_file,
            runtime: None,
        })
    }

    /// Locate the container runtime. Failure is fatal for commands that need it.
    pub fn init(&mut self) -> Result<&RuntimeClient, KdkError> {
        let client = RuntimeClient::connect()?;
        tracing::debug!(docker = %client.path().display(), "container runtime located");
        Ok(self.runtime.insert(client))
    }

    pub fn runtime(&self) -> Option<&RuntimeClient> {
        self.runtime.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn app(&self) -> &AppConfig {
        &self.config_file.app_config
    }

    pub fn user(&self) -> &str {
        &self.settings.username
    }

    pub fn home(&self) -> &Path {
        self.settings.paths.home()
    }

    pub fn config_root_dir(&self) -> PathBuf {
        self.settings.paths.config_root_dir()
    }

    pub fn keypair_dir(&self) -> PathBuf {
        self.settings.paths.keypair_dir()
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.settings.paths.private_key_path()
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.settings.paths.public_key_path()
    }

    pub fn config_dir(&self) -> PathBuf {
        self.settings.paths.config_dir(&self.app().name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.settings.paths.config_path(&self.app().name)
    }

    pub fn image_coordinates(&self) -> String {
        self.app().image_coordinates()
    }

    /// Interactive profile creation: collect mounts and confirm overwrites via `prompter`.
    pub fn create_kdk_config<P: Prompter + ?Sized>(
        &mut self,
        prompter: &mut P,
        keybase: &dyn MountResolver,
    ) -> Result<WriteOutcome, KdkError> {
        {
            let mut mounts = PromptMountSource::new(&mut *prompter);
            self.assemble(keybase, &mut mounts)?;
        }
        self.persist(|| confirm(prompter, OVERWRITE_TEXT))
    }

    /// Build the container and host configs from the profile fields and mounts.
    pub fn assemble(
        &mut self,
        keybase: &dyn MountResolver,
        extra: &mut dyn MountSource,
    ) -> Result<(), KdkError> {
        self.app().validate()?;

        let mut mounts: Vec<Mount> = Vec::new();

        let pubkey = self.public_key_path().display().to_string();
        mounts.push(Mount::bind(pubkey, PUBLIC_KEY_CONTAINER_TARGET, true));

        match keybase.resolve(&self.config_root_dir()) {
            Ok((source, target)) => {
                tracing::info!(source = %source.display(), target = %target, "adding keybase mount");
                mounts.push(Mount::bind(source.display().to_string(), target, false));
            }
            Err(e) => tracing::warn!(error = %e, "Failed to add keybase mount"),
        }

        let mut added = 0usize;
        while let Some(req) = extra.next_mount().map_err(KdkError::Prompt)? {
            mounts.push(Mount::bind(
                req.source.display().to_string(),
                req.target,
                false,
            ));
            added += 1;
            if added >= MAX_EXTRA_MOUNTS {
                tracing::warn!(limit = MAX_EXTRA_MOUNTS, "additional mount limit reached");
                break;
            }
        }

        let volumes: BTreeMap<String, Empty> = mounts
            .iter()
            .map(|m| (m.target.clone(), Empty {}))
            .collect();

        let app = &self.config_file.app_config;
        let container = ContainerConfig {
            hostname: app.name.clone(),
            image: app.image_coordinates(),
            tty: true,
            env: vec![
                format!("KDK_USERNAME={}", self.settings.username),
                format!("KDK_SHELL={}", app.shell),
                format!("KDK_DOTFILES_REPO={}", app.dotfiles_repo),
            ],
            exposed_ports: [(SSH_CONTAINER_PORT.to_string(), Empty {})]
                .into_iter()
                .collect(),
            volumes,
            labels: [(VERSION_LABEL.to_string(), self.settings.version.clone())]
                .into_iter()
                .collect(),
        };
        let host = HostConfig {
            privileged: true,
            port_bindings: [(
                SSH_CONTAINER_PORT.to_string(),
                vec![PortBinding {
                    host_ip: String::new(),
                    host_port: app.port.clone(),
                }],
            )]
            .into_iter()
            .collect(),
            mounts,
        };
        tracing::debug!(
            name = %app.name,
            mounts = host.mounts.len(),
            "assembled container configuration"
        );
        self.config_file.container_config = Some(container);
        self.config_file.host_config = Some(host);
        Ok(())
    }

    fn ensure_dir(&self, dir: &Path, what: &str) -> Result<(), KdkError> {
        match ensure_dir_with_mode(dir, CONFIG_DIR_MODE) {
            Ok(true) => {
                tracing::debug!(path = %dir.display(), "created {what}");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, path = %dir.display(), "Failed to create {what}");
                Err(KdkError::io(dir, e))
            }
        }
    }

    /// Write the profile file, asking `confirm_overwrite` when one already exists.
    pub fn persist<F>(&self, confirm_overwrite: F) -> Result<WriteOutcome, KdkError>
    where
        F: FnOnce() -> io::Result<bool>,
    {
        self.ensure_dir(&self.config_root_dir(), "KDK config directory")?;
        self.ensure_dir(&self.config_dir(), "KDK profile directory")?;

        let yaml = self.config_file.to_yaml().map_err(|e| {
            tracing::error!(error = %e, "Failed to create YAML string of configuration");
            e
        })?;

        let path = self.config_path();
        let outcome = if path.exists() {
            tracing::warn!(path = %path.display(), "KDK config exists");
            if !confirm_overwrite().map_err(KdkError::Prompt)? {
                tracing::info!(path = %path.display(), "Existing KDK config not overwritten");
                return Ok(WriteOutcome::Skipped);
            }
            WriteOutcome::Overwritten
        } else {
            tracing::warn!(path = %path.display(), "KDK config does not exist");
            WriteOutcome::Created
        };

        tracing::info!(path = %path.display(), "Creating KDK config");
        write_file_with_mode(&path, yaml.as_bytes(), CONFIG_FILE_MODE).map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to write KDK config");
            KdkError::io(&path, e)
        })?;
        Ok(outcome)
    }

    /// Ensure the shared keypair exists; the private key's presence is the only check.
    pub fn create_kdk_ssh_keypair(
        &self,
        generator: &dyn KeyGenerator,
    ) -> Result<KeypairOutcome, KdkError> {
        self.ensure_dir(&self.config_root_dir(), "KDK config directory")?;
        self.ensure_dir(&self.keypair_dir(), "ssh key directory")?;

        let private = self.private_key_path();
        if private.exists() {
            tracing::info!(path = %private.display(), "KDK ssh key pair exists.");
            return Ok(KeypairOutcome::Exists);
        }

        tracing::warn!("KDK ssh key pair not found.");
        tracing::info!(bits = KEY_BITS, "Generating ssh key pair...");
        let pair = generator.generate(KEY_BITS).map_err(|e| {
            tracing::error!(error = %e, "Failed to generate ssh key pair");
            e
        })?;
        // public half first: the private key's presence marks a complete pair
        write_key_to_file(&pair.public_openssh, &self.public_key_path(), PUBLIC_KEY_MODE)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to write ssh public key");
                e
            })?;
        write_key_to_file(&pair.private_pem, &private, PRIVATE_KEY_MODE).map_err(|e| {
            tracing::error!(error = %e, "Failed to write ssh private key");
            e
        })?;
        tracing::info!("Successfully generated ssh key pair.");
        Ok(KeypairOutcome::Generated)
    }
}

/// Names of saved profiles under the config root, sorted.
pub fn list_profiles(paths: &KdkPaths) -> io::Result<Vec<String>> {
    let root = paths.config_root_dir();
    let entries = match std::fs::read_dir(&root) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name == crate::paths::KEYPAIR_DIR_NAME {
            continue;
        }
        if paths.config_path(&name).is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
