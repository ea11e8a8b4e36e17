//! kdk: provision a personal containerized development environment.
//!
//! - `paths`/`identity`: where things live and who is asking.
//! - `config`: the profile model persisted as `~/.kdk/<name>/config.yaml`.
//! - `manager`: assembles and persists profiles, provisions the shared SSH keypair.
//! - `docker`, `ssh`, `keybase`, `prompt`: collaborators behind small traits.

mod color;
pub mod config;
pub mod docker;
mod errors;
pub mod identity;
pub mod keybase;
mod lock;
pub mod logging;
pub mod manager;
pub mod paths;
pub mod prompt;
pub mod ssh;
pub mod util;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use config::{
    load_config, AppConfig, ConfigFile, ContainerConfig, HostConfig, Mount, MountType,
    PortBinding,
};
pub use docker::{build_create_args, container_runtime_path, LifecycleAction, RuntimeClient};
pub use errors::{exit_code_for_io_error, exit_code_for_kdk_error, KdkError};
pub use identity::{current_username, normalize_username};
pub use keybase::{KeybaseResolver, MountResolver, NoMount};
pub use lock::{acquire_lock, ConfigLock};
pub use manager::{list_profiles, KdkEnv, KeypairOutcome, Settings, WriteOutcome};
pub use paths::KdkPaths;
pub use prompt::{
    confirm, MountList, MountRequest, MountSource, PromptMountSource, Prompter, TerminalPrompter,
    Validator,
};
pub use ssh::{ssh_connect_args, KeyGenerator, KeyPair, SshKeygen};
pub use util::find_free_port;

/// Version string recorded in container labels and printed by `--version`/doctor.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build metadata baked in by build.rs.
pub fn build_info() -> String {
    format!(
        "{} ({}, {}, rev {})",
        env!("CARGO_PKG_VERSION"),
        env!("KDK_BUILD_TARGET"),
        env!("KDK_BUILD_DATE"),
        env!("KDK_BUILD_REV")
    )
}
