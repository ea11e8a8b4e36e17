use clap::{Parser, Subcommand};

fn parse_mount(s: &str) -> Result<kdk::MountRequest, String> {
    kdk::MountRequest::parse(s)
}

#[derive(Parser, Debug)]
#[command(
    name = "kdk",
    version,
    about = "Provision and manage a personal containerized development environment (KDK box)."
)]
pub(crate) struct Cli {
    /// Profile name (also the container name and hostname). Defaults to KDK_NAME or "kdk"
    #[arg(long, global = true)]
    pub(crate) name: Option<String>,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<kdk::ColorMode>,

    /// Verbose logging (debug level unless KDK_LOG/RUST_LOG say otherwise)
    #[arg(long, global = true)]
    pub(crate) debug: bool,

    #[command(subcommand)]
    pub(crate) command: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Cmd {
    /// Generate the SSH keypair (if missing) and write the profile configuration
    Init {
        /// Host port published for the container's SSH daemon (default: a free port)
        #[arg(long)]
        port: Option<u16>,
        /// Image repository, e.g. ciscosso/kdk
        #[arg(long = "image-repository")]
        image_repository: Option<String>,
        /// Image tag, e.g. debian-latest
        #[arg(long = "image-tag")]
        image_tag: Option<String>,
        /// Dotfiles repository cloned inside the container
        #[arg(long = "dotfiles-repo")]
        dotfiles_repo: Option<String>,
        /// Login shell inside the container
        #[arg(long)]
        shell: Option<String>,
        /// Additional bind mount SOURCE:TARGET (repeatable); skips the mount prompts
        #[arg(long = "mount", value_parser = parse_mount)]
        mounts: Vec<kdk::MountRequest>,
        /// Never prompt; use --mount for mounts and --force to replace an existing profile
        #[arg(long = "no-prompt")]
        no_prompt: bool,
        /// Overwrite an existing profile without asking
        #[arg(long)]
        force: bool,
        /// Do not look for a keybase mount
        #[arg(long = "no-keybase")]
        no_keybase: bool,
    },

    /// Generate the shared SSH keypair if it does not exist
    Keypair,

    /// Create (or start) the container from the saved profile
    Up {
        /// Pull the image before creating the container
        #[arg(long)]
        pull: bool,
        /// Print the docker commands without running them
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// Stop and remove the profile's container
    Down {
        /// Print the docker command without running it
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// Open an SSH session into the running container
    Ssh {
        /// Print the ssh command without running it
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// List saved profiles
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the saved profile YAML
    Show,

    /// Print the profile configuration file path
    Path,

    /// Run diagnostics to check environment and configuration
    Doctor,
}
