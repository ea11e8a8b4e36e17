use clap::Parser;
use std::env;
use std::process::ExitCode;

use kdk::{
    AppConfig, KdkEnv, KdkError, KeybaseResolver, KeypairOutcome, MountList, MountResolver,
    NoMount, PromptMountSource, Settings, SshKeygen, TerminalPrompter, WriteOutcome,
};

mod cli;
mod doctor;

use cli::{Cli, Cmd};

fn report(e: &KdkError) -> ExitCode {
    let use_err = kdk::color_enabled_stderr();
    kdk::log_error_stderr(use_err, &format!("kdk: {e}"));
    ExitCode::from(kdk::exit_code_for_kdk_error(e))
}

/// Profile fields: defaults, then KDK_* environment, then flags.
fn app_config_from_env(name: Option<&str>) -> Result<AppConfig, KdkError> {
    let port = kdk::find_free_port().map_err(|e| KdkError::io("127.0.0.1:0", e))?;
    let mut app = AppConfig::from_lookup(|k| env::var(k).ok(), port);
    if let Some(n) = name {
        app.name = n.to_string();
    }
    Ok(app)
}

fn profile_name(cli: &Cli) -> String {
    cli.name
        .clone()
        .or_else(|| env::var("KDK_NAME").ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| kdk::config::DEFAULT_NAME.to_string())
}

fn keygen_comment(settings: &Settings) -> String {
    format!("{}@kdk", settings.username)
}

fn run_init(cli: &Cli, settings: Settings) -> Result<(), KdkError> {
    let Cmd::Init {
        port,
        image_repository,
        image_tag,
        dotfiles_repo,
        shell,
        mounts,
        no_prompt,
        force,
        no_keybase,
    } = &cli.command
    else {
        return Err(KdkError::Message("init: unexpected command".to_string()));
    };

    let mut app = app_config_from_env(Some(&profile_name(cli)))?;
    if let Some(p) = port {
        app.port = p.to_string();
    }
    for (field, value) in [
        (&mut app.image_repository, image_repository),
        (&mut app.image_tag, image_tag),
        (&mut app.dotfiles_repo, dotfiles_repo),
        (&mut app.shell, shell),
    ] {
        if let Some(v) = value {
            *field = v.clone();
        }
    }
    app.debug = app.debug || cli.debug;
    app.validate()?;

    for m in mounts {
        if !m.source_exists() {
            return Err(KdkError::Message(format!(
                "mount source directory does not exist: {}",
                m.source.display()
            )));
        }
    }

    let _lock = kdk::acquire_lock(&settings.paths.lock_path())
        .map_err(|e| KdkError::io(settings.paths.lock_path(), e))?;

    let generator = SshKeygen::locate(keygen_comment(&settings))?;
    let mut env = KdkEnv::new(settings, app);
    match env.create_kdk_ssh_keypair(&generator)? {
        KeypairOutcome::Generated => {
            eprintln!("kdk: generated ssh keypair {}", env.private_key_path().display())
        }
        KeypairOutcome::Exists => {}
    }

    let keybase: Box<dyn MountResolver> = if *no_keybase {
        Box::new(NoMount)
    } else {
        Box::new(KeybaseResolver::default())
    };

    let interactive = !*no_prompt && atty::is(atty::Stream::Stdin);
    let mut prompter = TerminalPrompter::stdio();
    let outcome = if interactive && mounts.is_empty() && !*force {
        env.create_kdk_config(&mut prompter, keybase.as_ref())?
    } else {
        if interactive && mounts.is_empty() {
            env.assemble(keybase.as_ref(), &mut PromptMountSource::new(&mut prompter))?;
        } else {
            env.assemble(keybase.as_ref(), &mut MountList::new(mounts.iter().cloned()))?;
        }
        if *force || !interactive {
            env.persist(|| Ok(*force))?
        } else {
            env.persist(|| kdk::confirm(&mut prompter, kdk::manager::OVERWRITE_TEXT))?
        }
    };

    let use_err = kdk::color_enabled_stderr();
    match outcome {
        WriteOutcome::Created | WriteOutcome::Overwritten => kdk::log_info_stderr(
            use_err,
            &format!("kdk: wrote {}", env.config_path().display()),
        ),
        WriteOutcome::Skipped => kdk::log_warn_stderr(
            use_err,
            &format!(
                "kdk: kept existing {} (use --force to replace)",
                env.config_path().display()
            ),
        ),
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), KdkError> {
    let settings = Settings::detect(kdk::version())?;
    let name = profile_name(cli);
    kdk::config::validate_name(&name)?;

    match &cli.command {
        Cmd::Init { .. } => run_init(cli, settings),
        Cmd::Keypair => {
            let _lock = kdk::acquire_lock(&settings.paths.lock_path())
                .map_err(|e| KdkError::io(settings.paths.lock_path(), e))?;
            let generator = SshKeygen::locate(keygen_comment(&settings))?;
            let env = KdkEnv::new(settings, app_config_from_env(Some(&name))?);
            match env.create_kdk_ssh_keypair(&generator)? {
                KeypairOutcome::Generated => println!("{}", env.public_key_path().display()),
                KeypairOutcome::Exists => eprintln!(
                    "kdk: ssh keypair already exists at {}",
                    env.keypair_dir().display()
                ),
            }
            Ok(())
        }
        Cmd::Up { pull, dry_run } => {
            let mut env = KdkEnv::load(settings, &name)?;
            let image = env.image_coordinates();
            let cfg = env.config_file.clone();
            let runtime = env.init()?;
            if *pull {
                if *dry_run {
                    println!("{}", runtime.preview(&["pull".to_string(), image]));
                } else {
                    runtime.pull(&image)?;
                }
            }
            for action in runtime.up(&cfg, *dry_run)? {
                match action {
                    kdk::LifecycleAction::Previewed(args) => println!("{}", runtime.preview(&args)),
                    other => tracing::debug!(action = ?other, "up"),
                }
            }
            if !*dry_run {
                eprintln!(
                    "kdk: '{}' is up; connect with `kdk --name {} ssh`",
                    name, name
                );
            }
            Ok(())
        }
        Cmd::Down { dry_run } => {
            let mut env = KdkEnv::new(settings, app_config_from_env(Some(&name))?);
            let runtime = env.init()?;
            match runtime.down(&name, *dry_run)? {
                kdk::LifecycleAction::Previewed(args) => println!("{}", runtime.preview(&args)),
                kdk::LifecycleAction::Absent => eprintln!("kdk: no container named '{name}'"),
                _ => {}
            }
            Ok(())
        }
        Cmd::Ssh { dry_run } => {
            let env = KdkEnv::load(settings, &name)?;
            let args = kdk::ssh_connect_args(
                &env.private_key_path(),
                &env.app().port,
                env.user(),
            );
            if *dry_run {
                let mut words = vec!["ssh".to_string()];
                words.extend(args);
                println!("{}", kdk::util::shell_join(&words));
                return Ok(());
            }
            let ssh = which::which("ssh").map_err(|_| {
                KdkError::Runtime(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "ssh is required but was not found in PATH.",
                ))
            })?;
            let os_args: Vec<std::ffi::OsString> = args.into_iter().map(Into::into).collect();
            let status = kdk::util::exec::run_attached(ssh, &os_args).map_err(KdkError::Runtime)?;
            if status.success() {
                Ok(())
            } else {
                Err(KdkError::Message(format!("ssh exited with {status}")))
            }
        }
        Cmd::List { json } => {
            let names = kdk::list_profiles(&settings.paths)
                .map_err(|e| KdkError::io(settings.paths.config_root_dir(), e))?;
            if *json {
                let out = serde_json::to_string_pretty(&names)
                    .map_err(|e| KdkError::Message(e.to_string()))?;
                println!("{out}");
            } else {
                for n in names {
                    println!("{n}");
                }
            }
            Ok(())
        }
        Cmd::Show => {
            let env = KdkEnv::load(settings, &name)?;
            print!("{}", env.config_file.to_yaml()?);
            Ok(())
        }
        Cmd::Path => {
            println!("{}", settings.paths.config_path(&name).display());
            Ok(())
        }
        Cmd::Doctor => {
            doctor::run_doctor(&settings, &name);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        kdk::set_color_mode(mode);
    }
    let debug_env = env::var("KDK_DEBUG")
        .map(|v| matches!(v.trim(), "1" | "true"))
        .unwrap_or(false);
    kdk::logging::init(cli.debug || debug_env);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}
