use std::process::Command;

use kdk::Settings;

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

pub fn run_doctor(settings: &Settings, name: &str) {
    let use_err = kdk::color_enabled_stderr();
    let hi = |s: &str| kdk::paint(use_err, "\x1b[34;1m", s);

    eprintln!("kdk doctor");
    eprintln!();
    eprintln!("  version: v{}", kdk::build_info());
    eprintln!(
        "  host:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    eprintln!("  user:    {}", settings.username);
    eprintln!();

    match kdk::container_runtime_path() {
        Ok(p) => {
            eprintln!("  docker: {}", hi(&p.display().to_string()));
            if let Ok(out) = Command::new(&p).arg("--version").output() {
                let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if !s.is_empty() {
                    eprintln!("  docker --version: {}", s);
                }
            }
        }
        Err(e) => eprintln!("  docker: not found ({e})"),
    }
    let keygen = which::which("ssh-keygen").ok();
    eprintln!(
        "  ssh-keygen: {}",
        keygen
            .map(|p| hi(&p.display().to_string()))
            .unwrap_or_else(|| "(not found)".to_string())
    );
    eprintln!();

    let paths = &settings.paths;
    eprintln!("  config root: {}", paths.config_root_dir().display());
    eprintln!(
        "  ssh keypair: {} ({})",
        paths.private_key_path().display(),
        if paths.private_key_path().is_file() {
            "present"
        } else {
            "missing"
        }
    );
    let profile = paths.config_path(name);
    eprintln!(
        "  profile '{}': {} (exists: {})",
        name,
        profile.display(),
        yes_no(profile.is_file())
    );
    match kdk::load_config(&profile) {
        Ok(cfg) => {
            eprintln!("    image: {}", cfg.app_config.image_coordinates());
            eprintln!("    port:  {}", cfg.app_config.port);
            if let Some(hc) = &cfg.host_config {
                for m in &hc.mounts {
                    eprintln!(
                        "    mount: {} -> {}{}",
                        m.source,
                        m.target,
                        if m.read_only { " (ro)" } else { "" }
                    );
                }
            }
        }
        Err(e) if profile.is_file() => {
            kdk::log_warn_stderr(use_err, &format!("    unreadable profile: {e}"))
        }
        Err(_) => {}
    }
    match kdk::list_profiles(paths) {
        Ok(all) if !all.is_empty() => eprintln!("  profiles: {}", all.join(", ")),
        Ok(_) => eprintln!("  profiles: (none)"),
        Err(e) => eprintln!("  profiles: unreadable ({e})"),
    }
    eprintln!();
    eprintln!("doctor: completed diagnostics.");
}
