#![allow(clippy::module_name_repetitions)]
//! Docker runtime discovery and container lifecycle built from a saved profile.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use which::which;

use crate::config::{ConfigFile, Mount, MountType};
use crate::errors::KdkError;
use crate::util::exec::{run_attached, ExecRequest, ExecService};
use crate::util::shell_join;

pub fn container_runtime_path() -> io::Result<PathBuf> {
    // Allow tests or callers to explicitly disable Docker detection
    if env::var("KDK_SKIP_DOCKER").ok().as_deref() == Some("1") {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Docker disabled by environment override.",
        ));
    }
    if let Ok(p) = which("docker") {
        return Ok(p);
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "Docker is required but was not found in PATH.",
    ))
}

/// `--mount` value for one mount entry (CSV fields quoted when they contain commas).
pub fn mount_flag_value(m: &Mount) -> String {
    let field = |k: &str, v: &str| {
        let kv = format!("{k}={v}");
        if kv.contains(',') || kv.contains('"') {
            format!("\"{}\"", kv.replace('"', "\"\""))
        } else {
            kv
        }
    };
    let mut parts = vec![field("type", m.kind.as_str())];
    if !m.source.is_empty() && m.kind != MountType::Tmpfs {
        parts.push(field("source", &m.source));
    }
    parts.push(field("target", &m.target));
    if m.read_only {
        parts.push("readonly".to_string());
    }
    parts.join(",")
}

/// Arguments for `docker create` reproducing the saved container and host configs.
pub fn build_create_args(cfg: &ConfigFile) -> Result<Vec<String>, KdkError> {
    let (Some(cc), Some(hc)) = (&cfg.container_config, &cfg.host_config) else {
        return Err(KdkError::Message(format!(
            "profile '{}' has no container/host configuration; re-run `kdk init`",
            cfg.app_config.name
        )));
    };
    let name = &cfg.app_config.name;
    let mut args: Vec<String> = vec!["create".into(), "--name".into(), name.clone()];
    if !cc.hostname.is_empty() {
        args.push("--hostname".into());
        args.push(cc.hostname.clone());
    }
    if cc.tty {
        args.push("-t".into());
    }
    if hc.privileged {
        args.push("--privileged".into());
    }
    for e in &cc.env {
        args.push("-e".into());
        args.push(e.clone());
    }
    for (k, v) in &cc.labels {
        args.push("--label".into());
        args.push(format!("{k}={v}"));
    }
    for (port, bindings) in &hc.port_bindings {
        for b in bindings {
            args.push("-p".into());
            if b.host_ip.is_empty() {
                args.push(format!("{}:{port}", b.host_port));
            } else {
                args.push(format!("{}:{}:{port}", b.host_ip, b.host_port));
            }
        }
    }
    for port in cc.exposed_ports.keys() {
        if !hc.port_bindings.contains_key(port) {
            args.push("--expose".into());
            args.push(port.clone());
        }
    }
    for m in &hc.mounts {
        args.push("--mount".into());
        args.push(mount_flag_value(m));
    }
    // Declared volumes without a mount become anonymous volumes, as the Engine API does.
    for target in cc.volumes.keys() {
        if !hc.mounts.iter().any(|m| &m.target == target) {
            args.push("-v".into());
            args.push(target.clone());
        }
    }
    args.push(cc.image.clone());
    Ok(args)
}

/// What `up`/`down` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    Created,
    Started,
    Removed,
    Absent,
    Previewed(Vec<String>),
}

/// Bound on `docker container inspect`; lifecycle commands wait as long as docker needs.
pub const INSPECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin client over the docker CLI.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    docker: PathBuf,
    // create/start/rm: `docker create` may pull a multi-GB image first
    exec: ExecService,
    inspect: ExecService,
}

impl RuntimeClient {
    pub fn connect() -> Result<Self, KdkError> {
        let docker = container_runtime_path().map_err(KdkError::Runtime)?;
        Ok(Self::with_path(docker))
    }

    pub fn with_path(docker: impl Into<PathBuf>) -> Self {
        RuntimeClient {
            docker: docker.into(),
            exec: ExecService::new(Duration::ZERO),
            inspect: ExecService::new(INSPECT_TIMEOUT),
        }
    }

    pub fn with_inspect_timeout(mut self, timeout: Duration) -> Self {
        self.inspect = ExecService::new(timeout);
        self
    }

    pub fn path(&self) -> &Path {
        &self.docker
    }

    /// Shell-quoted command line for previews.
    pub fn preview(&self, args: &[String]) -> String {
        let mut words = vec![self.docker.display().to_string()];
        words.extend(args.iter().cloned());
        shell_join(&words)
    }

    fn docker(&self, args: &[String], what: &str) -> Result<String, KdkError> {
        self.exec
            .run(ExecRequest::new(&self.docker).args(args))
            .and_then(|out| out.check(what))
            .map(|out| out.stdout)
            .map_err(|e| KdkError::Runtime(io::Error::other(format!("{e:#}"))))
    }

    pub fn container_exists(&self, name: &str) -> bool {
        self.inspect
            .run(ExecRequest::new(&self.docker).args(["container", "inspect", "--format", "{{.Id}}", name]))
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Recreate the container from the profile (or start the existing one).
    pub fn up(&self, cfg: &ConfigFile, dry_run: bool) -> Result<Vec<LifecycleAction>, KdkError> {
        let name = &cfg.app_config.name;
        let start = vec!["start".to_string(), name.clone()];
        if self.container_exists(name) {
            if dry_run {
                return Ok(vec![LifecycleAction::Previewed(start)]);
            }
            tracing::info!(name = %name, "starting existing KDK container");
            self.docker(&start, "docker start")?;
            return Ok(vec![LifecycleAction::Started]);
        }
        let create = build_create_args(cfg)?;
        if dry_run {
            return Ok(vec![
                LifecycleAction::Previewed(create),
                LifecycleAction::Previewed(start),
            ]);
        }
        tracing::info!(name = %name, image = %cfg.app_config.image_coordinates(), "creating KDK container");
        self.docker(&create, "docker create")?;
        self.docker(&start, "docker start")?;
        Ok(vec![LifecycleAction::Created, LifecycleAction::Started])
    }

    /// Stop and remove the profile's container.
    pub fn down(&self, name: &str, dry_run: bool) -> Result<LifecycleAction, KdkError> {
        let rm = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
        if dry_run {
            return Ok(LifecycleAction::Previewed(rm));
        }
        if !self.container_exists(name) {
            tracing::info!(name = %name, "no KDK container to remove");
            return Ok(LifecycleAction::Absent);
        }
        tracing::info!(name = %name, "removing KDK container");
        self.docker(&rm, "docker rm")?;
        Ok(LifecycleAction::Removed)
    }

    /// Pull the profile's image with progress attached to the terminal.
    pub fn pull(&self, image: &str) -> Result<(), KdkError> {
        let args = [OsString::from("pull"), OsString::from(image)];
        let status = run_attached(&self.docker, &args).map_err(KdkError::Runtime)?;
        if status.success() {
            Ok(())
        } else {
            Err(KdkError::Runtime(io::Error::other(format!(
                "docker pull {image} failed ({status})"
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ContainerConfig, Empty, HostConfig, PortBinding};
    use std::collections::BTreeMap;

    fn profile() -> ConfigFile {
        let mut cf = ConfigFile::new(AppConfig {
            name: "kdk".into(),
            port: "2222".into(),
            image_repository: "ciscosso/kdk".into(),
            image_tag: "debian-latest".into(),
            dotfiles_repo: "https://example.com/d.git".into(),
            shell: "/bin/bash".into(),
            debug: false,
        });
        let mut volumes = BTreeMap::new();
        volumes.insert("/tmp/id_rsa.pub".to_string(), Empty {});
        volumes.insert("/data".to_string(), Empty {});
        let mut exposed = BTreeMap::new();
        exposed.insert("2022/tcp".to_string(), Empty {});
        cf.container_config = Some(ContainerConfig {
            hostname: "kdk".into(),
            image: "ciscosso/kdk:debian-latest".into(),
            tty: true,
            env: vec!["KDK_USERNAME=alice".into()],
            exposed_ports: exposed,
            volumes,
            labels: [("kdk".to_string(), "1.0".to_string())].into_iter().collect(),
        });
        let mut pb = BTreeMap::new();
        pb.insert(
            "2022/tcp".to_string(),
            vec![PortBinding {
                host_ip: String::new(),
                host_port: "2222".into(),
            }],
        );
        cf.host_config = Some(HostConfig {
            privileged: true,
            port_bindings: pb,
            mounts: vec![Mount::bind("/h/.kdk/ssh/id_rsa.pub", "/tmp/id_rsa.pub", true)],
        });
        cf
    }

    #[test]
    fn test_create_args_reproduce_profile() {
        let args = build_create_args(&profile()).unwrap();
        let joined = shell_join(&args);
        assert!(joined.starts_with("create --name kdk --hostname kdk -t --privileged"), "{joined}");
        assert!(joined.contains("-e KDK_USERNAME=alice"), "{joined}");
        assert!(joined.contains("--label kdk=1.0"), "{joined}");
        assert!(joined.contains("-p 2222:2022/tcp"), "{joined}");
        assert!(!joined.contains("--expose"), "{joined}");
        assert!(
            joined.contains("--mount type=bind,source=/h/.kdk/ssh/id_rsa.pub,target=/tmp/id_rsa.pub,readonly"),
            "{joined}"
        );
        assert!(joined.contains("-v /data"), "{joined}");
        assert!(!joined.contains("-v /tmp/id_rsa.pub"), "{joined}");
        assert_eq!(args.last().map(String::as_str), Some("ciscosso/kdk:debian-latest"));
    }

    #[test]
    fn test_create_args_require_container_config() {
        let mut cf = profile();
        cf.container_config = None;
        assert!(build_create_args(&cf).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_up_waits_for_slow_create() {
        use std::os::unix::fs::PermissionsExt;
        let td = tempfile::tempdir().expect("tmpdir");
        let docker = td.path().join("docker");
        let log = td.path().join("calls");
        let script = format!(
            "#!/bin/sh\necho \"$1\" >> '{}'\ncase \"$1\" in\n  container) exit 1 ;;\n  create) sleep 2 ;;\nesac\nexit 0\n",
            log.display()
        );
        std::fs::write(&docker, script).unwrap();
        std::fs::set_permissions(&docker, std::fs::Permissions::from_mode(0o755)).unwrap();

        // a create slower than the inspect bound must still complete
        let client = RuntimeClient::with_path(&docker).with_inspect_timeout(Duration::from_millis(500));
        let actions = client.up(&profile(), false).unwrap();
        assert_eq!(actions, vec![LifecycleAction::Created, LifecycleAction::Started]);
        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["container", "create", "start"]);
    }

    #[test]
    fn test_hand_edited_mount_types_pass_through() {
        let yaml = "Type: tmpfs\nTarget: /scratch\n";
        let m: Mount = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(m.kind, MountType::Tmpfs);
        assert_eq!(mount_flag_value(&m), "type=tmpfs,target=/scratch");
        let v = Mount {
            kind: MountType::Volume,
            source: "cache".into(),
            target: "/cache".into(),
            read_only: false,
        };
        assert_eq!(mount_flag_value(&v), "type=volume,source=cache,target=/cache");
    }

    #[test]
    fn test_mount_flag_value_quotes_commas() {
        let m = Mount::bind("/a,b", "/c", false);
        assert_eq!(mount_flag_value(&m), "type=bind,\"source=/a,b\",target=/c");
    }
}
