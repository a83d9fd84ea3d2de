use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::docker::spec::{FrozenRunSpec, RunSpec};
use crate::error::AppError;

/// Exit status `docker run` uses for its own failures (daemon errors, missing image).
const DOCKER_RUN_FAILURE: i32 = 125;

/// Boundary to whatever actually starts the container.
pub trait ContainerRuntime: Send + Sync {
    /// Check that the runtime can start containers at all.
    fn ensure_ready(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Start the child for `spec`. Piped stdout/stderr are expected when
    /// `spec.attach_output` is set.
    fn spawn(&self, spec: &FrozenRunSpec) -> io::Result<Child>;

    /// Whether an exit status came from the runtime failing to start the container
    /// rather than from the scanning engine.
    fn is_launch_failure(&self, _code: i32) -> bool {
        false
    }

    /// Remove whatever the runtime left behind after the child was killed.
    fn reap(&self, _spec: &FrozenRunSpec) {}
}

/// Runs containers through the `docker` command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: OsString,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self { program: program.into() }
    }

    fn locate(&self) -> Result<PathBuf, AppError> {
        which::which(&self.program).map_err(|err| {
            AppError::launch(format!("docker CLI not found ({err}); install Docker and retry"))
        })
    }
}

impl ContainerRuntime for DockerCli {
    fn ensure_ready(&self) -> Result<(), AppError> {
        let binary = self.locate()?;
        let output = StdCommand::new(&binary)
            .args(["info", "--format", "{{.ServerVersion}}"])
            .stdin(Stdio::null())
            .output()?;
        if output.status.success() {
            debug!(server = %String::from_utf8_lossy(&output.stdout).trim(), "docker daemon reachable");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let mut message = "docker daemon is not reachable".to_string();
        if !stderr.is_empty() {
            message = format!("{message}: {stderr}");
        }
        Err(AppError::launch(format!("{message}\nHint: make sure Docker is running.")))
    }

    fn spawn(&self, spec: &FrozenRunSpec) -> io::Result<Child> {
        let args = docker_run_args(spec);
        debug!(command = %render_command(&args), "starting scan container");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);
        if spec.attach_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        #[cfg(unix)]
        command.process_group(0);
        command.spawn()
    }

    fn is_launch_failure(&self, code: i32) -> bool {
        code == DOCKER_RUN_FAILURE
    }

    fn reap(&self, spec: &FrozenRunSpec) {
        let Some(name) = spec.name.as_deref() else {
            return;
        };
        let result = StdCommand::new(&self.program)
            .args(["rm", "-f", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) if status.success() => debug!(container = name, "removed killed container"),
            Ok(status) => warn!(container = name, %status, "failed to remove killed container"),
            Err(err) => warn!(container = name, error = %err, "failed to remove killed container"),
        }
    }
}

/// Arguments for `docker run`: runtime flags, mounts and environment, the image,
/// then the entrypoint arguments in their original order.
pub fn docker_run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];
    if let Some(name) = &spec.name {
        args.push("--name".to_string());
        args.push(name.clone());
    }
    args.push(if spec.pull_latest { "--pull=always" } else { "--pull=missing" }.to_string());
    for mount in &spec.mounts {
        args.push("-v".to_string());
        args.push(mount.volume_arg());
    }
    for (key, value) in &spec.environment {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args.extend(spec.args.iter().cloned());
    args
}

fn render_command(args: &[String]) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|arg| if arg.contains(' ') { format!("'{arg}'") } else { arg.clone() })
        .collect();
    format!("docker {}", rendered.join(" "))
}
