//! Composable mutations of a [`RunSpec`].
//!
//! Each option applies one mutation class: singular fields are replaced, collections
//! are appended to. Callers order the options to get the argument order they need.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{ContainerPaths, PackageCache};
use crate::docker::monitor::open_browser_action;
use crate::docker::spec::{InterruptPolicy, Mount, MountMode, RunSpec, Trigger, TriggerAction};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub enum RunOption {
    Image(String),
    PullLatest(bool),
    AttachOutput(bool),
    Name(String),
    Interrupt(InterruptPolicy),
    Args(Vec<String>),
    Mount { host_path: PathBuf, container_path: String, mode: MountMode },
    Env(Vec<(String, String)>),
    Triggers(Vec<Trigger>),
}

impl RunOption {
    pub fn apply(self, spec: &mut RunSpec) -> Result<(), AppError> {
        match self {
            RunOption::Image(image) => spec.image = image,
            RunOption::PullLatest(pull) => spec.pull_latest = pull,
            RunOption::AttachOutput(attach) => spec.attach_output = attach,
            RunOption::Name(name) => spec.name = Some(name),
            RunOption::Interrupt(policy) => spec.interrupt = policy,
            RunOption::Args(args) => spec.args.extend(args),
            RunOption::Mount { host_path, container_path, mode } => {
                let host_path = resolve_mount_source(&host_path)?;
                spec.mounts.push(Mount { host_path, container_path, mode });
            }
            RunOption::Env(pairs) => spec.environment.extend(pairs),
            RunOption::Triggers(triggers) => spec.triggers.extend(triggers),
        }
        Ok(())
    }
}

impl RunSpec {
    /// Apply options in order, stopping at the first failure.
    pub fn apply<I>(&mut self, options: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = RunOption>,
    {
        for option in options {
            option.apply(self)?;
        }
        Ok(())
    }

    pub fn from_options<I>(options: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = RunOption>,
    {
        let mut spec = RunSpec::new();
        spec.apply(options)?;
        Ok(spec)
    }
}

fn resolve_mount_source(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::InvalidMount {
            path: path.to_path_buf(),
            reason: "path does not exist".to_string(),
        });
    }
    let resolved = fs::canonicalize(path)
        .map_err(|err| AppError::InvalidMount { path: path.to_path_buf(), reason: err.to_string() })?;
    if !resolved.is_absolute() {
        return Err(AppError::InvalidMount {
            path: path.to_path_buf(),
            reason: "path is not absolute".to_string(),
        });
    }
    Ok(resolved)
}

fn flag(enabled: bool, value: &str) -> Vec<RunOption> {
    if enabled { vec![RunOption::Args(vec![value.to_string()])] } else { Vec::new() }
}

pub fn with_image(image: impl Into<String>) -> RunOption {
    RunOption::Image(image.into())
}

pub fn with_latest_image(pull: bool) -> RunOption {
    RunOption::PullLatest(pull)
}

pub fn with_attached_output() -> RunOption {
    RunOption::AttachOutput(true)
}

pub fn with_container_name(name: impl Into<String>) -> RunOption {
    RunOption::Name(name.into())
}

pub fn with_args<I, S>(args: I) -> RunOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RunOption::Args(args.into_iter().map(Into::into).collect())
}

pub fn with_mount(host_path: impl Into<PathBuf>, container_path: impl Into<String>, mode: MountMode) -> RunOption {
    RunOption::Mount { host_path: host_path.into(), container_path: container_path.into(), mode }
}

pub fn with_source_volume(host_path: impl Into<PathBuf>, paths: &ContainerPaths) -> RunOption {
    with_mount(host_path, paths.source_code_dir.clone(), MountMode::ReadWrite)
}

pub fn with_user_config_volume(host_path: impl Into<PathBuf>, paths: &ContainerPaths) -> RunOption {
    with_mount(host_path, paths.user_config_file.clone(), MountMode::ReadOnly)
}

pub fn with_user_key_volume(host_path: impl Into<PathBuf>, paths: &ContainerPaths) -> RunOption {
    with_mount(host_path, paths.user_key_file.clone(), MountMode::ReadOnly)
}

pub fn with_package_cache_volumes(caches: &[PackageCache]) -> Vec<RunOption> {
    caches
        .iter()
        .map(|cache| with_mount(cache.host_dir.clone(), cache.container_dir.clone(), MountMode::ReadWrite))
        .collect()
}

/// Mount the operator's rules directory and point the engine at it. `None` adds nothing.
pub fn with_external_rules_volume(host_path: Option<&Path>, paths: &ContainerPaths) -> Vec<RunOption> {
    match host_path {
        Some(path) => vec![
            with_mount(path, paths.external_rules_dir.clone(), MountMode::ReadOnly),
            with_args(["-ec", paths.external_rules_dir.as_str()]),
        ],
        None => Vec::new(),
    }
}

pub fn with_ignore_default_rules(enabled: bool) -> Vec<RunOption> {
    flag(enabled, "-i")
}

pub fn with_skip_dependency_download(enabled: bool) -> Vec<RunOption> {
    flag(enabled, "--skip-downloading-dependencies")
}

pub fn with_disabled_deduplication(enabled: bool) -> Vec<RunOption> {
    flag(enabled, "--disable-deduplication")
}

pub fn with_debug(enabled: bool) -> Vec<RunOption> {
    flag(enabled, "--debug")
}

pub fn with_environment<I, K, V>(pairs: I) -> RunOption
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    RunOption::Env(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
}

pub fn with_triggers(triggers: Vec<Trigger>) -> RunOption {
    RunOption::Triggers(triggers)
}

pub fn with_trigger(pattern: impl Into<String>, action: TriggerAction) -> RunOption {
    RunOption::Triggers(vec![Trigger { pattern: pattern.into(), action }])
}

/// Open the first URL on any line containing one of `patterns`.
pub fn with_browser_triggers<I, S>(patterns: I) -> RunOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let action = open_browser_action();
    with_triggers(
        patterns
            .into_iter()
            .map(|pattern| Trigger { pattern: pattern.into(), action: action.clone() })
            .collect(),
    )
}

pub fn with_interrupt(grace_period: Duration) -> RunOption {
    RunOption::Interrupt(InterruptPolicy { forward_signals: true, grace_period })
}
