use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_GRACE_PERIOD;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "ro",
            MountMode::ReadWrite => "rw",
        }
    }
}

/// A host path bound into the container. `host_path` is always absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub mode: MountMode,
}

impl Mount {
    /// Render as a `-v` value understood by the docker CLI.
    pub fn volume_arg(&self) -> String {
        format!("{}:{}:{}", self.host_path.display(), self.container_path, self.mode.as_str())
    }
}

type ActionFn = dyn Fn(&str) -> io::Result<()> + Send + Sync;

/// Host-side side effect fired when a trigger pattern appears in the child's output.
#[derive(Clone)]
pub struct TriggerAction {
    name: &'static str,
    run: Arc<ActionFn>,
}

impl TriggerAction {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&str) -> io::Result<()> + Send + Sync + 'static,
    {
        Self { name, run: Arc::new(run) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, line: &str) -> io::Result<()> {
        (self.run)(line)
    }
}

impl fmt::Debug for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TriggerAction").field(&self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub pattern: String,
    pub action: TriggerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptPolicy {
    pub forward_signals: bool,
    pub grace_period: Duration,
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self { forward_signals: false, grace_period: DEFAULT_GRACE_PERIOD }
    }
}

/// Mutable description of one container invocation, built up by [`RunOption`]s.
///
/// [`RunOption`]: super::options::RunOption
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    pub image: String,
    pub name: Option<String>,
    pub pull_latest: bool,
    pub attach_output: bool,
    pub mounts: Vec<Mount>,
    pub environment: BTreeMap<String, String>,
    pub args: Vec<String>,
    pub triggers: Vec<Trigger>,
    pub interrupt: InterruptPolicy,
}

impl RunSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to the read-only form handed to the launch engine.
    pub fn freeze(self) -> Result<FrozenRunSpec, AppError> {
        if self.image.trim().is_empty() {
            return Err(AppError::launch("no container image configured"));
        }
        Ok(FrozenRunSpec(Arc::new(self)))
    }
}

/// A run specification that can no longer change. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct FrozenRunSpec(Arc<RunSpec>);

impl FrozenRunSpec {
    pub fn triggers(&self) -> Arc<[Trigger]> {
        self.0.triggers.clone().into()
    }
}

impl Deref for FrozenRunSpec {
    type Target = RunSpec;

    fn deref(&self) -> &RunSpec {
        &self.0
    }
}
