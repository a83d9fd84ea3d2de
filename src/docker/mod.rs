//! Container execution: building a run specification, launching it and supervising
//! the child until it exits.

pub mod engine;
pub mod interrupt;
pub mod monitor;
pub mod options;
pub mod runtime;
pub mod spec;

pub use engine::{ExecutionResult, LaunchEngine};
pub use interrupt::{InterruptCoordinator, InterruptHandle, InterruptOutcome, InterruptState};
pub use monitor::OutputMonitor;
pub use options::RunOption;
pub use runtime::{ContainerRuntime, DockerCli};
pub use spec::{FrozenRunSpec, InterruptPolicy, Mount, MountMode, RunSpec, Trigger, TriggerAction};
