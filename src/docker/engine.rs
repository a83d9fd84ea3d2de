use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::docker::interrupt::{InterruptCoordinator, InterruptHandle, InterruptOutcome, Supervision};
use crate::docker::monitor::OutputMonitor;
use crate::docker::runtime::ContainerRuntime;
use crate::docker::spec::FrozenRunSpec;
use crate::error::AppError;

/// How long to keep draining output after an interrupted child has been stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Terminal outcome of one supervised execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Succeeded,
    Exited(i32),
    Interrupted(InterruptOutcome),
}

impl ExecutionResult {
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            ExecutionResult::Succeeded => Ok(()),
            ExecutionResult::Exited(code) => Err(AppError::ChildExecution { code }),
            ExecutionResult::Interrupted(outcome) => {
                Err(AppError::Interrupted { forced: outcome == InterruptOutcome::ForceKilled })
            }
        }
    }
}

/// Starts and supervises one container at a time.
pub struct LaunchEngine {
    runtime: Arc<dyn ContainerRuntime>,
    active: AtomicBool,
}

struct ActiveGuard<'a>(&'a AtomicBool);

impl<'a> ActiveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, AppError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LaunchEngine {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime, active: AtomicBool::new(false) }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run `spec` with its output forwarded to this process's stdout and stderr.
    pub async fn launch(&self, spec: FrozenRunSpec, interrupt: InterruptHandle) -> Result<ExecutionResult, AppError> {
        self.launch_with_output(spec, interrupt, tokio::io::stdout(), tokio::io::stderr()).await
    }

    pub async fn launch_with_output<O, E>(
        &self,
        spec: FrozenRunSpec,
        interrupt: InterruptHandle,
        stdout: O,
        stderr: E,
    ) -> Result<ExecutionResult, AppError>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let _guard = ActiveGuard::acquire(&self.active)?;

        if interrupt.is_requested() {
            info!("cancellation requested before launch, not starting the scan container");
            return Err(AppError::Interrupted { forced: false });
        }

        self.ensure_ready().await?;
        if interrupt.is_requested() {
            info!("cancellation requested during runtime check, not starting the scan container");
            return Err(AppError::Interrupted { forced: false });
        }

        let mut child = self.runtime.spawn(&spec).map_err(|err| AppError::launch(err.to_string()))?;

        let coordinator = InterruptCoordinator::new(spec.interrupt, interrupt);
        coordinator.register(&child);

        let monitor = OutputMonitor::new(spec.triggers());
        let mut streams = Vec::new();
        if let Some(out) = child.stdout.take() {
            streams.push(spawn_forward(monitor.clone(), out, stdout));
        }
        if let Some(err) = child.stderr.take() {
            streams.push(spawn_forward(monitor, err, stderr));
        }

        let supervision = coordinator.supervise(&mut child).await;
        match &supervision {
            // The runtime has exited and closes its pipes; forward everything it left behind.
            Ok(Supervision::Exited(_)) => drain(streams).await,
            _ => drain_with_timeout(streams).await,
        }
        let supervision =
            supervision.map_err(|err| AppError::launch(format!("failed to wait for scan container: {err}")))?;

        match supervision {
            Supervision::Exited(status) if status.success() => Ok(ExecutionResult::Succeeded),
            Supervision::Exited(status) => {
                let code = status.code().unwrap_or(1);
                if self.runtime.is_launch_failure(code) {
                    return Err(AppError::launch(format!(
                        "container runtime could not start the scan (exit status {code})"
                    )));
                }
                debug!(code, "scan container exited with failure");
                Ok(ExecutionResult::Exited(code))
            }
            Supervision::Interrupted(outcome) => {
                if outcome == InterruptOutcome::ForceKilled {
                    self.reap(spec).await;
                }
                Ok(ExecutionResult::Interrupted(outcome))
            }
        }
    }

    async fn ensure_ready(&self) -> Result<(), AppError> {
        let runtime = self.runtime.clone();
        tokio::task::spawn_blocking(move || runtime.ensure_ready())
            .await
            .map_err(|err| AppError::launch(format!("container runtime check did not complete: {err}")))?
    }

    async fn reap(&self, spec: FrozenRunSpec) {
        let runtime = self.runtime.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || runtime.reap(&spec)).await {
            warn!(error = %err, "container cleanup did not complete");
        }
    }
}

fn spawn_forward<R, W>(monitor: OutputMonitor, reader: R, writer: W) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match monitor.forward(reader, writer).await {
            Ok(lines) => debug!(lines, "output stream closed"),
            Err(err) => warn!(error = %err, "output forwarding stopped"),
        }
    })
}

async fn drain(streams: Vec<JoinHandle<()>>) {
    for stream in streams {
        if let Err(err) = stream.await {
            warn!(error = %err, "output forwarding task failed");
        }
    }
}

/// Used when the child was interrupted: anything still holding the pipes is not waited for.
async fn drain_with_timeout(streams: Vec<JoinHandle<()>>) {
    for mut stream in streams {
        if timeout(DRAIN_TIMEOUT, &mut stream).await.is_err() {
            debug!("output stream still open after child exit, detaching");
            stream.abort();
        }
    }
}
