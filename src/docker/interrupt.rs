use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::process::Child;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::docker::spec::InterruptPolicy;

/// Cancellation request shared between the signal listener and the supervisor.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Repeated requests are no-ops.
    pub fn request(&self) {
        let first = self.tx.send_if_modified(|requested| !std::mem::replace(requested, true));
        if first {
            info!("interrupt requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Route Ctrl-C (and SIGTERM on unix) into this handle for the rest of the process.
    pub fn listen_for_signals(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                handle.request();
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let handle = self.clone();
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    tokio::spawn(async move {
                        while stream.recv().await.is_some() {
                            handle.request();
                        }
                    });
                }
                Err(err) => warn!(error = %err, "unable to listen for SIGTERM"),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptState {
    Idle,
    Running,
    InterruptRequested,
    Terminated,
}

impl From<u8> for InterruptState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::InterruptRequested,
            3 => Self::Terminated,
            _ => Self::Idle,
        }
    }
}

impl From<InterruptState> for u8 {
    fn from(s: InterruptState) -> Self {
        match s {
            InterruptState::Idle => 0,
            InterruptState::Running => 1,
            InterruptState::InterruptRequested => 2,
            InterruptState::Terminated => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// The child exited within the grace period after SIGTERM.
    Clean,
    /// The grace period elapsed and the child was killed.
    ForceKilled,
}

#[derive(Debug)]
pub enum Supervision {
    Exited(ExitStatus),
    Interrupted(InterruptOutcome),
}

/// Supervises one child: waits for it to exit, or turns a cancellation request
/// into SIGTERM followed, after the grace period, by SIGKILL.
#[derive(Debug)]
pub struct InterruptCoordinator {
    state: AtomicU8,
    policy: InterruptPolicy,
    handle: InterruptHandle,
}

impl InterruptCoordinator {
    pub fn new(policy: InterruptPolicy, handle: InterruptHandle) -> Self {
        Self { state: AtomicU8::new(InterruptState::Idle.into()), policy, handle }
    }

    pub fn state(&self) -> InterruptState {
        InterruptState::from(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: InterruptState, to: InterruptState) -> bool {
        self.state.compare_exchange(from.into(), to.into(), Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    fn set(&self, state: InterruptState) {
        self.state.store(state.into(), Ordering::SeqCst);
    }

    /// Mark a freshly spawned child as running.
    pub fn register(&self, child: &Child) {
        self.transition(InterruptState::Idle, InterruptState::Running);
        debug!(pid = ?child.id(), "child registered for interrupt handling");
    }

    /// Wait for `child` to terminate. Never returns while the child is alive.
    pub async fn supervise(&self, child: &mut Child) -> io::Result<Supervision> {
        let interrupt = async {
            if self.policy.forward_signals {
                self.handle.requested().await
            } else {
                std::future::pending::<()>().await
            }
        };

        let result = tokio::select! {
            status = child.wait() => status.map(Supervision::Exited),
            _ = interrupt => self.shutdown(child).await.map(Supervision::Interrupted),
        };
        self.set(InterruptState::Terminated);
        result
    }

    async fn shutdown(&self, child: &mut Child) -> io::Result<InterruptOutcome> {
        if !self.transition(InterruptState::Running, InterruptState::InterruptRequested) {
            // Not running (already requested or terminated): the only thing left is to reap.
            child.wait().await?;
            return Ok(InterruptOutcome::Clean);
        }

        info!(grace_secs = self.policy.grace_period.as_secs_f64(), "stopping scan container");
        if let Err(err) = request_termination(child) {
            warn!(error = %err, "failed to send termination signal");
        }

        match timeout(self.policy.grace_period, child.wait()).await {
            Ok(status) => {
                status?;
                Ok(InterruptOutcome::Clean)
            }
            Err(_) => {
                warn!("grace period elapsed, killing scan container");
                child.kill().await?;
                Ok(InterruptOutcome::ForceKilled)
            }
        }
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
