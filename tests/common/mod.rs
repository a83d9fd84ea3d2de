//! Shared helpers for the engine and monitor tests.
#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use privado::docker::{ContainerRuntime, FrozenRunSpec, InterruptHandle, TriggerAction};
use privado::error::AppError;
use tokio::io::AsyncWrite;
use tokio::process::{Child, Command};
use tokio::time::Sleep;

/// Runtime that runs a shell script instead of a container.
#[derive(Default)]
pub struct ScriptRuntime {
    script: String,
    launch_failure_code: Option<i32>,
    interrupt_on_ready: Option<InterruptHandle>,
    spawned: AtomicUsize,
}

impl ScriptRuntime {
    pub fn new(script: &str) -> Arc<Self> {
        Arc::new(Self { script: script.to_string(), ..Self::default() })
    }

    pub fn with_launch_failure(script: &str, code: i32) -> Arc<Self> {
        Arc::new(Self { script: script.to_string(), launch_failure_code: Some(code), ..Self::default() })
    }

    /// Runtime whose readiness check is interrupted by the operator.
    pub fn interrupted_while_checking(script: &str, interrupt: InterruptHandle) -> Arc<Self> {
        Arc::new(Self { script: script.to_string(), interrupt_on_ready: Some(interrupt), ..Self::default() })
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl ContainerRuntime for ScriptRuntime {
    fn ensure_ready(&self) -> Result<(), AppError> {
        if let Some(interrupt) = &self.interrupt_on_ready {
            interrupt.request();
        }
        Ok(())
    }

    fn spawn(&self, spec: &FrozenRunSpec) -> io::Result<Child> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.script)
            .envs(&spec.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command.spawn()
    }

    fn is_launch_failure(&self, code: i32) -> bool {
        self.launch_failure_code == Some(code)
    }
}

/// In-memory terminal sink that can be inspected while the engine writes to it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Sink that accepts one write per `delay`, like a terminal that drains slowly.
pub struct SlowBuffer {
    inner: SharedBuffer,
    delay: Duration,
    pause: Option<Pin<Box<Sleep>>>,
}

impl SlowBuffer {
    pub fn new(inner: SharedBuffer, delay: Duration) -> Self {
        Self { inner, delay, pause: None }
    }
}

impl AsyncWrite for SlowBuffer {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        loop {
            match this.pause.as_mut() {
                None => this.pause = Some(Box::pin(tokio::time::sleep(this.delay))),
                Some(pause) => {
                    ready!(pause.as_mut().poll(cx));
                    this.pause = None;
                    this.inner.0.lock().unwrap().extend_from_slice(buf);
                    return Poll::Ready(Ok(buf.len()));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Sink whose reader has gone away, like `privado scan . | head` after `head` exits.
#[derive(Clone, Copy, Default)]
pub struct ClosedSink;

impl AsyncWrite for ClosedSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Trigger action that records every line it is fired with.
pub fn recording_action() -> (TriggerAction, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let action = TriggerAction::new("record", move |line| {
        sink.lock().unwrap().push(line.to_string());
        Ok(())
    });
    (action, calls)
}

pub fn failing_action() -> TriggerAction {
    TriggerAction::new("fail", |_| Err(io::Error::other("browser failed to open")))
}

pub fn panicking_action() -> TriggerAction {
    TriggerAction::new("panic", |_| panic!("action blew up"))
}

/// Poll `condition` for up to two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
