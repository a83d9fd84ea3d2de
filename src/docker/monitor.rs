use std::io;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::docker::spec::{Trigger, TriggerAction};

/// Pass-through filter between a child stream and a terminal sink.
///
/// Every line is written to the sink unchanged before triggers are evaluated, and
/// trigger actions run on the blocking pool so they can never stall the stream.
#[derive(Debug, Clone)]
pub struct OutputMonitor {
    triggers: Arc<[Trigger]>,
}

impl OutputMonitor {
    pub fn new(triggers: Arc<[Trigger]>) -> Self {
        Self { triggers }
    }

    /// Forward `reader` into `writer` line by line until EOF. Returns the number of lines seen.
    ///
    /// A failing sink is dropped after the first error; the stream is still read to the
    /// end and triggers keep firing, so the child never sees a closed pipe.
    pub async fn forward<R, W>(&self, reader: R, mut writer: W) -> io::Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        let mut count = 0u64;
        let mut sink_open = true;
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            if sink_open && let Err(err) = write_line(&mut writer, &line).await {
                warn!(error = %err, "output sink failed, discarding the rest of the stream");
                sink_open = false;
            }
            count += 1;
            self.inspect(&line);
        }
        Ok(count)
    }

    fn inspect(&self, line: &[u8]) {
        if self.triggers.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(line);
        for trigger in self.triggers.iter() {
            if text.contains(trigger.pattern.as_str()) {
                fire(trigger.action.clone(), text.trim_end().to_string());
            }
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line).await?;
    writer.flush().await
}

fn fire(action: TriggerAction, line: String) {
    let handle = tokio::task::spawn_blocking(move || action.run(&line).map_err(|err| (action.name(), err)));
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err((name, err))) => debug!(action = name, error = %err, "output trigger action failed"),
            Err(err) => debug!(error = %err, "output trigger action panicked"),
        }
    });
}

/// Extract the first http(s) URL on a line.
pub fn find_url(line: &str) -> Option<&str> {
    line.split_whitespace().find(|token| token.starts_with("http://") || token.starts_with("https://"))
}

pub fn open_browser_action() -> TriggerAction {
    TriggerAction::new("open-browser", |line| {
        let url = find_url(line)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no URL found on line"))?;
        open_url(url)
    })
}

fn open_url(url: &str) -> io::Result<()> {
    let mut command = opener_command(url);
    let status = command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("browser opener exited with status {status}")))
    }
}

#[cfg(target_os = "macos")]
fn opener_command(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn opener_command(url: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener_command(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}
