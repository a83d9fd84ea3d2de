use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;

use crate::docker::InterruptHandle;
use crate::error::AppError;

const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Blocking yes/no question put to the operator.
pub trait ConfirmPrompt {
    fn confirm(&self, message: &str) -> Result<bool, AppError>;
}

/// Uses an interactive dialoguer prompt on a TTY and a plain `[y/N]` line otherwise.
/// A pending interrupt abandons the question with `Interrupted`.
#[derive(Debug, Clone)]
pub struct StdinPrompt {
    interrupt: InterruptHandle,
}

impl StdinPrompt {
    pub fn new(interrupt: InterruptHandle) -> Self {
        Self { interrupt }
    }
}

impl ConfirmPrompt for StdinPrompt {
    fn confirm(&self, message: &str) -> Result<bool, AppError> {
        if io::stdin().is_terminal() {
            let answer =
                Confirm::with_theme(&ColorfulTheme::default()).with_prompt(message).default(false).interact()?;
            return Ok(answer);
        }

        print!("{message} [y/N] ");
        io::stdout().flush()?;
        read_answer(io::BufReader::new(io::stdin()), &self.interrupt)
    }
}

/// Read one `[y/N]` answer from `reader`, giving up as soon as `interrupt` is requested.
///
/// The read happens on a detached thread; if the operator interrupts, that thread is
/// left blocked on its reader.
pub fn read_answer<R>(mut reader: R, interrupt: &InterruptHandle) -> Result<bool, AppError>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut input = String::new();
        let _ = tx.send(reader.read_line(&mut input).map(|_| input));
    });

    loop {
        if interrupt.is_requested() {
            return Err(AppError::Interrupted { forced: false });
        }
        match rx.recv_timeout(INTERRUPT_POLL) {
            Ok(input) => {
                let answer = input?.trim().to_ascii_lowercase();
                return Ok(matches!(answer.as_str(), "y" | "yes"));
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(false),
        }
    }
}
