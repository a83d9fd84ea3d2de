use std::io::{self, BufReader, Cursor, Read};
use std::thread;
use std::time::Duration;

use privado::docker::InterruptHandle;
use privado::error::AppError;
use privado::prompt::read_answer;

/// Stdin that never delivers a line.
struct Silent;

impl Read for Silent {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        loop {
            thread::park();
        }
    }
}

#[test]
fn yes_answers_confirm() {
    for input in ["y\n", "YES\n", " yes \n"] {
        let answer = read_answer(Cursor::new(input.as_bytes().to_vec()), &InterruptHandle::new()).unwrap();
        assert!(answer, "{input:?} should confirm");
    }
}

#[test]
fn anything_else_declines() {
    for input in ["n\n", "\n", "maybe\n", ""] {
        let answer = read_answer(Cursor::new(input.as_bytes().to_vec()), &InterruptHandle::new()).unwrap();
        assert!(!answer, "{input:?} should decline");
    }
}

#[test]
fn interrupt_abandons_a_pending_question() {
    let interrupt = InterruptHandle::new();
    let operator = interrupt.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        operator.request();
    });

    let result = read_answer(BufReader::new(Silent), &interrupt);

    assert!(matches!(result, Err(AppError::Interrupted { forced: false })));
}

#[test]
fn ctrl_c_inside_interactive_prompt_maps_to_interrupted() {
    let interrupted = AppError::from(dialoguer::Error::IO(io::Error::from(io::ErrorKind::Interrupted)));
    assert!(matches!(interrupted, AppError::Interrupted { forced: false }));
    assert!(!interrupted.is_failure());

    let other = AppError::from(dialoguer::Error::IO(io::Error::from(io::ErrorKind::UnexpectedEof)));
    assert!(matches!(other, AppError::Prompt(_)));
    assert_eq!(other.exit_code(), 3);
}
