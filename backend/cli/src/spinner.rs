//! "Thinking" indicator drawn on stderr while a model call is in flight.

use std::future::Future;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::terminal_output::{paint, CYAN, DIM};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK: Duration = Duration::from_millis(80);
const CLEAR_LINE: &str = "\r\x1b[2K";

pub struct Spinner {
    ticks: Arc<AtomicUsize>,
    visible: bool,
    task: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Draws only when stderr is a terminal.
    pub fn start(message: &str) -> Self {
        Self::spawn(message, std::io::stderr().is_terminal())
    }

    fn spawn(message: &str, visible: bool) -> Self {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let message = message.to_string();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            loop {
                interval.tick().await;
                let tick = counter.fetch_add(1, Ordering::SeqCst);
                if visible {
                    let mut err = std::io::stderr();
                    let _ = write!(err, "\r{}", frame_line(tick, &message));
                    let _ = err.flush();
                }
            }
        });

        Self {
            ticks,
            visible,
            task: Some(task),
        }
    }

    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else { return };
        task.abort();
        if self.visible {
            let mut err = std::io::stderr();
            let _ = write!(err, "{CLEAR_LINE}");
            let _ = err.flush();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn frame_line(tick: usize, message: &str) -> String {
    let frame = SPINNER_FRAMES[tick % SPINNER_FRAMES.len()];
    format!("{} {}", paint(CYAN, frame), paint(DIM, &format!("◈ {message}... ◇")))
}

/// Await `future` with a spinner running beside it.
pub async fn with_spinner<F: Future>(message: &str, future: F) -> F::Output {
    let mut spinner = Spinner::start(message);
    let output = future.await;
    spinner.stop();
    output
}
