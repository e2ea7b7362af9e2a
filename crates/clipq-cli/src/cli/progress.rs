//! Terminal progress: forwards orchestrator events to an async printer task.

use std::time::{Duration, Instant};

use clipq_core::item::ItemStatus;
use clipq_core::observer::{ProgressObserver, QueueEvent};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Observer handed to the blocking orchestrator; sends every event to the printer.
pub struct ChannelObserver {
    tx: UnboundedSender<QueueEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<QueueEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: QueueEvent) {
        // Printer gone means nobody is watching; the run goes on.
        let _ = self.tx.send(event);
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_status(&mut self, index: usize, status: ItemStatus) {
        self.send(QueueEvent::Status { index, status });
    }

    fn on_progress(&mut self, index: usize, percent: u8) {
        self.send(QueueEvent::Progress { index, percent });
    }

    fn on_done(&mut self) {
        self.send(QueueEvent::Done);
    }
}

/// One printable line for an event; `None` for events that print nothing.
pub fn describe(event: &QueueEvent, titles: &[String]) -> Option<String> {
    let title = |index: usize| titles.get(index).map(String::as_str).unwrap_or("?");
    match *event {
        QueueEvent::Status { index, status } => {
            Some(format!("[{}] {}: {}", index + 1, title(index), status))
        }
        QueueEvent::Progress { index, percent } => {
            Some(format!("[{}] {}: {}%", index + 1, title(index), percent))
        }
        QueueEvent::Done => None,
    }
}

/// Prints status changes as they come and progress at most every 500 ms
/// (plus 100%). Ends when the sender side is dropped.
pub fn spawn_printer(mut rx: UnboundedReceiver<QueueEvent>, titles: Vec<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        while let Some(event) = rx.recv().await {
            if let QueueEvent::Progress { percent, .. } = event {
                let now = Instant::now();
                let recent = last_print.is_some_and(|t| now.duration_since(t) < PROGRESS_INTERVAL);
                if percent < 100 && recent {
                    continue;
                }
                last_print = Some(now);
            }
            if let Some(line) = describe(&event, &titles) {
                println!("{}", line);
            }
        }
    })
}
