//! Progress reporting seam between the orchestrator and whatever displays it.

use crate::item::ItemStatus;

/// Receives lifecycle and progress events during a queue run.
///
/// Events for one item arrive in order and never after a later item's
/// events have started. `on_done` is called exactly once per run.
pub trait ProgressObserver {
    fn on_status(&mut self, index: usize, status: ItemStatus);
    fn on_progress(&mut self, index: usize, percent: u8);
    fn on_done(&mut self);
}

/// Observer events as plain data, for forwarding over a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    Status { index: usize, status: ItemStatus },
    Progress { index: usize, percent: u8 },
    Done,
}

/// Records every event; handy for tests and for replaying a run.
impl ProgressObserver for Vec<QueueEvent> {
    fn on_status(&mut self, index: usize, status: ItemStatus) {
        self.push(QueueEvent::Status { index, status });
    }

    fn on_progress(&mut self, index: usize, percent: u8) {
        self.push(QueueEvent::Progress { index, percent });
    }

    fn on_done(&mut self) {
        self.push(QueueEvent::Done);
    }
}

/// Status trajectory of one item, in the order it was reported.
pub fn statuses_for(events: &[QueueEvent], index: usize) -> Vec<ItemStatus> {
    events
        .iter()
        .filter_map(|e| match *e {
            QueueEvent::Status { index: i, status } if i == index => Some(status),
            _ => None,
        })
        .collect()
}
