//! Download orchestrator: walks the queue in order and drives each item
//! through transfer (with retry), optional conversion, and a terminal status.
//!
//! One item at a time. Cancellation is cooperative: the shared flag is
//! polled before each item, between retry attempts, from the transfer
//! progress callback, and around conversion. Nothing is interrupted mid-call.

use std::path::Path;
use std::sync::Arc;

use crate::control::CancelToken;
use crate::convert::{ConvertRequest, Converter};
use crate::item::{ErrorRecord, Item, ItemStatus};
use crate::observer::ProgressObserver;
use crate::queue::QueueStore;
use crate::retry::{run_with_retry, RetryOutcome, RetryPolicy};
use crate::storage;
use crate::transfer::TransferError;

/// Prefix of the error recorded when every transfer attempt failed.
pub const EXCEEDED_ATTEMPTS: &str = "Exceeded maximum download attempts";

pub struct Orchestrator {
    converter: Arc<dyn Converter>,
    policy: RetryPolicy,
    cancel: CancelToken,
}

/// Mutable state of one `run` call.
struct Run<'a> {
    queue: &'a mut QueueStore,
    observer: &'a mut dyn ProgressObserver,
    errors: Vec<ErrorRecord>,
    cancel_seen: bool,
}

impl Run<'_> {
    fn set_status(&mut self, index: usize, status: ItemStatus) {
        if self.queue.set_status(index, status) {
            tracing::debug!(index, status = %status, "status");
            self.observer.on_status(index, status);
        }
    }

    fn report_progress(&mut self, index: usize, percent: u8) {
        if self.cancel_seen {
            return;
        }
        self.queue.set_progress(index, percent);
        self.observer.on_progress(index, percent);
    }

    /// First observation of the cancel flag: the in-flight item goes to
    /// Cancelling and every still-queued item to Cancelled. Later calls are no-ops.
    fn begin_cancel(&mut self, in_flight: Option<usize>) {
        if self.cancel_seen {
            return;
        }
        self.cancel_seen = true;
        tracing::info!(in_flight = ?in_flight, "cancel requested; stopping queue");
        if let Some(index) = in_flight {
            self.set_status(index, ItemStatus::Cancelling);
        }
        let queued: Vec<usize> = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status() == ItemStatus::Queued)
            .map(|(i, _)| i)
            .collect();
        for index in queued {
            self.set_status(index, ItemStatus::Cancelled);
        }
    }
}

impl Orchestrator {
    /// Orchestrator with the default policy (3 attempts, 1 s cooldown).
    pub fn new(converter: Arc<dyn Converter>, cancel: CancelToken) -> Self {
        Self {
            converter,
            policy: RetryPolicy::default(),
            cancel,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Processes every `Queued` item in order and returns the errors collected.
    /// Items already in another status (e.g. from an earlier run) are skipped.
    /// `observer.on_done()` is called exactly once, however the run ends.
    pub fn run(&self, queue: &mut QueueStore, observer: &mut dyn ProgressObserver) -> Vec<ErrorRecord> {
        let mut run = Run {
            queue,
            observer,
            errors: Vec::new(),
            cancel_seen: false,
        };
        tracing::info!(items = run.queue.len(), "queue run started");

        for index in 0..run.queue.len() {
            if self.cancel.is_cancelled() {
                run.begin_cancel(None);
                break;
            }
            if run.queue.get(index).map(Item::status) != Some(ItemStatus::Queued) {
                continue;
            }
            self.process(&mut run, index);
        }

        run.observer.on_done();
        tracing::info!(
            errors = run.errors.len(),
            cancelled = run.cancel_seen,
            "queue run finished"
        );
        run.errors
    }

    fn process(&self, run: &mut Run<'_>, index: usize) {
        let Some(item) = run.queue.item_mut(index) else {
            return;
        };
        let handle = item.take_transfer_handle();
        let dest = item.download_path().to_path_buf();
        let title = item.title().to_string();
        let url = item.url().to_string();
        let convert = item.needs_post_process().then(|| ConvertRequest {
            source: dest.clone(),
            dest: item.final_path().to_path_buf(),
            start: item.start_time(),
            end: item.end_time(),
        });

        run.set_status(index, ItemStatus::Downloading);

        let cancel = &self.cancel;
        // Highest percent reported for this item. A retry restarts at 0, so
        // its progress stays silent until it passes the previous attempt.
        let mut last_percent: Option<u8> = None;
        let outcome = run_with_retry(&self.policy, cancel, |attempt| {
            tracing::info!(index, attempt, url = %url, path = %dest.display(), "transfer attempt");
            let Some(handle) = handle.as_ref() else {
                return Err(TransferError::Other("no transfer handle".to_string()));
            };
            handle.transfer(&dest, &mut |percent| {
                if cancel.is_cancelled() {
                    run.begin_cancel(Some(index));
                    return;
                }
                if !matches!(last_percent, Some(p) if percent <= p) {
                    last_percent = Some(percent);
                    run.report_progress(index, percent);
                }
            })
        });

        let transferred = matches!(outcome, RetryOutcome::Succeeded { .. });
        if self.cancel.is_cancelled() {
            self.unwind_cancelled(run, index, &dest, transferred);
            return;
        }
        match outcome {
            RetryOutcome::Succeeded { attempts } => {
                tracing::debug!(index, attempts, path = %dest.display(), "transfer complete");
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                let error = format!("{} - {}", EXCEEDED_ATTEMPTS, last_error);
                tracing::warn!(index, attempts, url = %url, "{}", error);
                storage::remove_if_exists(&dest);
                run.errors.push(ErrorRecord { name: title, error });
                run.set_status(index, ItemStatus::ErrorDownload);
                return;
            }
            // The flag never resets, so this was handled above.
            RetryOutcome::Cancelled { .. } => return,
        }

        let Some(req) = convert else {
            run.set_status(index, ItemStatus::Done);
            return;
        };
        run.set_status(index, ItemStatus::Converting);
        let result = self.converter.convert(&req);
        if self.cancel.is_cancelled() {
            self.unwind_cancelled(run, index, &dest, true);
            return;
        }
        match result {
            Ok(()) => run.set_status(index, ItemStatus::Done),
            Err(e) => {
                tracing::warn!(index, source = %req.source.display(), "conversion failed: {}", e);
                run.errors.push(ErrorRecord {
                    name: title,
                    error: e.to_string(),
                });
                run.set_status(index, ItemStatus::ErrorConvert);
            }
        }
    }

    /// The in-flight item ends Cancelled. A partial transfer is deleted; a
    /// complete one stays on disk.
    fn unwind_cancelled(&self, run: &mut Run<'_>, index: usize, dest: &Path, transferred: bool) {
        run.begin_cancel(Some(index));
        if !transferred {
            storage::remove_if_exists(dest);
        }
        run.set_status(index, ItemStatus::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertError;
    use crate::item::ItemSpec;
    use crate::observer::{statuses_for, QueueEvent};
    use crate::resolver::TransferHandle;
    use crate::timecode::Timecode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use ItemStatus::*;

    /// Fails `fail_first` times, then writes `body` reporting 0, 50, 50, 100.
    struct ScriptedHandle {
        fail_first: u32,
        attempts: Arc<AtomicU32>,
    }

    impl TransferHandle for ScriptedHandle {
        fn transfer(&self, dest: &Path, progress: &mut dyn FnMut(u8)) -> Result<(), TransferError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            std::fs::write(dest, b"partial")?;
            progress(0);
            if n <= self.fail_first {
                return Err(TransferError::Http(503));
            }
            progress(50);
            progress(50);
            std::fs::write(dest, b"media bytes")?;
            progress(100);
            Ok(())
        }
    }

    /// Cancels the run halfway through its transfer.
    struct CancellingHandle {
        cancel: CancelToken,
        complete: bool,
    }

    impl TransferHandle for CancellingHandle {
        fn transfer(&self, dest: &Path, progress: &mut dyn FnMut(u8)) -> Result<(), TransferError> {
            std::fs::write(dest, b"half")?;
            progress(10);
            self.cancel.cancel();
            progress(20);
            if self.complete {
                progress(100);
                Ok(())
            } else {
                Err(TransferError::Other("connection reset".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct FakeConverter {
        fail: bool,
        calls: Mutex<Vec<ConvertRequest>>,
    }

    impl Converter for FakeConverter {
        fn convert(&self, req: &ConvertRequest) -> Result<(), ConvertError> {
            self.calls.lock().unwrap().push(req.clone());
            if self.fail {
                return Err(ConvertError::Failed {
                    tool: "ffmpeg".to_string(),
                    code: Some(1),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            std::fs::copy(&req.source, &req.dest)?;
            std::fs::remove_file(&req.source)?;
            Ok(())
        }
    }

    fn spec(name: &str, resolved: Option<&str>) -> ItemSpec {
        ItemSpec {
            url: format!("https://video.example/{name}"),
            chosen_format: "mp4".to_string(),
            resolved_format: resolved.map(str::to_string),
            start_time: Timecode::ZERO,
            end_time: Timecode::from_secs(90),
            duration: Timecode::from_secs(90),
            raw_title: name.to_string(),
        }
    }

    fn scripted(fail_first: u32) -> (Box<dyn TransferHandle>, Arc<AtomicU32>) {
        let attempts = Arc::new(AtomicU32::new(0));
        let handle = ScriptedHandle {
            fail_first,
            attempts: Arc::clone(&attempts),
        };
        (Box::new(handle), attempts)
    }

    fn push(q: &mut QueueStore, dir: &Path, spec: ItemSpec, handle: Option<Box<dyn TransferHandle>>) {
        let item = Item::new(spec, handle, dir, &q.reserved_paths());
        q.append(item).unwrap();
    }

    fn orchestrator(converter: Arc<FakeConverter>, cancel: CancelToken) -> Orchestrator {
        Orchestrator::new(converter, cancel).with_policy(RetryPolicy {
            max_attempts: 3,
            cooldown: Duration::ZERO,
        })
    }

    fn progress_for(events: &[QueueEvent], index: usize) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match *e {
                QueueEvent::Progress { index: i, percent } if i == index => Some(percent),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plain_and_converted_items_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        push(&mut q, dir.path(), spec("plain", None), Some(scripted(0).0));
        push(&mut q, dir.path(), spec("conv", Some("webm")), Some(scripted(0).0));

        let converter = Arc::new(FakeConverter::default());
        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::clone(&converter), CancelToken::new()).run(&mut q, &mut events);

        assert!(errors.is_empty());
        assert_eq!(statuses_for(&events, 0), vec![Downloading, Done]);
        assert_eq!(statuses_for(&events, 1), vec![Downloading, Converting, Done]);
        assert_eq!(progress_for(&events, 0), vec![0, 50, 100]);
        assert_eq!(events.iter().filter(|e| **e == QueueEvent::Done).count(), 1);
        assert_eq!(events.last(), Some(&QueueEvent::Done));

        let calls = converter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, dir.path().join("conv_TEMP.webm"));
        assert_eq!(calls[0].dest, dir.path().join("conv.mp4"));
        assert!(dir.path().join("plain.mp4").exists());
        assert!(dir.path().join("conv.mp4").exists());
        assert!(!dir.path().join("conv_TEMP.webm").exists());
    }

    #[test]
    fn flaky_transfer_recovers_within_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        let (handle, attempts) = scripted(2);
        push(&mut q, dir.path(), spec("flaky", None), Some(handle));

        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::default(), CancelToken::new()).run(&mut q, &mut events);
        assert!(errors.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(q.statuses(), vec![Done]);
        assert_eq!(std::fs::read(dir.path().join("flaky.mp4")).unwrap(), b"media bytes");
    }

    /// Reaches 60% and drops the connection once, then completes.
    struct DroppingHandle {
        attempts: AtomicU32,
    }

    impl TransferHandle for DroppingHandle {
        fn transfer(&self, dest: &Path, progress: &mut dyn FnMut(u8)) -> Result<(), TransferError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest, b"media bytes")?;
            progress(0);
            progress(60);
            if n == 0 {
                return Err(TransferError::Other("connection reset".to_string()));
            }
            progress(80);
            progress(100);
            Ok(())
        }
    }

    #[test]
    fn progress_never_goes_back_across_retries() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        let handle = DroppingHandle { attempts: AtomicU32::new(0) };
        push(&mut q, dir.path(), spec("dropped", None), Some(Box::new(handle)));

        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::default(), CancelToken::new()).run(&mut q, &mut events);
        assert!(errors.is_empty());
        assert_eq!(q.statuses(), vec![Done]);
        assert_eq!(progress_for(&events, 0), vec![0, 60, 80, 100]);
    }

    #[test]
    fn failing_item_does_not_stop_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        let (bad, bad_attempts) = scripted(u32::MAX);
        let (good, good_attempts) = scripted(0);
        push(&mut q, dir.path(), spec("bad", None), Some(bad));
        push(&mut q, dir.path(), spec("good", None), Some(good));

        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::default(), CancelToken::new()).run(&mut q, &mut events);

        assert_eq!(bad_attempts.load(Ordering::SeqCst), 3);
        assert_eq!(good_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            errors,
            vec![ErrorRecord {
                name: "bad".to_string(),
                error: "Exceeded maximum download attempts - HTTP 503".to_string(),
            }]
        );
        assert_eq!(statuses_for(&events, 0), vec![Downloading, ErrorDownload]);
        assert_eq!(statuses_for(&events, 1), vec![Downloading, Done]);
        assert!(!dir.path().join("bad.mp4").exists());
    }

    #[test]
    fn missing_handle_counts_as_failed_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        push(&mut q, dir.path(), spec("orphan", None), None);

        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::default(), CancelToken::new()).run(&mut q, &mut events);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].error,
            "Exceeded maximum download attempts - no transfer handle"
        );
        assert_eq!(q.statuses(), vec![ErrorDownload]);
    }

    #[test]
    fn cancel_mid_download_stops_everything_after() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let mut q = QueueStore::in_memory();
        let (first, _) = scripted(0);
        let (third, third_attempts) = scripted(0);
        let (fourth, fourth_attempts) = scripted(0);
        push(&mut q, dir.path(), spec("first", None), Some(first));
        push(
            &mut q,
            dir.path(),
            spec("second", None),
            Some(Box::new(CancellingHandle {
                cancel: cancel.clone(),
                complete: false,
            })),
        );
        push(&mut q, dir.path(), spec("third", None), Some(third));
        push(&mut q, dir.path(), spec("fourth", None), Some(fourth));

        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::default(), cancel).run(&mut q, &mut events);

        assert!(errors.is_empty());
        assert_eq!(q.statuses(), vec![Done, Cancelled, Cancelled, Cancelled]);
        assert_eq!(statuses_for(&events, 1), vec![Downloading, Cancelling, Cancelled]);
        assert_eq!(statuses_for(&events, 2), vec![Cancelled]);
        assert_eq!(third_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(fourth_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(progress_for(&events, 1), vec![10]);
        assert!(!dir.path().join("second.mp4").exists());
        assert_eq!(events.last(), Some(&QueueEvent::Done));
    }

    #[test]
    fn cancel_after_complete_transfer_skips_conversion_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let mut q = QueueStore::in_memory();
        push(
            &mut q,
            dir.path(),
            spec("clip", Some("webm")),
            Some(Box::new(CancellingHandle {
                cancel: cancel.clone(),
                complete: true,
            })),
        );

        let converter = Arc::new(FakeConverter::default());
        let mut events: Vec<QueueEvent> = Vec::new();
        orchestrator(Arc::clone(&converter), cancel).run(&mut q, &mut events);

        assert!(converter.calls.lock().unwrap().is_empty());
        assert_eq!(statuses_for(&events, 0), vec![Downloading, Cancelling, Cancelled]);
        assert!(dir.path().join("clip_TEMP.webm").exists());
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut q = QueueStore::in_memory();
        let (a, a_attempts) = scripted(0);
        let (b, _) = scripted(0);
        push(&mut q, dir.path(), spec("a", None), Some(a));
        push(&mut q, dir.path(), spec("b", None), Some(b));

        let mut events: Vec<QueueEvent> = Vec::new();
        orchestrator(Arc::default(), cancel).run(&mut q, &mut events);
        assert_eq!(a_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(q.statuses(), vec![Cancelled, Cancelled]);
        assert_eq!(
            events,
            vec![
                QueueEvent::Status { index: 0, status: Cancelled },
                QueueEvent::Status { index: 1, status: Cancelled },
                QueueEvent::Done,
            ]
        );
    }

    #[test]
    fn convert_error_is_recorded_and_source_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        push(&mut q, dir.path(), spec("clip", Some("webm")), Some(scripted(0).0));

        let converter = Arc::new(FakeConverter {
            fail: true,
            ..Default::default()
        });
        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orchestrator(Arc::clone(&converter), CancelToken::new()).run(&mut q, &mut events);

        assert_eq!(converter.calls.lock().unwrap().len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "clip");
        assert!(errors[0].error.contains("Invalid data found"));
        assert_eq!(statuses_for(&events, 0), vec![Downloading, Converting, ErrorConvert]);
        assert!(dir.path().join("clip_TEMP.webm").exists());
    }

    #[test]
    fn second_run_skips_finished_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = QueueStore::in_memory();
        let (handle, attempts) = scripted(0);
        push(&mut q, dir.path(), spec("once", None), Some(handle));

        let orch = orchestrator(Arc::default(), CancelToken::new());
        orch.run(&mut q, &mut Vec::<QueueEvent>::new());
        let mut events: Vec<QueueEvent> = Vec::new();
        let errors = orch.run(&mut q, &mut events);
        assert!(errors.is_empty());
        assert_eq!(events, vec![QueueEvent::Done]);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
