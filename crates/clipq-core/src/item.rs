//! Queued download items and their lifecycle status.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::resolver::TransferHandle;
use crate::timecode::Timecode;
use crate::url_model;

/// Lifecycle of one item.
///
/// Valid trajectories:
/// - `Queued → Downloading → (Converting →) Done | ErrorDownload | ErrorConvert`
/// - `Queued → Cancelled`
/// - `Downloading | Converting → Cancelling → Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Queued,
    Downloading,
    Converting,
    Done,
    ErrorDownload,
    ErrorConvert,
    Cancelling,
    Cancelled,
}

impl ItemStatus {
    /// Label shown to the user.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Queued => "Queued",
            ItemStatus::Downloading => "Downloading",
            ItemStatus::Converting => "Converting",
            ItemStatus::Done => "Done",
            ItemStatus::ErrorDownload => "Error during download",
            ItemStatus::ErrorConvert => "Error during converting",
            ItemStatus::Cancelling => "Cancelling ...",
            ItemStatus::Cancelled => "Cancelled",
        }
    }

    pub fn can_advance_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Queued, Downloading)
                | (Queued, Cancelled)
                | (Downloading, Converting)
                | (Downloading, Done)
                | (Downloading, ErrorDownload)
                | (Downloading, Cancelling)
                | (Converting, Done)
                | (Converting, ErrorConvert)
                | (Converting, Cancelling)
                | (Cancelling, Cancelled)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one item, kept for the error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub name: String,
    pub error: String,
}

/// One queued download/convert request plus the metadata derived at submission.
pub struct Item {
    url: String,
    chosen_format: String,
    resolved_format: Option<String>,
    start_time: Timecode,
    end_time: Timecode,
    duration: Timecode,
    raw_title: String,
    title: String,
    transfer_handle: Option<Box<dyn TransferHandle>>,
    final_path: PathBuf,
    temp_path: Option<PathBuf>,
    pub(crate) status: ItemStatus,
    pub(crate) progress: Option<u8>,
}

/// Fields needed to build an `Item`; paths are derived from `download_dir`.
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub url: String,
    pub chosen_format: String,
    pub resolved_format: Option<String>,
    pub start_time: Timecode,
    pub end_time: Timecode,
    pub duration: Timecode,
    pub raw_title: String,
}

impl Item {
    /// Builds a queued item with collision-free paths under `download_dir`,
    /// avoiding anything in `reserved` as well as files on disk.
    pub fn new(
        spec: ItemSpec,
        transfer_handle: Option<Box<dyn TransferHandle>>,
        download_dir: &Path,
        reserved: &[PathBuf],
    ) -> Self {
        let mut item = Item {
            title: url_model::title_stem(&spec.raw_title),
            url: spec.url,
            chosen_format: spec.chosen_format,
            resolved_format: spec.resolved_format,
            start_time: spec.start_time,
            end_time: spec.end_time,
            duration: spec.duration,
            raw_title: spec.raw_title,
            transfer_handle,
            final_path: PathBuf::new(),
            temp_path: None,
            status: ItemStatus::Queued,
            progress: None,
        };
        item.refresh_paths(download_dir, reserved);
        item
    }

    /// Recomputes title and destination paths, e.g. after files appeared on disk.
    pub fn refresh_paths(&mut self, download_dir: &Path, reserved: &[PathBuf]) {
        self.title = url_model::title_stem(&self.raw_title);
        let temp_ext = if self.is_convert_required() {
            self.resolved_format.as_deref()
        } else if self.is_trimmed() {
            Some(self.chosen_format.as_str())
        } else {
            None
        };
        let paths = url_model::unique_media_paths(
            download_dir,
            &self.title,
            &self.chosen_format,
            temp_ext,
            reserved,
        );
        self.final_path = paths.final_path;
        self.temp_path = paths.temp_path;
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn chosen_format(&self) -> &str {
        &self.chosen_format
    }

    pub fn resolved_format(&self) -> Option<&str> {
        self.resolved_format.as_deref()
    }

    pub fn start_time(&self) -> Timecode {
        self.start_time
    }

    pub fn end_time(&self) -> Timecode {
        self.end_time
    }

    pub fn duration(&self) -> Timecode {
        self.duration
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn temp_path(&self) -> Option<&Path> {
        self.temp_path.as_deref()
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    /// The resolver substituted another container; ffmpeg must convert.
    pub fn is_convert_required(&self) -> bool {
        self.resolved_format.is_some()
    }

    /// The window is narrower than the whole stream.
    pub fn is_trimmed(&self) -> bool {
        self.start_time > Timecode::ZERO || self.end_time < self.duration
    }

    /// Download goes to `temp_path` and ffmpeg produces `final_path`.
    pub fn needs_post_process(&self) -> bool {
        self.is_convert_required() || self.is_trimmed()
    }

    /// Where the raw stream is written.
    pub fn download_path(&self) -> &Path {
        match (&self.temp_path, self.needs_post_process()) {
            (Some(temp), true) => temp,
            _ => &self.final_path,
        }
    }

    pub fn has_transfer_handle(&self) -> bool {
        self.transfer_handle.is_some()
    }

    pub(crate) fn take_transfer_handle(&mut self) -> Option<Box<dyn TransferHandle>> {
        self.transfer_handle.take()
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("url", &self.url)
            .field("chosen_format", &self.chosen_format)
            .field("resolved_format", &self.resolved_format)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("duration", &self.duration)
            .field("title", &self.title)
            .field("final_path", &self.final_path)
            .field("temp_path", &self.temp_path)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}
