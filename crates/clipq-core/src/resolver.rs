//! Resolver interface for turning a page URL into downloadable streams.
//!
//! The queue and orchestrator only depend on these traits and do not know
//! about yt-dlp or any other specific extractor (see `ytdlp` for the
//! concrete implementation).

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::timecode::Timecode;
use crate::transfer::TransferError;

/// What a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Audio and video muxed together.
    Normal,
    Audio,
    Video,
}

/// Performs the byte transfer of one stream. Called once per attempt; must
/// truncate `dest` on each call so a retry never appends to a failed attempt.
pub trait TransferHandle: Send {
    /// Writes the stream to `dest`, reporting integer percent (0..=100) as it goes.
    fn transfer(&self, dest: &Path, progress: &mut dyn FnMut(u8)) -> Result<(), TransferError>;
}

/// One downloadable stream offered by the resolver.
pub struct StreamCandidate {
    /// Container extension, e.g. `mp4`, `webm`, `m4a`.
    pub extension: String,
    pub media_type: MediaType,
    /// Total bitrate in kbit/s; used to pick the best stream. 0 when unknown.
    pub bitrate: f64,
    pub handle: Box<dyn TransferHandle>,
}

impl fmt::Debug for StreamCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCandidate")
            .field("extension", &self.extension)
            .field("media_type", &self.media_type)
            .field("bitrate", &self.bitrate)
            .finish_non_exhaustive()
    }
}

/// Everything the resolver learned about a URL.
#[derive(Debug)]
pub struct ResolvedMedia {
    /// Raw title as published; sanitized later for filenames.
    pub title: String,
    pub duration: Timecode,
    pub streams: Vec<StreamCandidate>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The URL does not point at anything the extractor recognises.
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other extractor fault (tool missing, bad output, network).
    #[error("resolver failed: {0}")]
    Unexpected(String),
}

/// Implemented by stream extractors (e.g. the yt-dlp resolver).
pub trait Resolver: Send + Sync {
    fn resolve(&self, url: &str) -> Result<ResolvedMedia, ResolveError>;
}
