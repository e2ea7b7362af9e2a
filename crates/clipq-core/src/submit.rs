//! Submission: validate raw input, resolve the URL, pick a stream, build an `Item`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ClipqConfig, FormatType};
use crate::item::{Item, ItemSpec};
use crate::resolver::{MediaType, ResolveError, Resolver, StreamCandidate};
use crate::session::SessionEntry;
use crate::timecode::Timecode;
use crate::url_model;

/// Raw user input for one URL. Blank times mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    pub url: String,
    /// Output extension; blank selects the configured default.
    pub chosen_format: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl From<SessionEntry> for SubmitRequest {
    fn from(e: SessionEntry) -> Self {
        Self {
            url: e.url,
            chosen_format: e.chosen_format,
            start_time: e.start_time,
            end_time: e.end_time,
        }
    }
}

/// Submission failures, worded for the end user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("File format not supported")]
    UnsupportedFormat,
    #[error("URL not found: {url}")]
    UrlNotFound { url: String },
    #[error("An unexpected error occurred when searching for URL '{url}', please try again.")]
    Unexpected { url: String },
    #[error("The '{field}' does not match the format 'HH:MM:SS' for URL: '{url}'.")]
    BadTimeFormat { field: &'static str, url: String },
    #[error("The start time must be less than the duration for URL: '{url}'")]
    StartAfterDuration { url: String },
    #[error("The end time must be less than the duration for URL: '{url}'")]
    EndAfterDuration { url: String },
    #[error("The start time must be less than the end time for URL: '{url}'")]
    StartAfterEnd { url: String },
    #[error("No downloadable stream found for URL: '{url}'")]
    NoStream { url: String },
}

/// Builds queue items from user input. Holds the resolver and the format
/// settings; everything else comes in with each request.
pub struct Submitter {
    resolver: Arc<dyn Resolver>,
    config: ClipqConfig,
    download_dir: PathBuf,
}

impl Submitter {
    pub fn new(resolver: Arc<dyn Resolver>, config: ClipqConfig, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            config,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn submit(&self, req: &SubmitRequest) -> Result<Item, SubmitError> {
        self.submit_avoiding(req, &[])
    }

    /// Like `submit`, also treating `reserved` paths (already claimed by
    /// queued items) as taken.
    pub fn submit_avoiding(&self, req: &SubmitRequest, reserved: &[PathBuf]) -> Result<Item, SubmitError> {
        let url = req.url.trim().to_string();
        let chosen_format = match req.chosen_format.trim() {
            "" => self.config.format.default_format.to_ascii_lowercase(),
            f => f.to_ascii_lowercase(),
        };
        let format_type = self
            .config
            .format_type(&chosen_format)
            .ok_or(SubmitError::UnsupportedFormat)?;

        if url_model::parse_media_url(&url).is_none() {
            tracing::debug!(url = %url, "rejected unparseable url");
            return Err(SubmitError::UrlNotFound { url });
        }

        let media = self.resolver.resolve(&url).map_err(|e| {
            tracing::warn!(url = %url, "resolve failed: {}", e);
            match e {
                ResolveError::NotFound(_) => SubmitError::UrlNotFound { url: url.clone() },
                ResolveError::Unexpected(_) => SubmitError::Unexpected { url: url.clone() },
            }
        })?;

        let duration = media.duration;
        let start_time = parse_time(req.start_time.as_deref(), "start time", &url)?.unwrap_or(Timecode::ZERO);
        if start_time > duration {
            return Err(SubmitError::StartAfterDuration { url });
        }
        let end_time = parse_time(req.end_time.as_deref(), "end time", &url)?.unwrap_or(duration);
        if end_time > duration {
            return Err(SubmitError::EndAfterDuration { url });
        }
        if start_time > end_time {
            return Err(SubmitError::StartAfterEnd { url });
        }

        let (stream, resolved_format) = select_stream(media.streams, &chosen_format, format_type)
            .ok_or_else(|| SubmitError::NoStream { url: url.clone() })?;
        tracing::debug!(
            url = %url,
            ext = %stream.extension,
            bitrate = stream.bitrate,
            resolved_format = ?resolved_format,
            "selected stream"
        );

        let item = Item::new(
            ItemSpec {
                url,
                chosen_format,
                resolved_format,
                start_time,
                end_time,
                duration,
                raw_title: media.title,
            },
            Some(stream.handle),
            &self.download_dir,
            reserved,
        );
        tracing::info!(url = item.url(), path = %item.final_path().display(), "item submitted");
        Ok(item)
    }
}

fn parse_time(raw: Option<&str>, field: &'static str, url: &str) -> Result<Option<Timecode>, SubmitError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Timecode::parse(s).map(Some).map_err(|_| SubmitError::BadTimeFormat {
            field,
            url: url.to_string(),
        }),
    }
}

/// Picks the stream to download and, when it is not already in `chosen`
/// format, the extension it will arrive in (so a conversion is planned).
///
/// An exact-extension stream wins: best audio+video of that extension, else
/// best audio of that extension. Otherwise the best stream matching the
/// format's media type, any extension.
pub fn select_stream(
    streams: Vec<StreamCandidate>,
    chosen: &str,
    format_type: FormatType,
) -> Option<(StreamCandidate, Option<String>)> {
    let exact_normal = streams
        .iter()
        .any(|s| s.extension == chosen && s.media_type == MediaType::Normal);
    let exact_audio = streams
        .iter()
        .any(|s| s.extension == chosen && s.media_type == MediaType::Audio);

    let picked = if exact_normal {
        best_of(streams, |s| s.extension == chosen && s.media_type == MediaType::Normal)
    } else if exact_audio {
        best_of(streams, |s| s.extension == chosen && s.media_type == MediaType::Audio)
    } else {
        let wanted = match format_type {
            FormatType::AudioAndVideo => MediaType::Normal,
            FormatType::AudioOnly => MediaType::Audio,
            FormatType::VideoOnly => MediaType::Video,
        };
        best_of(streams, |s| s.media_type == wanted)
    }?;

    let resolved = (picked.extension != chosen).then(|| picked.extension.clone());
    Some((picked, resolved))
}

fn best_of(streams: Vec<StreamCandidate>, keep: impl Fn(&StreamCandidate) -> bool) -> Option<StreamCandidate> {
    streams
        .into_iter()
        .filter(|s| keep(s))
        .max_by(|a, b| a.bitrate.total_cmp(&b.bitrate))
}
