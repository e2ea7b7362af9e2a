//! Resolver backed by the `yt-dlp` extractor.
//!
//! Runs `yt-dlp -J --skip-download --no-playlist --no-warnings URL` and turns
//! the JSON dump into stream candidates, each with a curl transfer handle for
//! the direct media URL.

use std::collections::HashMap;
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::resolver::{MediaType, ResolveError, ResolvedMedia, Resolver, StreamCandidate};
use crate::timecode::Timecode;
use crate::transfer::CurlTransfer;

/// stderr fragments meaning "this URL has nothing for us" rather than a tool fault.
const NOT_FOUND_MARKERS: &[&str] = &[
    "unsupported url",
    "is not a valid url",
    "video unavailable",
    "this video is unavailable",
    "private video",
    "http error 404",
    "not found",
    "does not exist",
];

#[derive(Debug, Deserialize)]
struct ProbePayload {
    title: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_id: Option<String>,
    ext: Option<String>,
    url: Option<String>,
    protocol: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    tbr: Option<f64>,
    abr: Option<f64>,
    vbr: Option<f64>,
    filesize: Option<u64>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl Resolver for YtDlpResolver {
    fn resolve(&self, url: &str) -> Result<ResolvedMedia, ResolveError> {
        tracing::debug!(url, binary = %self.binary, "probing with yt-dlp");
        let output = Command::new(&self.binary)
            .args(["-J", "--skip-download", "--no-playlist", "--no-warnings"])
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ResolveError::Unexpected(format!("external tool not found: {}", self.binary))
                }
                _ => ResolveError::Unexpected(format!("failed to run {}: {}", self.binary, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }
        parse_probe(&output.stdout)
    }
}

/// Maps yt-dlp's error output to a resolver error.
pub fn classify_failure(stderr: &str) -> ResolveError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim()
        .to_string();
    let lower = stderr.to_ascii_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
        ResolveError::NotFound(message)
    } else {
        ResolveError::Unexpected(message)
    }
}

/// Parses a `yt-dlp -J` dump into title, duration and downloadable streams.
/// Manifest-based formats (HLS, DASH segments) are skipped: only single-file
/// HTTP(S) streams can be fetched with one GET.
pub fn parse_probe(json: &[u8]) -> Result<ResolvedMedia, ResolveError> {
    let payload: ProbePayload = serde_json::from_slice(json)
        .map_err(|e| ResolveError::Unexpected(format!("failed to parse yt-dlp response: {}", e)))?;
    let duration = payload
        .duration
        .ok_or_else(|| ResolveError::Unexpected("no duration reported (live stream?)".to_string()))?;

    let streams: Vec<StreamCandidate> = payload
        .formats
        .into_iter()
        .filter_map(into_candidate)
        .collect();
    tracing::debug!(count = streams.len(), "usable streams");

    Ok(ResolvedMedia {
        title: payload.title.unwrap_or_default(),
        duration: Timecode::from_secs_f64(duration),
        streams,
    })
}

fn into_candidate(f: ProbeFormat) -> Option<StreamCandidate> {
    let url = f.url?;
    let ext = f.ext?.to_ascii_lowercase();
    let direct = match f.protocol.as_deref() {
        None => url.starts_with("http://") || url.starts_with("https://"),
        Some(p) => p == "http" || p == "https",
    };
    if !direct {
        return None;
    }
    let media_type = media_type(f.vcodec.as_deref(), f.acodec.as_deref())?;
    let bitrate = f
        .tbr
        .or_else(|| match (f.abr, f.vbr) {
            (None, None) => None,
            (a, v) => Some(a.unwrap_or(0.0) + v.unwrap_or(0.0)),
        })
        .unwrap_or(0.0);
    tracing::trace!(format_id = ?f.format_id, ext = %ext, ?media_type, bitrate, "stream");
    let handle = CurlTransfer::new(url)
        .with_headers(f.http_headers)
        .with_expected_len(f.filesize);
    Some(StreamCandidate {
        extension: ext,
        media_type,
        bitrate,
        handle: Box::new(handle),
    })
}

/// `"none"` means the track is absent; a missing codec field means unknown.
fn media_type(vcodec: Option<&str>, acodec: Option<&str>) -> Option<MediaType> {
    let absent = |c: Option<&str>| c == Some("none");
    match (absent(vcodec), absent(acodec)) {
        (true, true) => None,
        (true, false) => Some(MediaType::Audio),
        (false, true) => Some(MediaType::Video),
        (false, false) => Some(MediaType::Normal),
    }
}
