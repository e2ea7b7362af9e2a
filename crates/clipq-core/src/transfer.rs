//! Single-stream HTTP GET transfer with percent progress.
//!
//! Writes the response body sequentially to the destination file, truncating
//! it first so every retry starts from an empty file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::resolver::TransferHandle;

/// Error returned by one transfer attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Fewer bytes arrived than the server announced.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Destination file could not be created or written.
    #[error("storage: {0}")]
    Storage(#[from] io::Error),
    /// Failure reported by a non-HTTP transfer implementation.
    #[error("{0}")]
    Other(String),
}

/// Converts curl's byte counters into a whole percent. `None` when the total is unknown.
pub fn percent_of(done: f64, total: f64) -> Option<u8> {
    if total.is_nan() || total <= 0.0 || !done.is_finite() {
        return None;
    }
    let pct = (done / total * 100.0).floor().clamp(0.0, 100.0);
    Some(pct as u8)
}

/// Transfer handle backed by a direct media URL (as handed out by the extractor).
#[derive(Debug, Clone)]
pub struct CurlTransfer {
    url: String,
    headers: HashMap<String, String>,
    expected_len: Option<u64>,
}

impl CurlTransfer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            expected_len: None,
        }
    }

    /// Headers the media host insists on (user agent, referer, ...).
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Size announced by the extractor; a shorter body is reported as a partial transfer.
    pub fn with_expected_len(mut self, expected_len: Option<u64>) -> Self {
        self.expected_len = expected_len;
        self
    }

    fn configure(&self, easy: &mut curl::easy::Easy) -> Result<(), TransferError> {
        easy.url(&self.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(Duration::from_secs(30))?;
        // Stalled connections fail the attempt so the retry policy can take over.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;
        easy.progress(true)?;

        if !self.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &self.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl TransferHandle for CurlTransfer {
    fn transfer(&self, dest: &Path, progress: &mut dyn FnMut(u8)) -> Result<(), TransferError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(dest)?;
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy)?;

        let mut written: u64 = 0;
        let mut write_err: Option<io::Error> = None;
        let mut last_pct: Option<u8> = None;
        let perform_result = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    write_err = Some(e);
                    Ok(0) // abort transfer
                }
            })?;
            transfer.progress_function(|dltotal, dlnow, _, _| {
                if let Some(pct) = percent_of(dlnow, dltotal) {
                    if last_pct != Some(pct) {
                        last_pct = Some(pct);
                        progress(pct);
                    }
                }
                true
            })?;
            transfer.perform()
        };

        if let Some(e) = write_err {
            return Err(TransferError::Storage(e));
        }
        perform_result?;

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(TransferError::Http(code));
        }
        file.sync_all()?;

        if let Some(expected) = self.expected_len {
            if written != expected {
                return Err(TransferError::PartialTransfer {
                    expected,
                    received: written,
                });
            }
        }
        if last_pct != Some(100) {
            progress(100);
        }
        tracing::debug!(url = %self.url, bytes = written, path = %dest.display(), "transfer finished");
        Ok(())
    }
}
