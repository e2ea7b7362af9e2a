//! Post-download trimming and container conversion via ffmpeg.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::storage;
use crate::timecode::Timecode;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("external tool not found: {tool}")]
    ToolMissing { tool: String },
    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("convert io: {0}")]
    Io(#[from] std::io::Error),
}

/// One conversion job: cut `[start, end]` out of `source` into `dest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertRequest {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub start: Timecode,
    pub end: Timecode,
}

/// Produces `dest` from `source`. Implementations remove `source` on
/// success and leave it in place on failure.
pub trait Converter: Send + Sync {
    fn convert(&self, req: &ConvertRequest) -> Result<(), ConvertError>;
}

/// Runs the `ffmpeg` binary; the output container follows `dest`'s extension.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    binary: String,
}

impl FfmpegConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// `-nostdin -y -i SRC -ss START -to END -async 1 DEST`
pub fn ffmpeg_args(req: &ConvertRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-nostdin".into(), "-y".into(), "-i".into()];
    args.push(req.source.clone().into_os_string());
    args.push("-ss".into());
    args.push(req.start.to_string().into());
    args.push("-to".into());
    args.push(req.end.to_string().into());
    args.push("-async".into());
    args.push("1".into());
    args.push(req.dest.clone().into_os_string());
    args
}

impl Converter for FfmpegConverter {
    fn convert(&self, req: &ConvertRequest) -> Result<(), ConvertError> {
        tracing::debug!(
            source = %req.source.display(),
            dest = %req.dest.display(),
            start = %req.start,
            end = %req.end,
            "ffmpeg convert"
        );
        let output = Command::new(&self.binary)
            .args(ffmpeg_args(req))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ConvertError::ToolMissing {
                    tool: self.binary.clone(),
                },
                _ => ConvertError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                tool: self.binary.clone(),
                code: output.status.code(),
                stderr: last_lines(&String::from_utf8_lossy(&output.stderr), 5),
            });
        }
        storage::remove_if_exists(&req.source);
        Ok(())
    }
}

/// ffmpeg prints its banner first; the cause is at the end.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
