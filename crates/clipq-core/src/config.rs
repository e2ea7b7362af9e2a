use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage;

/// What kind of stream a format is expected to hold; drives the fallback
/// stream choice when the requested container is not offered directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    AudioOnly,
    VideoOnly,
    AudioAndVideo,
}

/// `[locations]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationsConfig {
    /// Directory finished files land in. Missing = current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<PathBuf>,
    /// Directory for session snapshots. Missing = `$XDG_DATA_HOME/clipq/sessions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<PathBuf>,
}

/// `[format]` section. Lists are comma-separated extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    pub default_format: String,
    pub supported_audio_only_formats: String,
    pub supported_video_only_formats: String,
    pub supported_audio_and_video_formats: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            default_format: "mp4".to_string(),
            supported_audio_only_formats: "mp3,m4a,ogg,wav,flac".to_string(),
            supported_video_only_formats: String::new(),
            supported_audio_and_video_formats: "mp4,webm,mkv,flv,3gp".to_string(),
        }
    }
}

/// `[tools]` section: external binaries, by name (looked up on PATH) or absolute path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/clipq/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipqConfig {
    #[serde(default)]
    pub locations: LocationsConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option '{section}.{key}'")]
    UnknownOption { section: String, key: String },
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Splits a comma-separated format list, dropping blanks and normalising case.
pub fn split_format_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ClipqConfig {
    pub fn audio_only_formats(&self) -> Vec<String> {
        split_format_list(&self.format.supported_audio_only_formats)
    }

    pub fn video_only_formats(&self) -> Vec<String> {
        split_format_list(&self.format.supported_video_only_formats)
    }

    pub fn audio_and_video_formats(&self) -> Vec<String> {
        split_format_list(&self.format.supported_audio_and_video_formats)
    }

    /// Every supported format, audio+video first, without duplicates.
    pub fn supported_formats(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for f in self
            .audio_and_video_formats()
            .into_iter()
            .chain(self.audio_only_formats())
            .chain(self.video_only_formats())
        {
            if !out.contains(&f) {
                out.push(f);
            }
        }
        out
    }

    /// Media type a format belongs to, or `None` if it is not supported.
    pub fn format_type(&self, format: &str) -> Option<FormatType> {
        let format = format.trim().to_ascii_lowercase();
        if self.audio_and_video_formats().contains(&format) {
            Some(FormatType::AudioAndVideo)
        } else if self.audio_only_formats().contains(&format) {
            Some(FormatType::AudioOnly)
        } else if self.video_only_formats().contains(&format) {
            Some(FormatType::VideoOnly)
        } else {
            None
        }
    }

    /// Effective download directory (configured, else the current directory).
    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.locations.download {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("resolve current directory"),
        }
    }

    /// Effective session directory (configured, else under the XDG data dir).
    pub fn sessions_dir(&self) -> Result<PathBuf> {
        match &self.locations.sessions {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("clipq")?;
                Ok(xdg_dirs.create_data_directory("sessions")?)
            }
        }
    }

    /// Sets one `section.key` option in memory. Unknown keys and bad values are rejected.
    pub fn set_option(&mut self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match (section, key) {
            ("locations", "download") => self.locations.download = non_empty_path(value),
            ("locations", "sessions") => self.locations.sessions = non_empty_path(value),
            ("format", "default_format") => {
                let f = value.to_ascii_lowercase();
                if self.format_type(&f).is_none() {
                    return Err(ConfigError::InvalidValue {
                        key: "format.default_format".to_string(),
                        reason: format!("'{}' is not in any supported format list", f),
                    });
                }
                self.format.default_format = f;
            }
            ("format", "supported_audio_only_formats") => {
                self.format.supported_audio_only_formats = normalise_list(value)
            }
            ("format", "supported_video_only_formats") => {
                self.format.supported_video_only_formats = normalise_list(value)
            }
            ("format", "supported_audio_and_video_formats") => {
                self.format.supported_audio_and_video_formats = normalise_list(value)
            }
            ("tools", "yt_dlp") | ("tools", "ffmpeg") => {
                if value.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: format!("tools.{}", key),
                        reason: "must not be empty".to_string(),
                    });
                }
                if key == "yt_dlp" {
                    self.tools.yt_dlp = value.to_string();
                } else {
                    self.tools.ffmpeg = value.to_string();
                }
            }
            _ => {
                return Err(ConfigError::UnknownOption {
                    section: section.to_string(),
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn normalise_list(value: &str) -> String {
    split_format_list(value).join(",")
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("clipq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ClipqConfig> {
    load_or_init_at(&config_path()?)
}

/// Like `load_or_init` but at an explicit path (tests, `--config`).
pub fn load_or_init_at(path: &Path) -> Result<ClipqConfig> {
    if !path.exists() {
        let default_cfg = ClipqConfig::default();
        save_to(path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(path)
}

pub fn load_from(path: &Path) -> Result<ClipqConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: ClipqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// The configuration as it would be written to disk.
pub fn render(cfg: &ClipqConfig) -> Result<String> {
    toml::to_string_pretty(cfg).context("serialize config")
}

/// Writes the whole configuration, replacing the file atomically.
pub fn save_to(path: &Path, cfg: &ClipqConfig) -> Result<()> {
    storage::write_atomic(path, render(cfg)?.as_bytes())
}

/// Reads the file, changes one option, and rewrites the whole file.
pub fn update_option(path: &Path, section: &str, key: &str, value: &str) -> Result<ClipqConfig> {
    let mut cfg = load_or_init_at(path)?;
    cfg.set_option(section, key, value)?;
    save_to(path, &cfg)?;
    tracing::info!(section, key, value, "config option updated");
    Ok(cfg)
}
