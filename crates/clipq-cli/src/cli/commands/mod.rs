//! CLI command handlers, one file per command.

mod config;
mod download;
mod formats;
mod sessions;

pub use config::run_config;
pub use download::{run_download, DownloadOptions};
pub use formats::run_formats;
pub use sessions::run_sessions;
