//! CLI for the clipq video download queue.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clipq_core::config;
use std::path::PathBuf;

use commands::{run_config, run_download, run_formats, run_sessions, DownloadOptions};

/// Top-level CLI for clipq.
#[derive(Debug, Parser)]
#[command(name = "clipq")]
#[command(about = "clipq: queue, trim and convert online videos, one download at a time", long_about = None)]
pub struct Cli {
    /// Use this config file instead of `~/.config/clipq/config.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue URLs (and/or a saved session) and download them in order.
    Download {
        /// Page URLs of the videos to fetch.
        urls: Vec<String>,

        /// Output format (file extension) for the URLs given here. Defaults to `format.default_format`.
        #[arg(short, long, value_name = "EXT")]
        format: Option<String>,

        /// Keep only from this time on.
        #[arg(long, value_name = "HH:MM:SS")]
        start: Option<String>,

        /// Keep only up to this time.
        #[arg(long, value_name = "HH:MM:SS")]
        end: Option<String>,

        /// Re-submit the entries of a saved session file before the URLs.
        #[arg(long, value_name = "FILE")]
        session: Option<PathBuf>,

        /// Skip inputs by position (1-based; session entries first, then URLs), e.g. `--exclude 2,4`.
        #[arg(long, value_name = "N", value_delimiter = ',')]
        exclude: Vec<usize>,

        /// Save files here instead of `locations.download`.
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,

        /// Also write the error report as JSON to this file.
        #[arg(long, value_name = "FILE")]
        error_report: Option<PathBuf>,
    },

    /// List the supported output formats.
    Formats,

    /// List saved session files.
    Sessions,

    /// Show or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file location.
    Path,
    /// Set one option and rewrite the file, e.g. `clipq config set format.default_format mp3`.
    Set {
        /// Option as SECTION.KEY.
        key: String,
        value: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let config_path = match cli.config {
            Some(path) => path,
            None => config::config_path()?,
        };
        let cfg = config::load_or_init_at(&config_path)?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Download {
                urls,
                format,
                start,
                end,
                session,
                exclude,
                download_dir,
                error_report,
            } => {
                let opts = DownloadOptions {
                    urls,
                    format,
                    start,
                    end,
                    session,
                    exclude,
                    download_dir,
                    error_report,
                };
                run_download(&cfg, opts).await?;
            }
            CliCommand::Formats => run_formats(&cfg),
            CliCommand::Sessions => run_sessions(&cfg)?,
            CliCommand::Config { action } => run_config(&config_path, &cfg, action)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
