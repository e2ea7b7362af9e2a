//! `clipq download` – queue URLs (and/or a saved session), then run the queue.

use anyhow::{Context, Result};
use clipq_core::config::ClipqConfig;
use clipq_core::control::CancelToken;
use clipq_core::convert::FfmpegConverter;
use clipq_core::item::{ErrorRecord, ItemStatus};
use clipq_core::orchestrator::Orchestrator;
use clipq_core::queue::QueueStore;
use clipq_core::session::{self, SessionEntry};
use clipq_core::storage;
use clipq_core::submit::{SubmitRequest, Submitter};
use clipq_core::ytdlp::YtDlpResolver;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::progress::{self, ChannelObserver};

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub urls: Vec<String>,
    pub format: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub session: Option<PathBuf>,
    /// 1-based queue positions to drop before the run.
    pub exclude: Vec<usize>,
    pub download_dir: Option<PathBuf>,
    pub error_report: Option<PathBuf>,
}

pub async fn run_download(cfg: &ClipqConfig, opts: DownloadOptions) -> Result<()> {
    let download_dir = match &opts.download_dir {
        Some(dir) => dir.clone(),
        None => cfg.download_dir()?,
    };
    std::fs::create_dir_all(&download_dir)
        .with_context(|| format!("create download dir: {}", download_dir.display()))?;

    let saved = match &opts.session {
        Some(path) => session::load(path)?,
        None => Vec::new(),
    };
    let requests = build_requests(&opts, saved);
    if requests.is_empty() {
        anyhow::bail!("nothing to download: pass one or more URLs or --session FILE");
    }
    let requests = drop_excluded(requests, &opts.exclude)?;

    let session_path = session::new_session_path(&cfg.sessions_dir()?);
    let mut queue = QueueStore::with_session(&session_path);
    let resolver = Arc::new(YtDlpResolver::new(cfg.tools.yt_dlp.clone()));
    let submitter = Arc::new(Submitter::new(resolver, cfg.clone(), &download_dir));

    let mut rejected: Vec<String> = Vec::new();
    for req in requests {
        println!("Looking up {} ...", req.url);
        let url = req.url.clone();
        let reserved = queue.reserved_paths();
        let submitter = Arc::clone(&submitter);
        let result = tokio::task::spawn_blocking(move || submitter.submit_avoiding(&req, &reserved))
            .await
            .context("submission worker panicked")?;
        match result {
            Ok(item) => {
                println!(
                    "  [{}] {} -> {}",
                    queue.len() + 1,
                    item.title(),
                    item.final_path().display()
                );
                queue.append(item)?;
            }
            Err(e) => {
                eprintln!("  {}", e);
                rejected.push(url);
            }
        }
    }
    if !rejected.is_empty() {
        eprintln!("{} URL(s) could not be queued:", rejected.len());
        for url in &rejected {
            eprintln!("  {}", url);
        }
    }

    if queue.is_empty() {
        println!("Nothing queued.");
        return Ok(());
    }
    println!("Session saved to {}", session_path.display());

    queue.refresh_paths(&download_dir);
    let titles: Vec<String> = queue.iter().map(|i| i.title().to_string()).collect();

    let cancel = CancelToken::new();
    let converter = Arc::new(FfmpegConverter::new(cfg.tools.ffmpeg.clone()));
    let orchestrator = Orchestrator::new(converter, cancel.clone());

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling; waiting for the current item to stop ...");
            cancel.cancel();
        }
    });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = progress::spawn_printer(rx, titles);
    let (queue, errors) = tokio::task::spawn_blocking(move || {
        let mut observer = ChannelObserver::new(tx);
        let errors = orchestrator.run(&mut queue, &mut observer);
        (queue, errors)
    })
    .await
    .context("download worker panicked")?;
    ctrl_c.abort();
    let _ = printer.await;

    println!("{}", summarize(&queue.statuses()));
    report_errors(&errors, opts.error_report.as_deref())
}

/// Saved session entries first, then the URLs from the command line.
pub fn build_requests(opts: &DownloadOptions, saved: Vec<SessionEntry>) -> Vec<SubmitRequest> {
    let mut out: Vec<SubmitRequest> = saved.into_iter().map(SubmitRequest::from).collect();
    out.extend(opts.urls.iter().map(|url| SubmitRequest {
        url: url.clone(),
        chosen_format: opts.format.clone().unwrap_or_default(),
        start_time: opts.start.clone(),
        end_time: opts.end.clone(),
    }));
    out
}

/// Drops the requests at the given 1-based positions (session entries first,
/// then command-line URLs). Applied before submission so a URL that later
/// fails to resolve cannot shift the positions.
pub fn drop_excluded(requests: Vec<SubmitRequest>, exclude: &[usize]) -> Result<Vec<SubmitRequest>> {
    let total = requests.len();
    let mut skip = BTreeSet::new();
    for &position in exclude {
        if position == 0 || position > total {
            anyhow::bail!("--exclude {}: positions run from 1 to {}", position, total);
        }
        skip.insert(position - 1);
    }
    Ok(requests
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !skip.contains(index))
        .map(|(_, req)| req)
        .collect())
}

/// `Done: 2, Error during download: 1` in first-seen order.
pub fn summarize(statuses: &[ItemStatus]) -> String {
    let mut counts: Vec<(ItemStatus, usize)> = Vec::new();
    for &s in statuses {
        match counts.iter_mut().find(|(status, _)| *status == s) {
            Some((_, n)) => *n += 1,
            None => counts.push((s, 1)),
        }
    }
    counts
        .iter()
        .map(|(s, n)| format!("{}: {}", s, n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn report_errors(errors: &[ErrorRecord], report_path: Option<&Path>) -> Result<()> {
    if errors.is_empty() {
        println!("No errors.");
        return Ok(());
    }
    println!("Error report:");
    for e in errors {
        println!("  {}: {}", e.name, e.error);
    }
    if let Some(path) = report_path {
        let json = serde_json::to_vec_pretty(errors).context("serialize error report")?;
        storage::write_atomic(path, &json)?;
        println!("Error report written to {}", path.display());
    }
    Ok(())
}
