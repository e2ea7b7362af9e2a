//! `clipq sessions` – list saved session files, oldest first.

use anyhow::Result;
use clipq_core::config::ClipqConfig;
use clipq_core::session;

pub fn run_sessions(cfg: &ClipqConfig) -> Result<()> {
    let dir = cfg.sessions_dir()?;
    let files = session::list_sessions(&dir)?;
    if files.is_empty() {
        println!("No sessions in {}.", dir.display());
        return Ok(());
    }
    println!("{:<8} {}", "ITEMS", "FILE");
    for path in files {
        let count = match session::load(&path) {
            Ok(entries) => entries.len().to_string(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "unreadable session: {:#}", e);
                "?".to_string()
            }
        };
        println!("{:<8} {}", count, path.display());
    }
    Ok(())
}
