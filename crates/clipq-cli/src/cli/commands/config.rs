//! `clipq config` – show, locate or change settings.

use anyhow::{Context, Result};
use clipq_core::config::{self, ClipqConfig};
use std::path::Path;

use crate::cli::ConfigAction;

pub fn run_config(path: &Path, cfg: &ClipqConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print!("{}", config::render(cfg)?),
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Set { key, value } => {
            let (section, key) = split_key(&key)?;
            config::update_option(path, section, key, &value)?;
            println!("{}.{} = {}", section, key, value.trim());
        }
    }
    Ok(())
}

/// `format.default_format` → (`format`, `default_format`).
pub fn split_key(key: &str) -> Result<(&str, &str)> {
    key.split_once('.')
        .filter(|(s, k)| !s.is_empty() && !k.is_empty())
        .with_context(|| format!("expected SECTION.KEY, got '{}'", key))
}
