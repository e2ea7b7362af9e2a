//! URL checks and filename derivation.
//!
//! Derives safe local filename stems from stream titles and picks
//! destination paths that do not collide with files already on disk.

mod path;
mod sanitize;

pub use path::{unique_media_paths, MediaPaths, COPY_SUFFIX, TEMP_MARKER};
pub use sanitize::sanitize_title;

/// Stem used when a title sanitizes down to nothing.
const DEFAULT_STEM: &str = "download";

/// Parses a user-supplied URL. Only absolute `http`/`https` URLs with a host are accepted.
pub fn parse_media_url(raw: &str) -> Option<url::Url> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    (scheme_ok && parsed.host_str().is_some()).then_some(parsed)
}

/// Filename stem for a stream title: sanitized, or `download` if nothing usable remains.
pub fn title_stem(raw_title: &str) -> String {
    let sanitized = sanitize_title(raw_title);
    if sanitized.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        sanitized
    }
}
