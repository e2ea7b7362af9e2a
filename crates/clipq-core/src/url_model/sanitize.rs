//! Title → filename stem sanitization.

/// Characters that never make it into a filename stem.
const DISALLOWED: [char; 14] = ['~', '#', '%', '*', '{', '}', '\\', ':', '<', '>', '?', '/', '+', '|'];

/// Longest stem we produce, in bytes. Leaves room under NAME_MAX (255) for
/// ` - Copy` / `_TEMP` suffixes and the extension.
const STEM_MAX: usize = 200;

/// Sanitizes a stream title for use as a filename stem.
///
/// - `"` becomes `'`, `&` becomes `and`
/// - Drops `~ # % * { } \ : < > ? / + |` and control characters
/// - Trims leading/trailing spaces and dots
/// - Limits length to `STEM_MAX` bytes on a char boundary
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '"' => out.push('\''),
            '&' => out.push_str("and"),
            c if DISALLOWED.contains(&c) || c.is_control() => {}
            c => out.push(c),
        }
    }

    let trimmed = out.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.len() > STEM_MAX {
        let mut take = STEM_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].trim_end().to_string()
    } else {
        trimmed.to_string()
    }
}
