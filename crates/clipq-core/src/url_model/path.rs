//! Collision-free destination paths.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to the stem until the final file name is free.
pub const COPY_SUFFIX: &str = " - Copy";
/// Suffix appended to the temp stem until the temp file name is free.
pub const TEMP_MARKER: &str = "_TEMP";

/// Final and (optional) temp destination for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPaths {
    pub final_path: PathBuf,
    pub temp_path: Option<PathBuf>,
}

fn with_ext(base: &OsString, ext: &str) -> PathBuf {
    let mut s = base.clone();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Picks `dir/stem.ext`, appending ` - Copy` to the stem until nothing on disk
/// (or in `reserved`) has that name. When `temp_ext` is set, also picks a temp
/// path `<final stem>_TEMP.<temp_ext>`, appending `_TEMP` until free.
pub fn unique_media_paths(
    dir: &Path,
    stem: &str,
    ext: &str,
    temp_ext: Option<&str>,
    reserved: &[PathBuf],
) -> MediaPaths {
    let taken = |p: &Path| p.exists() || reserved.iter().any(|r| r == p);

    let mut base: OsString = dir.join(stem).into_os_string();
    while taken(&with_ext(&base, ext)) {
        base.push(COPY_SUFFIX);
    }
    let final_path = with_ext(&base, ext);

    let temp_path = temp_ext.map(|temp_ext| {
        let mut temp_base = base.clone();
        temp_base.push(TEMP_MARKER);
        while taken(&with_ext(&temp_base, temp_ext)) {
            temp_base.push(TEMP_MARKER);
        }
        with_ext(&temp_base, temp_ext)
    });

    MediaPaths {
        final_path,
        temp_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_name_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let p = unique_media_paths(dir.path(), "Song", "mp3", None, &[]);
        assert_eq!(p.final_path, dir.path().join("Song.mp3"));
        assert!(p.temp_path.is_none());
    }

    #[test]
    fn copy_suffix_grows_until_free() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("Song - Copy.mp3"), b"").unwrap();
        let p = unique_media_paths(dir.path(), "Song", "mp3", None, &[]);
        assert_eq!(p.final_path, dir.path().join("Song - Copy - Copy.mp3"));
    }

    #[test]
    fn reserved_paths_count_as_taken() {
        let dir = tempfile::tempdir().unwrap();
        let reserved = vec![dir.path().join("Song.mp3")];
        let p = unique_media_paths(dir.path(), "Song", "mp3", None, &reserved);
        assert_eq!(p.final_path, dir.path().join("Song - Copy.mp3"));
    }

    #[test]
    fn temp_path_uses_temp_ext_and_grows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song_TEMP.webm"), b"").unwrap();
        let p = unique_media_paths(dir.path(), "Song", "mp3", Some("webm"), &[]);
        assert_eq!(p.final_path, dir.path().join("Song.mp3"));
        assert_eq!(p.temp_path, Some(dir.path().join("Song_TEMP_TEMP.webm")));
    }

    #[test]
    fn same_ext_temp_differs_from_final() {
        let dir = tempfile::tempdir().unwrap();
        let p = unique_media_paths(dir.path(), "Clip", "mp4", Some("mp4"), &[]);
        assert_eq!(p.temp_path, Some(dir.path().join("Clip_TEMP.mp4")));
        assert_ne!(p.temp_path.as_ref(), Some(&p.final_path));
    }
}
