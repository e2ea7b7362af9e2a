//! `clipq formats` – list the supported output formats.

use clipq_core::config::ClipqConfig;

pub fn run_formats(cfg: &ClipqConfig) {
    let show = |list: Vec<String>| {
        if list.is_empty() {
            "-".to_string()
        } else {
            list.join(", ")
        }
    };
    println!("{:<16} {}", "audio+video", show(cfg.audio_and_video_formats()));
    println!("{:<16} {}", "audio only", show(cfg.audio_only_formats()));
    println!("{:<16} {}", "video only", show(cfg.video_only_formats()));
    println!("{:<16} {}", "default", cfg.format.default_format);
}
