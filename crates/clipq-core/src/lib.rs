//! clipq core: queue remote videos, download them one at a time with retry,
//! then trim or convert with ffmpeg.

pub mod config;
pub mod control;
pub mod convert;
pub mod item;
pub mod logging;
pub mod observer;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod storage;
pub mod submit;
pub mod timecode;
pub mod transfer;
pub mod url_model;
pub mod ytdlp;
