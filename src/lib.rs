//! Jimaku - Video Download & AI Subtitle Web Backend
//!
//! A web service that orchestrates yt-dlp, whisper, translation services and
//! ffmpeg behind a REST/WebSocket API: download videos, generate subtitles,
//! translate them, and burn them back into the video.

pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod subtitle;
pub mod task;
pub mod tempfiles;
pub mod transcribe;
pub mod translate;
