// ffmpeg/ffprobe subprocess wrappers
//
// Commands are assembled through MediaCommand so every invocation logs the
// same way and captures stderr on failure.

pub mod commands;
pub mod processor;

pub use commands::{MediaCommand, MediaCommandBuilder};
pub use processor::{BurnStyle, FfmpegProcessor, MediaProcessor};
