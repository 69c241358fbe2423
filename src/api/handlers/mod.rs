pub mod downloads;
pub mod subtitles;
pub mod system;
pub mod tasks;
