// Speech-to-text behind an external whisper CLI
//
// The service never links a model runtime; transcription is delegated to a
// configured whisper binary that writes JSON output, which is parsed into a
// SubtitleDocument here.

pub mod models;
pub mod whisper_cli;

use async_trait::async_trait;
use std::path::Path;

pub use models::ModelCatalog;
pub use whisper_cli::WhisperCli;

use crate::error::Result;
use crate::subtitle::SubtitleDocument;
use crate::task::ProgressSink;

/// Transcription options for a single request
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Model name, e.g. "base" or "large-v3"
    pub model: String,
    /// Source language hint, None for auto-detection
    pub language: Option<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into timed cues
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        progress: &dyn ProgressSink,
    ) -> Result<SubtitleDocument>;

    /// Verify the backing binary is usable
    async fn check_availability(&self) -> Result<()>;
}
