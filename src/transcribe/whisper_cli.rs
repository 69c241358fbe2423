use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{JimakuError, Result};
use crate::subtitle::{SubtitleCue, SubtitleDocument};
use crate::task::ProgressSink;

use super::models::ModelCatalog;
use super::{TranscribeOptions, Transcriber};

/// JSON document the whisper CLI writes alongside the audio
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[allow(dead_code)]
    text: String,
    segments: Vec<WhisperSegment>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Transcriber backed by a whisper CLI binary writing JSON output
pub struct WhisperCli {
    config: TranscriberConfig,
    models: Arc<ModelCatalog>,
}

impl WhisperCli {
    pub fn new(config: TranscriberConfig, models: Arc<ModelCatalog>) -> Self {
        Self { config, models }
    }

    /// Pass a downloaded ggml model by path; unknown or missing models fall
    /// through as bare names for binaries that manage their own model cache.
    fn model_argument(&self, name: &str) -> String {
        match self.models.resolve(name) {
            Ok(path) => path.to_string_lossy().to_string(),
            Err(_) => name.to_string(),
        }
    }

    /// Apply the configured language when detection reported nothing
    fn fill_language(&self, document: &mut SubtitleDocument) {
        if document.language.is_none() {
            document.language = Some(self.config.fallback_language.clone());
        }
    }

    fn to_document(output: WhisperOutput) -> SubtitleDocument {
        let cues = output
            .segments
            .into_iter()
            .filter(|seg| !seg.text.trim().is_empty())
            .enumerate()
            .map(|(i, seg)| SubtitleCue {
                index: i + 1,
                start: seg.start,
                end: seg.end,
                text: seg.text.trim().to_string(),
            })
            .collect();

        SubtitleDocument {
            cues,
            language: output.language,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        progress: &dyn ProgressSink,
    ) -> Result<SubtitleDocument> {
        info!(
            "Transcribing {} with model {}",
            audio_path.display(),
            options.model
        );
        progress.report(0.0, "Starting transcription").await;

        let temp_dir = tempfile::tempdir()
            .map_err(|e| JimakuError::Transcribe(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(audio_path)
            .arg("--model")
            .arg(self.model_argument(&options.model))
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--temperature")
            .arg(self.config.temperature.to_string());

        if let Some(lang) = &options.language {
            cmd.arg("--language").arg(lang);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| JimakuError::Transcribe(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Transcribe(format!(
                "Whisper failed: {}",
                stderr.trim()
            )));
        }

        progress.report(90.0, "Parsing transcription output").await;

        let audio_stem = audio_path
            .file_stem()
            .ok_or_else(|| JimakuError::Transcribe("Invalid audio filename".to_string()))?;
        let json_file = output_dir.join(format!("{}.json", audio_stem.to_string_lossy()));

        let json_content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| JimakuError::Transcribe(format!("Failed to read whisper output: {}", e)))?;

        let parsed: WhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| JimakuError::Transcribe(format!("Failed to parse whisper JSON: {}", e)))?;

        let mut document = Self::to_document(parsed);
        self.fill_language(&mut document);
        debug!(
            "Transcription produced {} cues, language {:?}",
            document.cues.len(),
            document.language
        );
        progress.report(100.0, "Transcription complete").await;
        Ok(document)
    }

    async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| JimakuError::Transcribe(format!("Whisper binary not found: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(JimakuError::Transcribe(
                "Whisper binary is present but not runnable".to_string(),
            ))
        }
    }
}
