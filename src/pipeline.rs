// Subtitle pipeline orchestration
//
// Thin coordination over the download, media, transcribe and translate
// modules. Each stage owns a slice of the overall progress range and reports
// through the task's progress sink; intermediate files are tracked and
// removed whether the pipeline succeeds or fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::download::{DownloadOptions, DownloaderFactory, YtDlp};
use crate::error::{JimakuError, Result};
use crate::media::{BurnStyle, MediaProcessor};
use crate::subtitle::{self, SubtitleDocument};
use crate::task::{ProgressSink, ScaledProgress, TaskOutcome};
use crate::tempfiles::TempFileTracker;
use crate::transcribe::{TranscribeOptions, Transcriber};
use crate::translate::{self, Translator};

/// Request-level options for subtitle generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Whisper model name, None for the configured default
    pub model: Option<String>,
    /// Source language hint, None for auto-detection
    pub source_language: Option<String>,
    /// Target language for translation, None to keep the transcription as-is
    pub target_language: Option<String>,
    /// Keep the downloaded video next to the subtitles (URL flow only)
    pub keep_video: bool,
}

pub struct SubtitlePipeline {
    config: Arc<Config>,
    ytdlp: Arc<YtDlp>,
    factory: Arc<DownloaderFactory>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    media: Arc<dyn MediaProcessor>,
}

impl SubtitlePipeline {
    pub fn new(
        config: Arc<Config>,
        ytdlp: Arc<YtDlp>,
        factory: Arc<DownloaderFactory>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        media: Arc<dyn MediaProcessor>,
    ) -> Self {
        Self {
            config,
            ytdlp,
            factory,
            transcriber,
            translator,
            media,
        }
    }

    /// Generate subtitles for a local video file:
    /// extract audio (5-20%) -> transcribe (20-70%) -> translate (70-95%) ->
    /// write SRT, then remove intermediate files.
    pub async fn generate_from_file(
        &self,
        video_path: PathBuf,
        options: GenerateOptions,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome> {
        if !video_path.exists() {
            return Err(JimakuError::FileNotFound(video_path.display().to_string()));
        }

        let tracker = TempFileTracker::new();
        let result = self
            .generate_stages(&video_path, &options, progress, &tracker)
            .await;
        tracker.cleanup().await;
        result
    }

    /// Generate subtitles straight from a video URL: download via yt-dlp
    /// (0-40%), then the file pipeline scaled into 40-95%.
    pub async fn generate_from_url(
        &self,
        url: String,
        download_options: DownloadOptions,
        options: GenerateOptions,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome> {
        let tracker = TempFileTracker::new();
        let result = self
            .generate_from_url_inner(&url, download_options, &options, progress, &tracker)
            .await;
        tracker.cleanup().await;
        result
    }

    async fn generate_from_url_inner(
        &self,
        url: &str,
        mut download_options: DownloadOptions,
        options: &GenerateOptions,
        progress: &dyn ProgressSink,
        tracker: &TempFileTracker,
    ) -> Result<TaskOutcome> {
        download_options.output_dir = if options.keep_video {
            self.config.storage.files_dir.clone()
        } else {
            self.config.storage.temp_dir.clone()
        };

        let platform = self.factory.get(url);
        let download_progress = ScaledProgress::new(progress, 0.0, 40.0);
        let video_path = self
            .ytdlp
            .download(url, &download_options, platform, &download_progress)
            .await?;

        if !options.keep_video {
            tracker.register(&video_path);
        }

        let scaled = ScaledProgress::new(progress, 40.0, 100.0);
        self.generate_stages(&video_path, options, &scaled, tracker)
            .await
    }

    async fn generate_stages(
        &self,
        video_path: &Path,
        options: &GenerateOptions,
        progress: &dyn ProgressSink,
        tracker: &TempFileTracker,
    ) -> Result<TaskOutcome> {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "subtitles".to_string());

        progress.report(5.0, "Extracting audio").await;
        let audio_path = self
            .config
            .storage
            .temp_dir
            .join(format!("{}_{}.wav", stem, uuid::Uuid::new_v4().simple()));
        tracker.register(&audio_path);
        self.media.extract_audio(video_path, &audio_path).await?;

        progress.report(20.0, "Transcribing audio").await;
        let transcribe_options = TranscribeOptions {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.transcriber.default_model.clone()),
            language: options.source_language.clone(),
        };
        let transcribe_progress = ScaledProgress::new(progress, 20.0, 70.0);
        let document = self
            .transcriber
            .transcribe(&audio_path, &transcribe_options, &transcribe_progress)
            .await?;

        if document.is_empty() {
            return Err(JimakuError::Transcribe(
                "Transcription produced no speech segments".to_string(),
            ));
        }

        let (document, language_suffix) = match &options.target_language {
            Some(target) => {
                progress.report(70.0, "Translating subtitles").await;
                let translated = self
                    .translate_stage(&document, options.source_language.as_deref(), target, progress)
                    .await?;
                (translated, Some(target.clone()))
            }
            None => (document, None),
        };

        progress.report(95.0, "Writing subtitle file").await;
        let output_name = match &language_suffix {
            Some(lang) => format!("{}.{}.srt", stem, lang),
            None => format!("{}.srt", stem),
        };
        let output_path = self.config.storage.files_dir.join(output_name);
        subtitle::write_srt(&document, &output_path).await?;

        info!("Subtitle generation finished: {}", output_path.display());
        Ok(TaskOutcome {
            output_file: Some(output_path),
            detail: Some(serde_json::json!({
                "cues": document.cues.len(),
                "language": document.language,
                "duration": document.duration(),
            })),
        })
    }

    async fn translate_stage(
        &self,
        document: &SubtitleDocument,
        source_language: Option<&str>,
        target_language: &str,
        progress: &dyn ProgressSink,
    ) -> Result<SubtitleDocument> {
        let source = source_language
            .or(document.language.as_deref())
            .unwrap_or("auto");
        let translate_progress = ScaledProgress::new(progress, 70.0, 95.0);
        translate::translate_document(
            self.translator.as_ref(),
            document,
            source,
            target_language,
            self.config.translate.batch_size,
            &translate_progress,
        )
        .await
    }

    /// Translate an existing SRT file into `<stem>.<lang>.srt`
    pub async fn translate_file(
        &self,
        subtitle_path: PathBuf,
        source_language: Option<String>,
        target_language: String,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome> {
        progress.report(5.0, "Reading subtitle file").await;
        let document = subtitle::read_srt(&subtitle_path).await?;
        if document.is_empty() {
            return Err(JimakuError::Subtitle(
                "Subtitle file contains no cues".to_string(),
            ));
        }

        let source = source_language.as_deref().unwrap_or("auto");
        let translate_progress = ScaledProgress::new(progress, 10.0, 90.0);
        let translated = translate::translate_document(
            self.translator.as_ref(),
            &document,
            source,
            &target_language,
            self.config.translate.batch_size,
            &translate_progress,
        )
        .await?;

        progress.report(95.0, "Writing translated file").await;
        let output_name = subtitle::translated_filename(&subtitle_path, &target_language);
        let output_path = self.config.storage.files_dir.join(output_name);
        subtitle::write_srt(&translated, &output_path).await?;

        Ok(TaskOutcome {
            output_file: Some(output_path),
            detail: Some(serde_json::json!({
                "cues": translated.cues.len(),
                "target_language": target_language,
            })),
        })
    }

    /// Hard-burn a subtitle file into a video
    pub async fn burn(
        &self,
        video_path: PathBuf,
        subtitle_path: PathBuf,
        style: BurnStyle,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome> {
        for path in [&video_path, &subtitle_path] {
            if !path.exists() {
                return Err(JimakuError::FileNotFound(path.display().to_string()));
            }
        }

        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        let output_path = self
            .config
            .storage
            .files_dir
            .join(format!("{}_subtitled.mp4", stem));

        progress.report(10.0, "Burning subtitles").await;
        self.media
            .burn_subtitles(&video_path, &subtitle_path, &output_path, &style)
            .await?;

        progress.report(100.0, "Burn complete").await;
        Ok(TaskOutcome {
            output_file: Some(output_path),
            detail: None,
        })
    }

    /// Plain video download task (no subtitle work)
    pub async fn download_only(
        &self,
        url: String,
        mut download_options: DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome> {
        download_options.output_dir = self.config.storage.files_dir.clone();
        let platform = self.factory.get(&url);
        let video_path = self
            .ytdlp
            .download(&url, &download_options, platform, progress)
            .await?;

        Ok(TaskOutcome {
            output_file: Some(video_path),
            detail: Some(serde_json::json!({
                "platform": platform.platform_name(),
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::SubtitleCue;
    use crate::task::NullProgress;
    use async_trait::async_trait;

    struct FixedTranscriber;

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(
            &self,
            _audio_path: &Path,
            _options: &TranscribeOptions,
            _progress: &dyn ProgressSink,
        ) -> Result<SubtitleDocument> {
            Ok(SubtitleDocument {
                cues: vec![SubtitleCue {
                    index: 1,
                    start: 0.0,
                    end: 1.0,
                    text: "hello".to_string(),
                }],
                language: Some("en".to_string()),
            })
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }
    }

    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        async fn translate(
            &self,
            texts: &[String],
            _source: &str,
            target: &str,
        ) -> Result<Vec<String>> {
            Ok(texts.iter().map(|t| format!("{}:{}", target, t)).collect())
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    struct NoopMedia;

    #[async_trait]
    impl MediaProcessor for NoopMedia {
        async fn extract_audio(&self, _video: &Path, audio: &Path) -> Result<()> {
            std::fs::write(audio, b"wav")?;
            Ok(())
        }

        async fn burn_subtitles(
            &self,
            _video: &Path,
            _subs: &Path,
            output: &Path,
            _style: &BurnStyle,
        ) -> Result<()> {
            std::fs::write(output, b"mp4")?;
            Ok(())
        }

        async fn mux_subtitles(&self, _video: &Path, _subs: &Path, output: &Path) -> Result<()> {
            std::fs::write(output, b"mp4")?;
            Ok(())
        }

        async fn probe_duration(&self, _media: &Path) -> Result<f64> {
            Ok(1.0)
        }

        async fn check_availability(&self) -> Result<String> {
            Ok("test".to_string())
        }
    }

    fn pipeline_with_dirs(dir: &Path) -> SubtitlePipeline {
        let mut config = Config::default();
        config.storage.files_dir = dir.join("files");
        config.storage.temp_dir = dir.join("temp");
        std::fs::create_dir_all(&config.storage.files_dir).unwrap();
        std::fs::create_dir_all(&config.storage.temp_dir).unwrap();
        let download = config.download.clone();
        SubtitlePipeline::new(
            Arc::new(config),
            Arc::new(YtDlp::new(download)),
            Arc::new(DownloaderFactory::new()),
            Arc::new(FixedTranscriber),
            Arc::new(EchoTranslator),
            Arc::new(NoopMedia),
        )
    }

    #[tokio::test]
    async fn generates_srt_and_cleans_temp_audio() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with_dirs(dir.path());

        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let outcome = pipeline
            .generate_from_file(video, GenerateOptions::default(), &NullProgress)
            .await
            .unwrap();

        let output = outcome.output_file.unwrap();
        assert!(output.ends_with("clip.srt"));
        assert!(output.exists());

        // extracted audio is removed after the run
        let temp_entries: Vec<_> = std::fs::read_dir(dir.path().join("temp"))
            .unwrap()
            .collect();
        assert!(temp_entries.is_empty());
    }

    #[tokio::test]
    async fn translation_changes_output_name_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with_dirs(dir.path());

        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let options = GenerateOptions {
            target_language: Some("zh-cn".to_string()),
            ..GenerateOptions::default()
        };
        let outcome = pipeline
            .generate_from_file(video, options, &NullProgress)
            .await
            .unwrap();

        let output = outcome.output_file.unwrap();
        assert!(output.ends_with("clip.zh-cn.srt"));
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("zh-cn:hello"));
    }

    #[tokio::test]
    async fn translate_file_produces_language_suffixed_output() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with_dirs(dir.path());

        let srt = dir.path().join("movie.srt");
        std::fs::write(&srt, "1\n00:00:01,000 --> 00:00:02,000\nhello\n\n").unwrap();

        let outcome = pipeline
            .translate_file(srt, None, "ja".to_string(), &NullProgress)
            .await
            .unwrap();

        let output = outcome.output_file.unwrap();
        assert!(output.ends_with("movie.ja.srt"));
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("ja:hello"));
    }

    #[tokio::test]
    async fn burn_rejects_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with_dirs(dir.path());

        let err = pipeline
            .burn(
                dir.path().join("missing.mp4"),
                dir.path().join("missing.srt"),
                BurnStyle::default(),
                &NullProgress,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JimakuError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn missing_video_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with_dirs(dir.path());

        let err = pipeline
            .generate_from_file(
                dir.path().join("nope.mp4"),
                GenerateOptions::default(),
                &NullProgress,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JimakuError::FileNotFound(_)));
    }
}
