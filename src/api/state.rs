use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::download::{DownloaderFactory, YtDlp};
use crate::media::{FfmpegProcessor, MediaProcessor};
use crate::pipeline::SubtitlePipeline;
use crate::task::TaskManager;
use crate::transcribe::{ModelCatalog, WhisperCli};
use crate::translate::FallbackTranslator;

/// Shared service handles for the HTTP layer
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tasks: Arc<TaskManager>,
    pub pipeline: Arc<SubtitlePipeline>,
    pub factory: Arc<DownloaderFactory>,
    pub ytdlp: Arc<YtDlp>,
    pub models: Arc<ModelCatalog>,
    pub media: Arc<dyn MediaProcessor>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the full service graph from configuration
    pub fn new(config: Config) -> crate::error::Result<Self> {
        let config = Arc::new(config);
        let tasks = Arc::new(TaskManager::new(std::time::Duration::from_secs(
            config.tasks.retention_secs,
        )));
        let factory = Arc::new(DownloaderFactory::new());
        let ytdlp = Arc::new(YtDlp::new(config.download.clone()));
        let models = Arc::new(ModelCatalog::new(&config.storage.models_dir));
        let media: Arc<dyn MediaProcessor> =
            Arc::new(FfmpegProcessor::new(config.media.clone()));
        let transcriber = Arc::new(WhisperCli::new(
            config.transcriber.clone(),
            Arc::clone(&models),
        ));
        let translator = Arc::new(FallbackTranslator::from_config(&config.translate)?);

        let pipeline = Arc::new(SubtitlePipeline::new(
            Arc::clone(&config),
            Arc::clone(&ytdlp),
            Arc::clone(&factory),
            transcriber,
            translator,
            Arc::clone(&media),
        ));

        Ok(Self {
            config,
            tasks,
            pipeline,
            factory,
            ytdlp,
            models,
            media,
            started_at: Utc::now(),
        })
    }
}
