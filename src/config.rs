use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{JimakuError, Result};

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_task_retention_secs() -> u64 {
    86400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub download: DownloadConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
    pub tasks: TaskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Allowed CORS origins, "*" for any
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for uploaded and produced files
    pub files_dir: PathBuf,
    /// Directory for intermediate artifacts (extracted audio, raw subtitles)
    pub temp_dir: PathBuf,
    /// Directory for downloaded whisper models
    pub models_dir: PathBuf,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Path to yt-dlp binary
    pub binary_path: String,
    /// Default quality when the request does not specify one
    pub default_quality: String,
    /// Default container format
    pub default_format: String,
    /// Retries passed to yt-dlp
    pub retries: u32,
    /// Extractor retries passed to yt-dlp
    pub extractor_retries: u32,
    /// Optional HTTP proxy forwarded to yt-dlp
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to whisper binary (e.g. whisper-cli)
    pub binary_path: String,
    /// Default model when the request does not specify one
    pub default_model: String,
    /// Fallback language when detection fails
    pub fallback_language: String,
    /// Sampling temperature for transcription
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Endpoint of the local translation service
    pub local_endpoint: String,
    /// Endpoint of the HTTP fallback translation API
    pub http_endpoint: String,
    /// Maximum retries per translator before falling through the chain
    pub max_retries: u32,
    /// Whether the HTTP fallback is used when the local service fails
    pub fallback_enabled: bool,
    /// Default target language
    pub default_target_language: String,
    /// Cues per translation request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Additional encoding options for subtitle burning
    pub burn_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Seconds a terminal task is kept before the sweeper removes it
    #[serde(default = "default_task_retention_secs")]
    pub retention_secs: u64,
    /// Seconds between maintenance sweeps
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                allowed_origins: vec!["*".to_string()],
            },
            storage: StorageConfig {
                files_dir: data_dir.join("files"),
                temp_dir: data_dir.join("temp"),
                models_dir: data_dir.join("models"),
                log_dir: data_dir.join("log"),
            },
            download: DownloadConfig {
                binary_path: "yt-dlp".to_string(),
                default_quality: "best".to_string(),
                default_format: "mp4".to_string(),
                retries: 10,
                extractor_retries: 3,
                proxy: None,
            },
            transcriber: TranscriberConfig {
                binary_path: "whisper-cli".to_string(),
                default_model: "large-v3".to_string(),
                fallback_language: "en".to_string(),
                temperature: 0.0,
            },
            translate: TranslateConfig {
                local_endpoint: "http://localhost:5000".to_string(),
                http_endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
                max_retries: 3,
                fallback_enabled: true,
                default_target_language: "zh-cn".to_string(),
                batch_size: 20,
                timeout_secs: 300,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                burn_options: vec![],
            },
            tasks: TaskConfig {
                retention_secs: default_task_retention_secs(),
                cleanup_interval_secs: default_cleanup_interval_secs(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JimakuError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| JimakuError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| JimakuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| JimakuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Create every directory the service writes to
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.storage.files_dir,
            &self.storage.temp_dir,
            &self.storage.models_dir,
            &self.storage.log_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
