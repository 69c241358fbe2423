use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{JimakuError, Result};
use crate::task::ProgressSink;

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// A known whisper model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub filename: &'static str,
    pub size_mb: f64,
    pub description: &'static str,
    pub recommended: bool,
}

impl ModelInfo {
    pub fn url(&self) -> String {
        format!("{}/{}", MODEL_BASE_URL, self.filename)
    }
}

/// Model entry as reported to API clients
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub name: &'static str,
    pub filename: &'static str,
    pub size_mb: f64,
    pub description: &'static str,
    pub recommended: bool,
    pub downloaded: bool,
}

const KNOWN_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        filename: "ggml-tiny.bin",
        size_mb: 77.7,
        description: "Fastest, lowest accuracy",
        recommended: false,
    },
    ModelInfo {
        name: "base",
        filename: "ggml-base.bin",
        size_mb: 148.0,
        description: "Fast, basic accuracy",
        recommended: false,
    },
    ModelInfo {
        name: "small",
        filename: "ggml-small.bin",
        size_mb: 488.0,
        description: "Good speed/accuracy balance",
        recommended: false,
    },
    ModelInfo {
        name: "medium",
        filename: "ggml-medium.bin",
        size_mb: 1530.0,
        description: "High accuracy, slower",
        recommended: false,
    },
    ModelInfo {
        name: "large-v1",
        filename: "ggml-large-v1.bin",
        size_mb: 3090.0,
        description: "Highest accuracy, first large revision",
        recommended: false,
    },
    ModelInfo {
        name: "large-v2",
        filename: "ggml-large-v2.bin",
        size_mb: 3090.0,
        description: "Highest accuracy, second large revision",
        recommended: false,
    },
    ModelInfo {
        name: "large-v3",
        filename: "ggml-large-v3.bin",
        size_mb: 3100.0,
        description: "Highest accuracy, latest revision",
        recommended: true,
    },
];

/// Static catalog of whisper models plus the on-disk download state
pub struct ModelCatalog {
    models_dir: PathBuf,
    client: reqwest::Client,
}

impl ModelCatalog {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            client: reqwest::Client::new(),
        }
    }

    pub fn find(name: &str) -> Option<&'static ModelInfo> {
        KNOWN_MODELS.iter().find(|m| m.name == name)
    }

    pub fn local_path(&self, model: &ModelInfo) -> PathBuf {
        self.models_dir.join(model.filename)
    }

    pub fn is_downloaded(&self, model: &ModelInfo) -> bool {
        self.local_path(model).exists()
    }

    /// Every known model with its downloaded flag
    pub fn list(&self) -> Vec<ModelStatus> {
        KNOWN_MODELS
            .iter()
            .map(|m| ModelStatus {
                name: m.name,
                filename: m.filename,
                size_mb: m.size_mb,
                description: m.description,
                recommended: m.recommended,
                downloaded: self.is_downloaded(m),
            })
            .collect()
    }

    /// Download a model into the models directory, streaming to a temp file
    /// first so an interrupted download never leaves a truncated model behind.
    pub async fn download(&self, name: &str, progress: &dyn ProgressSink) -> Result<PathBuf> {
        let model =
            Self::find(name).ok_or_else(|| JimakuError::ModelNotFound(name.to_string()))?;
        let local_path = self.local_path(model);

        if local_path.exists() {
            info!("Model {} already present at {}", model.name, local_path.display());
            return Ok(local_path);
        }

        tokio::fs::create_dir_all(&self.models_dir).await?;
        info!("Downloading model {} ({:.0} MB)", model.name, model.size_mb);

        let response = self.client.get(model.url()).send().await?;
        if !response.status().is_success() {
            return Err(JimakuError::Transcribe(format!(
                "Model download failed for {}: HTTP {}",
                model.name,
                response.status()
            )));
        }

        let total = response
            .content_length()
            .unwrap_or((model.size_mb * 1_000_000.0) as u64);

        let temp_path = local_path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if total > 0 {
                let percent = (downloaded as f32 / total as f32) * 100.0;
                progress
                    .report(percent, &format!("Downloading model {}", model.name))
                    .await;
            }
        }

        file.flush().await?;
        drop(file);
        tokio::fs::rename(&temp_path, &local_path).await?;

        info!("Model {} saved to {}", model.name, local_path.display());
        Ok(local_path)
    }

    /// Delete a downloaded model. Returns false when the file was not present.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let model =
            Self::find(name).ok_or_else(|| JimakuError::ModelNotFound(name.to_string()))?;
        let local_path = self.local_path(model);

        if !local_path.exists() {
            return Ok(false);
        }

        tokio::fs::remove_file(&local_path).await?;
        info!("Removed model {}", model.name);
        Ok(true)
    }

    /// Resolve a model name to the path passed to the whisper binary,
    /// falling back to smaller models that are actually on disk.
    pub fn resolve(&self, preferred: &str) -> Result<PathBuf> {
        if let Some(model) = Self::find(preferred) {
            let path = self.local_path(model);
            if path.exists() {
                return Ok(path);
            }
        }

        for fallback in ["base", "tiny"] {
            if let Some(model) = Self::find(fallback) {
                let path = self.local_path(model);
                if path.exists() {
                    warn!("Model '{}' not downloaded, using '{}'", preferred, fallback);
                    return Ok(path);
                }
            }
        }

        Err(JimakuError::ModelNotFound(preferred.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_knows_standard_models() {
        assert!(ModelCatalog::find("large-v3").is_some());
        assert!(ModelCatalog::find("tiny").is_some());
        assert!(ModelCatalog::find("gigantic").is_none());
    }

    #[test]
    fn model_urls_point_at_ggml_files() {
        let model = ModelCatalog::find("base").unwrap();
        assert_eq!(
            model.url(),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin"
        );
    }

    #[test]
    fn list_reports_downloaded_state() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ModelCatalog::new(dir.path());
        std::fs::write(dir.path().join("ggml-tiny.bin"), b"stub").unwrap();

        let listed = catalog.list();
        let tiny = listed.iter().find(|m| m.name == "tiny").unwrap();
        let base = listed.iter().find(|m| m.name == "base").unwrap();
        assert!(tiny.downloaded);
        assert!(!base.downloaded);
    }

    #[test]
    fn resolve_falls_back_to_downloaded_model() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ModelCatalog::new(dir.path());
        std::fs::write(dir.path().join("ggml-base.bin"), b"stub").unwrap();

        let resolved = catalog.resolve("large-v3").unwrap();
        assert!(resolved.ends_with("ggml-base.bin"));
    }

    #[tokio::test]
    async fn remove_missing_model_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ModelCatalog::new(dir.path());
        assert!(!catalog.remove("tiny").await.unwrap());
        assert!(catalog.remove("unknown").await.is_err());
    }
}
