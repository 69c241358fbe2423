use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{JimakuError, Result};

use super::Translator;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    texts: &'a [String],
    source: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<String>,
}

/// Translator backed by a local translation service (an offline model server
/// exposing a small JSON API)
pub struct LocalTranslator {
    endpoint: String,
    client: reqwest::Client,
}

impl LocalTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/translate", config.local_endpoint.trim_end_matches('/')),
            client,
        })
    }

    /// Probe the service without translating anything
    pub async fn check_availability(&self) -> Result<()> {
        let empty: Vec<String> = Vec::new();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TranslateRequest {
                texts: &empty,
                source: "en",
                target: "en",
            })
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(JimakuError::Translation(format!(
                "Local translation service returned HTTP {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl Translator for LocalTranslator {
    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        debug!(
            "Local translation of {} texts {} -> {}",
            texts.len(),
            source_language,
            target_language
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&TranslateRequest {
                texts,
                source: source_language,
                target: target_language,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(JimakuError::Translation(format!(
                "Local translation service returned HTTP {}",
                response.status()
            )));
        }

        let body: TranslateResponse = response.json().await?;
        if body.translations.len() != texts.len() {
            return Err(JimakuError::Translation(format!(
                "Local translation service returned {} texts for {} inputs",
                body.translations.len(),
                texts.len()
            )));
        }

        Ok(body.translations)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
