use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{JimakuError, Result};

use super::Translator;

/// Translator backed by the public single-request translation endpoint
/// (`translate_a/single` with `client=gtx`). Texts are translated one by one;
/// the response is a nested JSON array whose first element holds the
/// translated sentence fragments.
pub struct HttpTranslator {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.http_endpoint.clone(),
            client,
        })
    }

    async fn translate_one(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(JimakuError::Translation(format!(
                "Translation endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        extract_translation(&body).ok_or_else(|| {
            JimakuError::Translation("Unexpected translation response shape".to_string())
        })
    }
}

/// Pull the translated text out of the `[[["hola","hello",...],...],...]`
/// response array
fn extract_translation(body: &Value) -> Option<String> {
    let sentences = body.as_array()?.first()?.as_array()?;
    let mut translated = String::new();
    for sentence in sentences {
        if let Some(fragment) = sentence.as_array().and_then(|s| s.first()).and_then(Value::as_str)
        {
            translated.push_str(fragment);
        }
    }
    if translated.is_empty() {
        None
    } else {
        Some(translated)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            if text.trim().is_empty() {
                results.push(text.clone());
                continue;
            }
            let translated = self
                .translate_one(text, source_language, target_language)
                .await?;
            debug!("Translated {:?} -> {:?}", text, translated);
            results.push(translated);
        }
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_translation_from_nested_array() {
        let body: Value = serde_json::from_str(
            r#"[[["你好","hello",null,null,10],["世界","world",null,null,10]],null,"en"]"#,
        )
        .unwrap();
        assert_eq!(extract_translation(&body).unwrap(), "你好世界");
    }

    #[test]
    fn rejects_malformed_responses() {
        assert!(extract_translation(&Value::Null).is_none());
        assert!(extract_translation(&serde_json::json!({"error": true})).is_none());
        assert!(extract_translation(&serde_json::json!([[]])).is_none());
    }
}
