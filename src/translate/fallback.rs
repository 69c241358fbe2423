use async_trait::async_trait;
use tracing::warn;

use crate::config::TranslateConfig;
use crate::error::{JimakuError, Result};

use super::{HttpTranslator, LocalTranslator, Translator};

/// Ordered chain of translators. Each link is retried up to `max_retries`
/// times before the chain falls through to the next one; the request fails
/// only when every link is exhausted.
pub struct FallbackTranslator {
    chain: Vec<Box<dyn Translator>>,
    max_retries: u32,
}

impl FallbackTranslator {
    pub fn new(chain: Vec<Box<dyn Translator>>, max_retries: u32) -> Self {
        Self {
            chain,
            max_retries: max_retries.max(1),
        }
    }

    /// Standard chain from configuration: local service first, public HTTP
    /// endpoint as fallback when enabled
    pub fn from_config(config: &TranslateConfig) -> Result<Self> {
        let mut chain: Vec<Box<dyn Translator>> = vec![Box::new(LocalTranslator::new(config)?)];
        if config.fallback_enabled {
            chain.push(Box::new(HttpTranslator::new(config)?));
        }
        Ok(Self::new(chain, config.max_retries))
    }
}

#[async_trait]
impl Translator for FallbackTranslator {
    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        let mut last_error: Option<JimakuError> = None;

        for translator in &self.chain {
            for attempt in 1..=self.max_retries {
                match translator
                    .translate(texts, source_language, target_language)
                    .await
                {
                    Ok(results) => return Ok(results),
                    Err(e) => {
                        warn!(
                            "Translator '{}' failed (attempt {}/{}): {}",
                            translator.name(),
                            attempt,
                            self.max_retries,
                            e
                        );
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| JimakuError::Translation("No translators configured".to_string())))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl Translator for Flaky {
        async fn translate(
            &self,
            texts: &[String],
            _source: &str,
            _target: &str,
        ) -> Result<Vec<String>> {
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
            {
                return Err(JimakuError::Translation("temporary".to_string()));
            }
            Ok(texts.to_vec())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Translator for AlwaysFails {
        async fn translate(
            &self,
            _texts: &[String],
            _source: &str,
            _target: &str,
        ) -> Result<Vec<String>> {
            Err(JimakuError::Translation("down".to_string()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn retries_before_falling_through() {
        let chain = FallbackTranslator::new(
            vec![Box::new(Flaky {
                failures_left: AtomicU32::new(2),
            })],
            3,
        );
        let out = chain
            .translate(&["hi".to_string()], "en", "ja")
            .await
            .unwrap();
        assert_eq!(out, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn falls_through_to_next_translator() {
        let chain = FallbackTranslator::new(
            vec![
                Box::new(AlwaysFails),
                Box::new(Flaky {
                    failures_left: AtomicU32::new(0),
                }),
            ],
            2,
        );
        let out = chain
            .translate(&["hi".to_string()], "en", "ja")
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_last_error() {
        let chain = FallbackTranslator::new(vec![Box::new(AlwaysFails)], 2);
        let err = chain
            .translate(&["hi".to_string()], "en", "ja")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("down"));
    }
}
