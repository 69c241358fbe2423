// Translation behind HTTP services
//
// Two implementations share one trait: a local translation service (offline
// model server) and a public HTTP API. A fallback chain tries each in order
// with per-translator retries so a flaky local service degrades gracefully.

pub mod fallback;
pub mod http;
pub mod local;

use async_trait::async_trait;

pub use fallback::FallbackTranslator;
pub use http::HttpTranslator;
pub use local::LocalTranslator;

use crate::error::Result;
use crate::subtitle::SubtitleDocument;
use crate::task::ProgressSink;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a batch of texts, preserving order and count
    async fn translate(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// Languages accepted by the translation endpoints (code, display name)
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("auto", "Auto detect"),
    ("zh", "Chinese"),
    ("zh-cn", "Chinese (Simplified)"),
    ("zh-tw", "Chinese (Traditional)"),
    ("en", "English"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("ru", "Russian"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("pt", "Portuguese"),
    ("it", "Italian"),
    ("th", "Thai"),
    ("vi", "Vietnamese"),
];

pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// Translate a subtitle document cue by cue, batched, reporting progress per
/// batch. Returns a new document in the target language.
pub async fn translate_document(
    translator: &dyn Translator,
    document: &SubtitleDocument,
    source_language: &str,
    target_language: &str,
    batch_size: usize,
    progress: &dyn ProgressSink,
) -> Result<SubtitleDocument> {
    let batch_size = batch_size.max(1);
    let total = document.cues.len();
    let mut translated = SubtitleDocument {
        cues: Vec::with_capacity(total),
        language: Some(target_language.to_string()),
    };

    for (batch_index, batch) in document.cues.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let results = translator
            .translate(&texts, source_language, target_language)
            .await?;

        for (cue, text) in batch.iter().zip(results) {
            translated.cues.push(crate::subtitle::SubtitleCue {
                index: cue.index,
                start: cue.start,
                end: cue.end,
                text,
            });
        }

        let done = (batch_index * batch_size + batch.len()).min(total);
        let percent = if total == 0 {
            100.0
        } else {
            (done as f32 / total as f32) * 100.0
        };
        progress
            .report(percent, &format!("Translated {}/{} cues", done, total))
            .await;
    }

    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::SubtitleCue;
    use crate::task::NullProgress;

    struct Uppercase;

    #[async_trait]
    impl Translator for Uppercase {
        async fn translate(
            &self,
            texts: &[String],
            _source: &str,
            _target: &str,
        ) -> Result<Vec<String>> {
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }

        fn name(&self) -> &'static str {
            "uppercase"
        }
    }

    fn document(n: usize) -> SubtitleDocument {
        SubtitleDocument {
            cues: (0..n)
                .map(|i| SubtitleCue {
                    index: i + 1,
                    start: i as f64,
                    end: i as f64 + 0.5,
                    text: format!("line {}", i),
                })
                .collect(),
            language: Some("en".to_string()),
        }
    }

    #[tokio::test]
    async fn translates_all_cues_preserving_timing() {
        let doc = document(5);
        let out = translate_document(&Uppercase, &doc, "en", "zh-cn", 2, &NullProgress)
            .await
            .unwrap();
        assert_eq!(out.cues.len(), 5);
        assert_eq!(out.cues[3].text, "LINE 3");
        assert_eq!(out.cues[3].start, doc.cues[3].start);
        assert_eq!(out.language.as_deref(), Some("zh-cn"));
    }

    #[tokio::test]
    async fn empty_document_translates_to_empty() {
        let doc = document(0);
        let out = translate_document(&Uppercase, &doc, "en", "ja", 10, &NullProgress)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn cues_are_sent_in_batches() {
        let mut mock = MockTranslator::new();
        mock.expect_translate()
            .times(3)
            .returning(|texts, _, _| Ok(texts.to_vec()));

        let doc = document(5);
        let out = translate_document(&mock, &doc, "en", "ja", 2, &NullProgress)
            .await
            .unwrap();
        assert_eq!(out.cues.len(), 5);
    }

    #[test]
    fn language_table_contains_defaults() {
        assert!(is_supported_language("zh-cn"));
        assert!(is_supported_language("auto"));
        assert!(!is_supported_language("klingon"));
    }
}
