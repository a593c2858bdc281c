//! Translate a natural-language question into a candidate query.

pub mod error;
pub mod model;
pub mod prompt;
pub mod reply;

use std::sync::Arc;
use std::time::Duration;

use query_engine_metadata::metadata::SchemaDescriptor;
use tracing::{info_span, Instrument};

pub use error::{ModelError, TranslationError};
pub use model::{GeminiModel, GeminiSettings, LanguageModel};
pub use reply::Translation;

/// Asks a language model for a query answering a question over a fixed schema.
///
/// The translator keeps no state between calls apart from the shared, read-only schema.
#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn LanguageModel>,
    schema: Arc<SchemaDescriptor>,
    timeout: Duration,
}

impl Translator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        schema: Arc<SchemaDescriptor>,
        timeout: Duration,
    ) -> Self {
        Translator {
            model,
            schema,
            timeout,
        }
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Produce a candidate query and its description.
    ///
    /// The model call is abandoned once the timeout elapses; dropping the returned future
    /// abandons it as well.
    pub async fn translate(&self, question: &str) -> Result<Translation, TranslationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TranslationError::EmptyQuestion);
        }

        let prompt = prompt::build_prompt(question, &self.schema);

        let reply = tokio::time::timeout(
            self.timeout,
            self.model
                .complete(&prompt)
                .instrument(info_span!("Call language model", model = self.model.name())),
        )
        .await
        .map_err(|_| TranslationError::Timeout(self.timeout))??;

        tracing::debug!(reply = %reply, "language model replied");

        reply::parse_reply(&reply).ok_or(TranslationError::NoQueryInReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo(String);

    #[async_trait]
    impl LanguageModel for Echo {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct Stalled;

    #[async_trait]
    impl LanguageModel for Stalled {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    fn translator(model: impl LanguageModel + 'static, timeout: Duration) -> Translator {
        Translator::new(
            Arc::new(model),
            Arc::new(SchemaDescriptor::empty()),
            timeout,
        )
    }

    #[tokio::test]
    async fn returns_the_parsed_reply() {
        let translator = translator(
            Echo(r#"{"sql": "SELECT 1", "description": "one"}"#.to_string()),
            Duration::from_secs(5),
        );
        let translation = translator.translate("anything").await.unwrap();
        assert_eq!(translation.candidate_query, "SELECT 1");
        assert_eq!(translation.description, "one");
    }

    #[tokio::test]
    async fn refuses_empty_questions_without_calling_the_model() {
        let translator = translator(Stalled, Duration::from_secs(3600));
        assert!(matches!(
            translator.translate("   ").await,
            Err(TranslationError::EmptyQuestion)
        ));
    }

    #[tokio::test]
    async fn unparseable_replies_are_failures() {
        let translator = translator(Echo("no idea".to_string()), Duration::from_secs(5));
        assert!(matches!(
            translator.translate("who?").await,
            Err(TranslationError::NoQueryInReply)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_models_time_out() {
        let translator = translator(Stalled, Duration::from_secs(30));
        assert!(matches!(
            translator.translate("who?").await,
            Err(TranslationError::Timeout(_))
        ));
    }
}
