//! Answer orchestration.
//!
//! One call moves through `Validate → Search → AssembleContext →
//! BuildPrompt → Generate`. Any step can end the call with a [`Failure`]
//! naming the stage.

use crate::error::{Failure, KnowledgeError, Stage, StageExt};
use crate::rag::context::assemble_context;
use crate::types::{AnswerResult, EmptyReason, SearchOutcome, SourceCitation};
use crate::vector_index::VectorIndex;
use docent_core::AppError;
use docent_llm::retry::{with_timeout, RetryPolicy};
use docent_llm::{LlmClient, LlmRequest};
use docent_prompt::{build_prompt, PromptDefinition};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Best scores below this mark the answer as low confidence and ask the
/// generator to be cautious.
pub const CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Tunables for answering.
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Deadline for one generator call
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 6000,
            model: "llama3.2".to_string(),
            temperature: 0.2,
            max_output_tokens: 1024,
            timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct PromptVariables<'a> {
    context: &'a str,
    question: &'a str,
    low_confidence: bool,
}

/// Answers questions from the documents in a [`VectorIndex`].
pub struct AnswerEngine {
    index: Arc<VectorIndex>,
    generator: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: AnswerSettings,
}

impl std::fmt::Debug for AnswerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("generator", &self.generator.provider_name())
            .field("prompt", &self.prompt.id)
            .field("settings", &self.settings)
            .finish()
    }
}

impl AnswerEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        generator: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            index,
            generator,
            prompt,
            settings,
        }
    }

    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    /// Answer `question` from the indexed documents.
    ///
    /// `top_k` overrides the configured retrieval depth. Cancellation is
    /// honoured before the search and before the generator call.
    pub async fn answer(
        &self,
        question: &str,
        top_k: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<AnswerResult, Failure> {
        // Validate
        let question = question.trim();
        if question.is_empty() {
            return Err(KnowledgeError::EmptyQuestion.at(Stage::Validation));
        }
        if cancel.is_cancelled() {
            return Err(KnowledgeError::Cancelled.at(Stage::Retrieval));
        }

        // Search
        let top_k = top_k.unwrap_or(self.settings.top_k);
        let hits = match self.index.search(question, top_k).await.at(Stage::Retrieval)? {
            SearchOutcome::Hits(hits) => hits,
            SearchOutcome::Empty(EmptyReason::EmptyIndex) => {
                return Err(KnowledgeError::NoDocumentsIndexed.at(Stage::Retrieval))
            }
            SearchOutcome::Empty(EmptyReason::EmptyQuery) => {
                return Err(KnowledgeError::EmptyQuestion.at(Stage::Validation))
            }
        };

        // AssembleContext
        let context = assemble_context(&hits, self.settings.max_context_chars);
        let max_score = context.used.first().map_or(0.0, |h| h.score);
        let low_confidence = max_score < CONFIDENCE_THRESHOLD;

        tracing::info!(
            retrieved = hits.len(),
            used = context.used.len(),
            dropped = context.dropped,
            max_score,
            low_confidence,
            "Assembled answer context"
        );

        // BuildPrompt
        let built = build_prompt(
            &self.prompt,
            &PromptVariables {
                context: &context.text,
                question,
                low_confidence,
            },
        )
        .map_err(|e| {
            KnowledgeError::Generation(format!("failed to render prompt: {}", e))
                .at(Stage::Generation)
        })?;

        if cancel.is_cancelled() {
            return Err(KnowledgeError::Cancelled.at(Stage::Generation));
        }

        // Generate
        let mut request = LlmRequest::new(built.user, self.settings.model.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_output_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        let generator: &dyn LlmClient = self.generator.as_ref();
        let request = &request;
        let timeout = self.settings.timeout;
        let response = self
            .settings
            .retry
            .run("generation", move || {
                with_timeout("generation", timeout, generator.complete(request))
            })
            .await
            .map_err(|e| generation_error(e).at(Stage::Generation))?;

        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(KnowledgeError::Generation(
                "generator returned an empty answer".to_string(),
            )
            .at(Stage::Generation));
        }

        tracing::debug!(
            model = %response.model,
            chars = answer.len(),
            tokens = response.usage.total_tokens,
            "Generated answer"
        );

        Ok(AnswerResult {
            answer: answer.to_string(),
            sources: context.used.iter().map(SourceCitation::from).collect(),
            max_score,
            low_confidence,
            model: response.model,
        })
    }
}

fn generation_error(err: AppError) -> KnowledgeError {
    match err {
        AppError::Unavailable(msg) => KnowledgeError::GeneratorUnavailable(msg),
        AppError::Timeout { operation, after } => KnowledgeError::Timeout { operation, after },
        AppError::RateLimited(msg) => KnowledgeError::RateLimited(msg),
        AppError::Config(msg) => KnowledgeError::Provider(msg),
        other => KnowledgeError::Generation(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scriptable text generators.

    use docent_core::{AppError, AppResult};
    use docent_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// What the scripted generator does on each call.
    #[derive(Debug, Clone)]
    pub enum Reply {
        /// Answer with this text
        Text(String),
        /// Echo a line of the prompt that contains the needle
        EchoLineWith(String),
        Unavailable,
        RateLimited,
        Hang(Duration),
    }

    #[derive(Debug)]
    pub struct ScriptedGenerator {
        pub replies: Mutex<Vec<Reply>>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedGenerator {
        /// Replies are consumed in order; the last one repeats.
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedGenerator {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.clone());
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.len() > 1 {
                    replies.remove(0)
                } else {
                    replies[0].clone()
                }
            };

            let content = match reply {
                Reply::Text(text) => text,
                Reply::EchoLineWith(needle) => request
                    .prompt
                    .lines()
                    .find(|l| l.contains(needle.as_str()))
                    .unwrap_or("")
                    .to_string(),
                Reply::Unavailable => {
                    return Err(AppError::Unavailable("connection refused".to_string()))
                }
                Reply::RateLimited => return Err(AppError::RateLimited("429".to_string())),
                Reply::Hang(d) => {
                    tokio::time::sleep(d).await;
                    "late".to_string()
                }
            };

            Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
                done: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::embeddings::{Embedder, EmbeddingProvider};
    use crate::error::ErrorKind;
    use crate::similarity::Metric;
    use crate::types::PendingChunk;
    use docent_prompt::{builtin_prompt, ANSWER_PROMPT_ID};

    async fn index_with(texts: &[(&str, &str)]) -> Arc<VectorIndex> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(128));
        let index = Arc::new(
            VectorIndex::open(Arc::new(Embedder::new(provider, Metric::InnerProduct)), None)
                .await
                .unwrap(),
        );
        for (i, (doc, text)) in texts.iter().enumerate() {
            index
                .add_chunks(vec![PendingChunk::new(*text, *doc, format!("id-{}", doc), i as u32)])
                .await
                .unwrap();
        }
        index
    }

    fn engine(index: Arc<VectorIndex>, generator: Arc<ScriptedGenerator>) -> AnswerEngine {
        AnswerEngine::new(
            index,
            generator,
            builtin_prompt(ANSWER_PROMPT_ID).unwrap(),
            AnswerSettings {
                timeout: Duration::from_millis(50),
                retry: RetryPolicy::default()
                    .with_max_retries(1)
                    .with_initial_backoff(Duration::from_millis(1)),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_empty_question_skips_everything() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Text("x".into())]));
        let engine = engine(index_with(&[]).await, generator.clone());

        let failure = engine
            .answer("   ", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.stage, Stage::Validation);
        assert_eq!(failure.kind(), ErrorKind::EmptyQuestion);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_documents_does_not_call_generator() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Text("x".into())]));
        let engine = engine(index_with(&[]).await, generator.clone());

        let failure = engine
            .answer("What color is the sky?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::NoDocumentsIndexed);
        assert_eq!(failure.stage, Stage::Retrieval);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_with_sources() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::EchoLineWith(
            "sky is".into(),
        )]));
        let engine = engine(
            index_with(&[("sky.txt", "The sky is blue."), ("fruit.txt", "Apples are red.")]).await,
            generator.clone(),
        );

        let result = engine
            .answer("What color is the sky?", Some(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.answer, "The sky is blue.");
        assert_eq!(result.sources[0].document_name, "sky.txt");
        assert!(result.sources[0].score > 0.0);
        assert!(result.sources.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(result.max_score, result.sources[0].score);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].prompt.contains("Question: What color is the sky?"));
        assert!(prompts[0].system.is_some());
    }

    #[tokio::test]
    async fn test_blank_generation_is_error() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Text("  \n ".into())]));
        let engine = engine(index_with(&[("a.txt", "alpha")]).await, generator);

        let failure = engine
            .answer("alpha?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.stage, Stage::Generation);
        assert_eq!(failure.kind(), ErrorKind::Generation);
    }

    #[tokio::test]
    async fn test_unreachable_generator() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Unavailable]));
        let engine = engine(index_with(&[("a.txt", "alpha")]).await, generator.clone());

        let failure = engine
            .answer("alpha?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::GeneratorUnavailable);
        // Not a timeout, so not retried
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::RateLimited]));
        let engine = engine(index_with(&[("a.txt", "alpha")]).await, generator);

        let failure = engine
            .answer("alpha?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_generation_timeout_retried_once() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Reply::Hang(Duration::from_secs(5)),
            Reply::Text("recovered".into()),
        ]));
        let engine = engine(index_with(&[("a.txt", "alpha")]).await, generator.clone());

        let result = engine
            .answer("alpha?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.answer, "recovered");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_persistent_timeout_is_typed() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Hang(Duration::from_secs(5))]));
        let engine = engine(index_with(&[("a.txt", "alpha")]).await, generator.clone());

        let failure = engine
            .answer("alpha?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Timeout);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_generation() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Text("x".into())]));
        let engine = engine(index_with(&[("a.txt", "alpha")]).await, generator.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = engine.answer("alpha?", None, &cancel).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Cancelled);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_hint_reaches_prompt() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Text("unsure".into())]));
        let engine = engine(
            index_with(&[("a.txt", "Photosynthesis converts light into chemical energy.")]).await,
            generator.clone(),
        );

        let result = engine
            .answer("zzz qqq xxx", None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.low_confidence);
        assert!(result.max_score < CONFIDENCE_THRESHOLD);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].prompt.contains("weakly related"));
    }

    #[tokio::test]
    async fn test_bad_template_degrades_to_failure() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Reply::Text("x".into())]));
        let mut prompt = builtin_prompt(ANSWER_PROMPT_ID).unwrap();
        prompt.template = "{{#if context}}unclosed".to_string();
        let engine = AnswerEngine::new(
            index_with(&[("a.txt", "alpha")]).await,
            generator.clone(),
            prompt,
            AnswerSettings::default(),
        );

        let failure = engine
            .answer("alpha?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.stage, Stage::Generation);
        assert_eq!(generator.calls(), 0);
    }
}
