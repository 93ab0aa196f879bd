//! Answer generation from assembled context.
//!
//! [`GenerationProvider`] is the single-turn text completion seam; the
//! [`AnswerGenerator`] owns prompt construction and deadline enforcement.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::conversation::{ConversationTurn, GeneratedAnswer};
use crate::error::{RagError, Result};
use crate::timeout::bounded;

/// A single-turn text completion backend with no memory of its own.
///
/// Failures (unreachable, rate-limited, malformed response) are reported as
/// [`RagError::GenerationError`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Complete `prompt`, returning the raw model text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Name used in logs and error messages.
    fn name(&self) -> &str;
}

const PREAMBLE: &str = "You are a research methodology assistant. Answer the user's query \
using only the provided context, which comes from a research design textbook and from the \
user's own project documents. Be concise and accurate.";

const NO_CONTEXT_NOTICE: &str = "No supporting passages were found in the textbook or the \
project's documents for this query. Answer from general research methodology knowledge, state \
clearly that the answer is not grounded in the user's sources, and suggest uploading documents \
relevant to the question.";

/// Build the full prompt sent to the generation provider.
///
/// Sections appear in a fixed order: task preamble, optional project
/// information, prior conversation, context, and the query. A blank context
/// switches the task section to degraded, non-grounded instructions.
pub fn build_prompt(
    context: &str,
    history: &[ConversationTurn],
    question: &str,
    project_info: Option<&str>,
) -> String {
    let mut prompt = String::from("### Task:\n");
    prompt.push_str(PREAMBLE);
    prompt.push('\n');
    if context.trim().is_empty() {
        prompt.push_str(NO_CONTEXT_NOTICE);
        prompt.push('\n');
    }

    if let Some(info) = project_info.map(str::trim).filter(|info| !info.is_empty()) {
        prompt.push_str("\n### Project Information:\n");
        prompt.push_str(info);
        prompt.push_str(
            "\nTailor the response to the research type and learning objectives of this project.\n",
        );
    }

    if !history.is_empty() {
        prompt.push_str("\n### Previous conversation:\n");
        for turn in history {
            prompt.push_str(turn.role.label());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
    }

    if !context.trim().is_empty() {
        prompt.push_str("\n### Context:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    prompt.push_str("\n### Query:\n");
    prompt.push_str(question);
    prompt.push('\n');
    prompt
}

/// Turns context, history and a question into a [`GeneratedAnswer`].
///
/// Each call is independent; nothing is cached.
#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl AnswerGenerator {
    /// Create a generator with the given per-call timeout.
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Return a reference to the generation provider.
    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }

    /// Generate an answer. An empty `context` is allowed and produces a
    /// degraded, non-grounded answer instead of an error.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] on provider failure, timeout, or
    /// a blank completion.
    pub async fn generate(
        &self,
        context: &str,
        history: &[ConversationTurn],
        question: &str,
    ) -> Result<GeneratedAnswer> {
        self.generate_for_project(context, history, question, None).await
    }

    /// Like [`generate`](Self::generate), tailoring the prompt to a project description.
    pub async fn generate_for_project(
        &self,
        context: &str,
        history: &[ConversationTurn],
        question: &str,
        project_info: Option<&str>,
    ) -> Result<GeneratedAnswer> {
        let grounded = !context.trim().is_empty();
        let span = info_span!(
            "rag.generate",
            provider = self.provider.name(),
            grounded,
            history_turns = history.len()
        );

        async move {
            if !grounded {
                warn!("generating without retrieved context");
            }
            let prompt = build_prompt(context, history, question, project_info);
            debug!(prompt_len = prompt.len(), "sending prompt");

            let provider_name = self.provider.name().to_string();
            let text = bounded(self.timeout, self.provider.complete(&prompt), |limit| {
                RagError::GenerationError {
                    provider: provider_name.clone(),
                    message: format!("timed out after {limit:?}"),
                }
            })
            .await
            .inspect_err(|e| error!(error = %e, "generation failed"))?;

            let text = text.trim();
            if text.is_empty() {
                error!("generation returned an empty response");
                return Err(RagError::GenerationError {
                    provider: provider_name,
                    message: "provider returned an empty response".to_string(),
                });
            }

            info!(answer_len = text.len(), "generated answer");
            Ok(GeneratedAnswer::new(text))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        prompts: Mutex<Vec<String>>,
        reply: String,
    }

    impl Recording {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { prompts: Mutex::new(Vec::new()), reply: reply.to_string() })
        }
    }

    #[async_trait]
    impl GenerationProvider for Recording {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Failing;

    #[async_trait]
    impl GenerationProvider for Failing {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(RagError::GenerationError { provider: "failing".into(), message: "429".into() })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn prompt_sections_are_ordered() {
        let history = [
            ConversationTurn::user("What is validity?"),
            ConversationTurn::assistant("Validity is..."),
        ];
        let prompt = build_prompt(
            "Internal validity concerns causal claims.",
            &history,
            "And reliability?",
            Some("Quantitative survey of nurses"),
        );

        let task = prompt.find("### Task:").unwrap();
        let project = prompt.find("### Project Information:").unwrap();
        let conversation = prompt.find("### Previous conversation:").unwrap();
        let context = prompt.find("### Context:").unwrap();
        let query = prompt.find("### Query:").unwrap();
        assert!(task < project && project < conversation && conversation < context && context < query);

        let user = prompt.find("User: What is validity?").unwrap();
        let assistant = prompt.find("Assistant: Validity is...").unwrap();
        assert!(user < assistant);
        assert!(prompt.contains("only the provided context"));
        assert!(prompt.trim_end().ends_with("And reliability?"));
    }

    #[test]
    fn empty_context_prompt_is_degraded() {
        let prompt = build_prompt("  ", &[], "What is a pilot study?", None);
        assert!(prompt.contains("No supporting passages were found"));
        assert!(!prompt.contains("### Context:"));
        assert!(!prompt.contains("### Project Information:"));
        assert!(!prompt.contains("### Previous conversation:"));
    }

    #[tokio::test]
    async fn generate_with_empty_context_succeeds() {
        let provider = Recording::replying("  General guidance on pilots.  ");
        let generator = AnswerGenerator::new(provider.clone(), Duration::from_secs(5));
        let answer = generator.generate("", &[], "What is a pilot study?").await.unwrap();
        assert_eq!(answer.text, "General guidance on pilots.");
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_completion_is_a_generation_error() {
        let generator = AnswerGenerator::new(Recording::replying("   "), Duration::from_secs(5));
        let err = generator.generate("ctx", &[], "q").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationError { .. }));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let generator = AnswerGenerator::new(Arc::new(Failing), Duration::from_secs(5));
        let err = generator.generate("ctx", &[], "q").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationError { message, .. } if message == "429"));
    }
}
