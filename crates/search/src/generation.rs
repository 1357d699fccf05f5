//! Grounded answer generation
//!
//! Builds the context block and prompt, calls the language model once and
//! returns its output unmodified.

use raga_common::{LanguageModel, Result, RetrievedContext};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Answer returned when no context is available, and the phrase the model is
/// told to use when the context does not contain the answer
pub const REFUSAL: &str = "I cannot answer based on the provided documents.";

/// Answer plus the contexts that were shown to the model
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub contexts_used: Vec<RetrievedContext>,
}

/// Produces answers constrained to supplied contexts
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Answer `query` from `contexts`, in the given order.
    ///
    /// With no contexts the refusal is returned without calling the model.
    #[instrument(skip(self, query, contexts), fields(contexts = contexts.len()))]
    pub async fn generate(&self, query: &str, contexts: Vec<RetrievedContext>) -> Result<GeneratedAnswer> {
        if contexts.is_empty() {
            debug!("No contexts, returning refusal");
            return Ok(GeneratedAnswer {
                answer: REFUSAL.to_string(),
                contexts_used: Vec::new(),
            });
        }

        let prompt = build_prompt(query, &contexts);
        let answer = self.model.complete(&prompt).await?;
        debug!(model = self.model.model_name(), answer_len = answer.len(), "Answer generated");

        Ok(GeneratedAnswer {
            answer,
            contexts_used: contexts,
        })
    }
}

/// `Source: {file} (Page {n})` / `Content: {text}` entries separated by a blank line
pub fn build_context(contexts: &[RetrievedContext]) -> String {
    contexts
        .iter()
        .map(|c| {
            format!(
                "Source: {} (Page {})\nContent: {}\n",
                c.source_filename, c.page_number, c.chunk_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(query: &str, contexts: &[RetrievedContext]) -> String {
    format!(
        "You are a helpful assistant. Answer strictly based on the context.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         If answer is not in the context, reply: '{}'",
        build_context(contexts),
        query,
        REFUSAL
    )
}
