//! Draft generator — turns a prompt into essay text through the LLM.

use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::session::prompts::DRAFT_SYSTEM_PROMPT;

/// Text delivered in place of a draft when generation fails.
pub const FALLBACK_DRAFT: &str = "Draft unavailable.";

/// Sampling temperature for every draft request.
pub const DRAFT_TEMPERATURE: f32 = 0.6;

/// Generates essay drafts. Never fails: errors collapse to [`FALLBACK_DRAFT`].
pub struct DraftGenerator {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl DraftGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    /// Run one completion for `prompt` and return the draft text.
    pub async fn generate(&self, prompt: &str) -> String {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(DRAFT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(DRAFT_TEMPERATURE)
        .with_max_tokens(self.max_tokens);

        match self.llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                info!(
                    model = self.llm.model_name(),
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Draft generated"
                );
                response.content
            }
            Ok(_) => {
                warn!(model = self.llm.model_name(), "LLM returned an empty draft");
                FALLBACK_DRAFT.to_string()
            }
            Err(e) => {
                warn!(model = self.llm.model_name(), error = %e, "Draft generation failed");
                FALLBACK_DRAFT.to_string()
            }
        }
    }
}
