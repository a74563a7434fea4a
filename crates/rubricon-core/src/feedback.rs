//! The feedback provider trait for report prose generation.
//!
//! Implemented by the `rubricon-providers` crate for each LLM backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::report::SectionKey;

/// Trait for LLM backends that write report section prose.
#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Generate prose for one report section.
    async fn generate(&self, request: &ProseRequest) -> Result<ProseResponse, GenerationError>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request to generate prose for one report section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProseRequest {
    /// Model identifier (e.g. "claude-sonnet-4-5").
    pub model: String,
    /// The report section this prose is for.
    pub section: SectionKey,
    /// The assembled prompt, including the score digest.
    pub prompt: String,
    /// Optional system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Response from a prose generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProseResponse {
    /// Cleaned prose ready to store on the report.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting for one generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Estimated cost in USD based on published per-token pricing.
    pub estimated_cost_usd: f64,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
    /// Cost per 1K input tokens in USD.
    pub cost_per_1k_input: f64,
    /// Cost per 1K output tokens in USD.
    pub cost_per_1k_output: f64,
}

/// Strip markdown wrapping from LLM prose.
///
/// Models occasionally fence a whole answer in ``` blocks or wrap it in
/// quotes even when asked for plain prose. Handles:
/// - A fenced answer, with or without a language tag
/// - A truncated (unclosed) fence
/// - An answer wrapped in double quotes
/// - Plain prose (returned as-is, trimmed)
pub fn clean_prose(response: &str) -> String {
    let mut text = response.trim();
    if text.starts_with("```") {
        text = match text.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        };
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text);
        text = text.trim();
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = &text[1..text.len() - 1];
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_plain_prose_is_untouched() {
        let input = "The student shows strong inference skills.";
        assert_eq!(clean_prose(input), input);
    }

    #[test]
    fn clean_strips_fenced_answer() {
        let input = "```\nThe student shows strong inference skills.\n```";
        assert_eq!(
            clean_prose(input),
            "The student shows strong inference skills."
        );
    }

    #[test]
    fn clean_strips_language_tagged_fence() {
        let input = "```markdown\nStrong performance overall.\n\nKeep reading daily.\n```";
        assert_eq!(
            clean_prose(input),
            "Strong performance overall.\n\nKeep reading daily."
        );
    }

    #[test]
    fn clean_handles_unclosed_fence() {
        let input = "```markdown\nStrong performance overall.";
        assert_eq!(clean_prose(input), "Strong performance overall.");
    }

    #[test]
    fn clean_strips_wrapping_quotes() {
        let input = "\"A thoughtful reader.\"";
        assert_eq!(clean_prose(input), "A thoughtful reader.");
    }

    #[test]
    fn clean_keeps_interior_quotes_and_fences() {
        let input = "The phrase \"reading between the lines\" applies here.";
        assert_eq!(clean_prose(input), input);
    }
}
