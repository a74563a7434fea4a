//! rubricon-providers — feedback provider integrations.
//!
//! Implements the `FeedbackProvider` trait for Anthropic and OpenAI,
//! allowing rubricon to generate report prose from multiple backends.

pub mod anthropic;
pub mod config;
pub mod mock;
pub mod openai;

pub use config::{create_provider, load_config, load_config_from, ProviderConfig, RubriconConfig};
pub use rubricon_core::error::GenerationError;
