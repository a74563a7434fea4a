//! Subcommand implementations.

pub mod export;
pub mod import;
pub mod init;
pub mod list_models;
pub mod report;
pub mod score;
pub mod seed;
pub mod serve;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rubricon_core::feedback::FeedbackProvider;
use rubricon_jobs::JobsConfig;
use rubricon_providers::{create_provider, RubriconConfig};
use rubricon_store::Store;

/// Loads the snapshot named by the config, or starts empty when none
/// exists yet.
pub(crate) fn open_store(config: &RubriconConfig) -> Result<Store> {
    let path = config.store_path();
    Store::load_or_default(&path)
        .with_context(|| format!("failed to load store snapshot: {}", path.display()))
}

pub(crate) async fn save_store(store: &Store, config: &RubriconConfig) -> Result<()> {
    let path = config.store_path();
    store
        .save(&path)
        .await
        .with_context(|| format!("failed to save store snapshot: {}", path.display()))?;
    Ok(())
}

pub(crate) fn jobs_config(config: &RubriconConfig) -> JobsConfig {
    JobsConfig {
        max_retries: config.max_retries,
        retry_delay: Duration::from_millis(config.retry_delay_ms),
        section_parallelism: config.section_parallelism,
        model: config.default_model.clone(),
        temperature: config.default_temperature,
        max_tokens: config.default_max_tokens,
    }
}

/// Builds the provider the config names as default.
pub(crate) fn default_provider(config: &RubriconConfig) -> Result<Arc<dyn FeedbackProvider>> {
    let provider_config = config.providers.get(&config.default_provider).with_context(|| {
        format!(
            "provider '{}' not found in config; run `rubricon init` to create one",
            config.default_provider
        )
    })?;
    let provider = create_provider(&config.default_provider, provider_config)?;
    Ok(Arc::from(provider))
}
