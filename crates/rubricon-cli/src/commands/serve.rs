//! The `rubricon serve` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rubricon_jobs::{JobContext, JobQueue};
use rubricon_providers::load_config_from;
use rubricon_server::AppState;

pub async fn execute(addr: Option<String>, config_path: Option<PathBuf>, seed: bool) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = Arc::new(super::open_store(&config)?);

    if seed {
        match super::seed::seed_demo_data(&store).await? {
            Some(counts) => {
                println!(
                    "Seeded {} users, {} items, {} form(s)",
                    counts.users, counts.items, counts.forms
                );
                super::save_store(&store, &config).await?;
            }
            None => println!("Store already has users; skipping seed."),
        }
    }

    let provider = super::default_provider(&config)?;
    let jobs = JobQueue::spawn(JobContext {
        store: Arc::clone(&store),
        provider,
        config: super::jobs_config(&config),
    });
    let state = AppState {
        store: Arc::clone(&store),
        jobs,
    };

    let addr = addr.unwrap_or_else(|| config.bind_addr.clone());
    tokio::select! {
        result = rubricon_server::serve(state, &addr) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    // One last snapshot so in-memory writes survive the restart.
    super::save_store(&store, &config).await?;
    println!("Store saved to {}", config.store_path().display());
    Ok(())
}
