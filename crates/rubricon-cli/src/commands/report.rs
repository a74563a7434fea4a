//! The `rubricon report` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rubricon_core::model::{JobKind, JobRecord, JobStatus};
use rubricon_export::write_html_report;
use rubricon_jobs::{run_job, JobContext};
use rubricon_providers::load_config_from;
use uuid::Uuid;

pub async fn execute(attempt: Uuid, output: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = Arc::new(super::open_store(&config)?);
    let provider = super::default_provider(&config)?;

    println!(
        "Generating report for attempt {attempt} via {}...",
        config.default_provider
    );
    let ctx = JobContext {
        store: Arc::clone(&store),
        provider,
        config: super::jobs_config(&config),
    };
    let job = JobRecord::new(JobKind::GenerateReport {
        attempt_id: attempt,
    });
    store.insert_job(job.clone()).await;
    run_job(&ctx, job.id).await;

    let job = store.get_job(job.id).await?;
    if job.status != JobStatus::Completed {
        bail!(
            "report generation failed: {}",
            job.last_error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let report = store
        .report_for_attempt(attempt)
        .await
        .context("report missing after generation")?;
    println!("Generated {} section(s)", report.sections.generated_count());

    if let Some(path) = output {
        let summary = store.attempt_summary(attempt).await?;
        let student_name = match store.get_user(summary.student_id).await {
            Ok(user) => user.display_name,
            Err(_) => "Student".to_string(),
        };
        write_html_report(&report, &summary, &student_name, &path)?;
        println!("HTML report written to {}", path.display());
    }

    super::save_store(&store, &config).await?;
    Ok(())
}
