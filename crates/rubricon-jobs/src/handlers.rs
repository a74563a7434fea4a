//! The work behind each job kind.
//!
//! Handlers read and write domain records; the queue in
//! [`crate::queue`] owns job status, retries, and the status mirror, so
//! nothing here touches `job_status` on records beyond creating them.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use rubricon_core::error::GenerationError;
use rubricon_core::feedback::{clean_prose, ProseRequest};
use rubricon_core::model::{JobKind, JobStatus};
use rubricon_core::prompts::{section_data, section_prompt, SYSTEM_PROMPT};
use rubricon_core::report::{AttemptReport, ReportSection, SectionKey};
use rubricon_core::scoring::{apply_score, score_response, BatchOutcome};
use rubricon_core::summary::AttemptSummary;
use rubricon_import::{apply_item_bank, parse_item_bank_str};
use rubricon_store::StoreError;

use crate::error::JobError;
use crate::queue::{JobContext, JobsConfig};

/// Runs one job kind to completion.
pub async fn execute(ctx: &JobContext, kind: &JobKind) -> Result<(), JobError> {
    match kind {
        JobKind::ScoreAttempt { attempt_id } => score_attempt(ctx, *attempt_id).await,
        JobKind::GenerateReport { attempt_id } => generate_report(ctx, *attempt_id).await,
        JobKind::RegenerateSection {
            attempt_id,
            section,
        } => regenerate_section(ctx, *attempt_id, *section).await,
        JobKind::ImportItemBank { batch_id } => import_item_bank(ctx, *batch_id).await,
    }
}

/// Re-evaluates every response on an attempt.
///
/// Items without a response row are left alone; a response that cannot
/// be scored (say a constructed item with no rubric yet) is skipped,
/// not failed, so one gap never blocks the rest of the sweep.
async fn score_attempt(ctx: &JobContext, attempt_id: Uuid) -> Result<(), JobError> {
    let attempt = ctx.store.get_attempt(attempt_id).await?;
    let form = ctx.store.get_form(attempt.form_id).await?;

    let mut outcome = BatchOutcome::default();
    for item_id in &form.item_ids {
        let item = match ctx.store.get_item(*item_id).await {
            Ok(item) => item,
            Err(_) => {
                tracing::warn!("form '{}' references unknown item {item_id}", form.name);
                continue;
            }
        };
        let Some(mut response) = ctx.store.response_for(attempt_id, *item_id).await else {
            continue;
        };
        let rubric = ctx.store.rubric_for_item(item.id).await;
        let rubric_scores = ctx.store.rubric_scores_for_response(response.id).await;
        match score_response(&item, &response, rubric.as_ref(), &rubric_scores) {
            Ok(state) => {
                apply_score(&mut response, state, Utc::now());
                ctx.store.put_response(response).await?;
                outcome.scored += 1;
            }
            Err(e) => {
                tracing::warn!("response {} left unscored: {e}", response.id);
                outcome.skipped += 1;
            }
        }
    }

    tracing::info!(
        "scored attempt {attempt_id}: {} scored, {} skipped",
        outcome.scored,
        outcome.skipped
    );
    Ok(())
}

/// Generates prose for all seven report sections.
///
/// Sections that generated before a failure still land on the report;
/// the returned error tells the queue whether a retry is worthwhile.
async fn generate_report(ctx: &JobContext, attempt_id: Uuid) -> Result<(), JobError> {
    let summary = ctx.store.attempt_summary(attempt_id).await?;
    let report = report_shell(ctx, attempt_id).await?;

    let (sections, failure) = generate_sections(ctx, &summary, &SectionKey::ALL).await;
    let generated = sections.len();

    ctx.store
        .update_report(report.id, |r| {
            for (key, section) in sections {
                r.set_section(key, section);
            }
            r.total_raw = summary.total_raw;
            r.total_max = summary.total_max;
            r.scored_responses = summary.scored_responses;
            r.unscored_responses = summary.unscored_responses;
        })
        .await?;

    if let Some(failure) = failure {
        return Err(failure);
    }
    tracing::info!("generated {generated} report sections for attempt {attempt_id}");
    Ok(())
}

/// Rebuilds one section of an existing report, refreshing the score
/// aggregates alongside it.
async fn regenerate_section(
    ctx: &JobContext,
    attempt_id: Uuid,
    key: SectionKey,
) -> Result<(), JobError> {
    let Some(report) = ctx.store.report_for_attempt(attempt_id).await else {
        return Err(JobError::Invalid(format!(
            "attempt {attempt_id} has no report; generate one first"
        )));
    };
    let summary = ctx.store.attempt_summary(attempt_id).await?;

    let (sections, failure) = generate_sections(ctx, &summary, &[key]).await;
    if let Some(failure) = failure {
        return Err(failure);
    }

    ctx.store
        .update_report(report.id, |r| {
            for (key, section) in sections {
                r.set_section(key, section);
            }
            r.total_raw = summary.total_raw;
            r.total_max = summary.total_max;
            r.scored_responses = summary.scored_responses;
            r.unscored_responses = summary.unscored_responses;
        })
        .await?;
    Ok(())
}

/// Parses a batch's uploaded CSV and applies it to the item bank.
async fn import_item_bank(ctx: &JobContext, batch_id: Uuid) -> Result<(), JobError> {
    let batch = ctx.store.get_batch(batch_id).await?;
    let parsed = parse_item_bank_str(&batch.payload)
        .map_err(|e| JobError::Invalid(format!("unreadable import file: {e:#}")))?;
    let outcome = apply_item_bank(&ctx.store, parsed).await?;

    tracing::info!(
        "import batch {batch_id}: {} created, {} updated, {} rows skipped",
        outcome.items_created,
        outcome.items_updated,
        outcome.rows_skipped
    );

    ctx.store
        .update_batch(batch_id, |b| {
            b.items_created = outcome.items_created;
            b.items_updated = outcome.items_updated;
            b.rows_skipped = outcome.rows_skipped;
            b.row_errors = outcome.errors;
        })
        .await?;
    Ok(())
}

/// Fetches the attempt's report, creating the row on first generation.
async fn report_shell(ctx: &JobContext, attempt_id: Uuid) -> Result<AttemptReport, JobError> {
    if let Some(report) = ctx.store.report_for_attempt(attempt_id).await {
        return Ok(report);
    }
    let mut fresh = AttemptReport::new(attempt_id);
    fresh.job_status = JobStatus::Running;
    match ctx.store.put_report(fresh.clone()).await {
        Ok(()) => Ok(fresh),
        // Lost the creation race; the winning row is there now.
        Err(StoreError::UniqueViolation { .. }) => ctx
            .store
            .report_for_attempt(attempt_id)
            .await
            .ok_or_else(|| StoreError::not_found("report", attempt_id).into()),
        Err(e) => Err(e.into()),
    }
}

/// Generates prose for the given sections, a few at a time.
///
/// Returns every section that generated plus at most one failure. A
/// permanent failure wins over a transient one: the queue must not
/// retry a job that cannot succeed.
async fn generate_sections(
    ctx: &JobContext,
    summary: &AttemptSummary,
    keys: &[SectionKey],
) -> (Vec<(SectionKey, ReportSection)>, Option<JobError>) {
    let semaphore = Arc::new(Semaphore::new(ctx.config.section_parallelism.max(1)));
    let mut futures = FuturesUnordered::new();

    for &key in keys {
        let provider = Arc::clone(&ctx.provider);
        let semaphore = Arc::clone(&semaphore);
        let request = build_request(&ctx.config, key, summary);
        futures.push(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => provider.generate(&request).await,
                Err(_) => Err(GenerationError::NetworkError("worker pool closed".into())),
            };
            (key, result)
        });
    }

    let mut sections = Vec::new();
    let mut failure: Option<JobError> = None;
    while let Some((key, result)) = futures.next().await {
        match result {
            Ok(response) => {
                sections.push((
                    key,
                    ReportSection {
                        title: key.title().to_string(),
                        content: clean_prose(&response.content),
                        data: section_data(key, summary),
                        generated_at: Utc::now(),
                    },
                ));
            }
            Err(e) => {
                tracing::warn!("section '{key}' failed to generate: {e}");
                let e = JobError::from(e);
                if !matches!(&failure, Some(existing) if existing.is_permanent()) {
                    failure = Some(e);
                }
            }
        }
    }
    (sections, failure)
}

fn build_request(config: &JobsConfig, key: SectionKey, summary: &AttemptSummary) -> ProseRequest {
    ProseRequest {
        model: config.model.clone(),
        section: key,
        prompt: section_prompt(key, summary),
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}
