//! Background annotation jobs and the persisted status state machine.

use std::time::Instant;

use crate::app_state::AppState;
use crate::db::queries;

/// Run one annotation job to completion.
///
/// Spawned by the submission handler after the record has been moved to
/// `processing`. This task exclusively owns the terminal status write:
/// `completed` together with the annotations in a single update, or `failed`
/// if and only if that persistence call errors. Provider failures never reach
/// here as errors — the orchestrator absorbs them into a degraded result —
/// so annotation quality alone cannot fail a job.
pub async fn run_annotation_job(state: AppState, image_id: i64, image_url: String) {
    let start = Instant::now();
    tracing::info!(image_id, url = %image_url, "starting annotation job");

    let result = state.annotator.annotate(&image_url).await;

    match queries::complete_annotation(&state.db, image_id, &result).await {
        Ok(()) => {
            metrics::counter!("annotation_jobs_completed").increment(1);
            tracing::info!(
                image_id,
                tags = result.tags.len(),
                description_len = result.description.len(),
                "annotation job completed"
            );
        }
        Err(e) => {
            metrics::counter!("annotation_jobs_failed").increment(1);
            tracing::error!(image_id, error = %e, "failed to persist annotations");

            if let Err(e) = queries::mark_failed(&state.db, image_id).await {
                // The image itself is durably stored; a stuck status record
                // is recoverable by resubmission.
                tracing::error!(image_id, error = %e, "failed to record failed status");
            }
        }
    }

    metrics::histogram!("annotation_processing_seconds").record(start.elapsed().as_secs_f64());
}
