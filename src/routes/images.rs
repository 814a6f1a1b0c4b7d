use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::annotation::AnnotationResult;
use crate::models::image::{
    ImageRecord, ProcessImageRequest, SearchResponse, SimilarResponse, SubmitResponse,
};
use crate::services::{jobs, similarity};

const DEFAULT_PAGE_SIZE: i64 = 20;
const DEFAULT_SIMILAR_LIMIT: usize = 10;

/// POST /api/process-image — submit an image for background annotation.
///
/// Always answers HTTP 200: the image is already durably stored before this
/// endpoint is called, so neither validation nor annotation problems fail the
/// call. Malformed payloads come back as a structured error body instead.
pub async fn process_image(
    State(state): State<AppState>,
    payload: Result<Json<ProcessImageRequest>, JsonRejection>,
) -> Json<SubmitResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected malformed submission payload");
            return Json(SubmitResponse::invalid(vec![rejection.body_text()]));
        }
    };

    if let Err(report) = request.validate() {
        let errors = report
            .iter()
            .map(|(path, error)| format!("{path}: {error}"))
            .collect();
        tracing::warn!(image_id = request.image_id, "rejected invalid submission");
        return Json(SubmitResponse::invalid(errors));
    }

    tracing::info!(
        image_id = request.image_id,
        user_id = %request.user_id,
        "image submitted for annotation"
    );
    metrics::counter!("annotation_jobs_total").increment(1);

    // The image itself is already stored; a bookkeeping failure here is
    // logged and the job proceeds anyway.
    if let Err(e) = queries::upsert_processing(
        &state.db,
        request.image_id,
        &request.user_id,
        &request.image_url,
    )
    .await
    {
        tracing::error!(image_id = request.image_id, error = %e, "failed to record processing status");
    }

    let image_id = request.image_id;
    tokio::spawn(jobs::run_annotation_job(
        state,
        image_id,
        request.image_url,
    ));

    Json(SubmitResponse::processing(image_id))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub color: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/search — filter a user's images by text or color, paginated.
pub async fn search_images(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let user_id = params.user_id.ok_or(StatusCode::BAD_REQUEST)?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let offset = (page - 1) * limit;

    let data = queries::search_page(
        &state.db,
        &user_id,
        params.query.as_deref(),
        params.color.as_deref(),
        limit,
        offset,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "search query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(SearchResponse {
        total: data.len(),
        data,
        page,
        limit,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/similar/{image_id} — ranked neighbor images for one image.
pub async fn similar_images(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarResponse>, StatusCode> {
    let user_id = params.user_id.ok_or(StatusCode::BAD_REQUEST)?;
    let limit = params.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT).clamp(1, 100);

    let target = queries::get_image(&state.db, image_id).await.map_err(|e| {
        tracing::error!(image_id, error = %e, "similarity target lookup failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let Some(target) = target.as_ref().and_then(record_annotations) else {
        // Unknown image or not yet annotated: nothing to rank against.
        return Ok(Json(SimilarResponse {
            data: Vec::new(),
            similarities: Vec::new(),
        }));
    };

    let records = queries::list_for_user(&state.db, &user_id, image_id)
        .await
        .map_err(|e| {
            tracing::error!(image_id, error = %e, "similarity candidate lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let candidates: Vec<(i64, AnnotationResult)> = records
        .iter()
        .filter_map(|record| record_annotations(record).map(|a| (record.image_id, a)))
        .collect();

    let ranked = similarity::rank(&target, &candidates, limit);

    let mut data = Vec::with_capacity(ranked.len());
    let mut similarities = Vec::with_capacity(ranked.len());
    for (id, score) in ranked {
        if let Some(record) = records.iter().find(|r| r.image_id == id) {
            data.push(record.clone());
            similarities.push(score);
        }
    }

    Ok(Json(SimilarResponse { data, similarities }))
}

/// View a persisted record as annotations, if it has been annotated.
fn record_annotations(record: &ImageRecord) -> Option<AnnotationResult> {
    Some(AnnotationResult {
        tags: record.tags.clone()?,
        description: record.description.clone()?,
        colors: record.colors.clone()?,
    })
}
