use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::ProcessingStatus;

/// Request to annotate an already-uploaded image.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProcessImageRequest {
    #[garde(range(min = 1))]
    pub image_id: i64,

    #[garde(length(min = 1, max = 128))]
    pub user_id: String,

    #[garde(length(min = 1, max = 2048))]
    pub image_url: String,
}

/// Response after submitting an image for annotation.
///
/// Always served with HTTP 200: the image itself is already durably stored
/// before annotation is attempted, so annotation submission never fails the
/// transport call. Validation problems come back as `status: "error"` with
/// per-field messages.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl SubmitResponse {
    pub fn processing(image_id: i64) -> Self {
        Self {
            status: "processing".to_string(),
            image_id: Some(image_id),
            message: None,
            errors: None,
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            status: "error".to_string(),
            image_id: None,
            message: Some("Invalid request format".to_string()),
            errors: Some(errors),
        }
    }
}

/// Persisted per-image annotation record.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub image_id: i64,
    pub user_id: String,
    pub image_url: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub ai_processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A page of search results.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub data: Vec<ImageRecord>,
    pub total: usize,
    pub page: i64,
    pub limit: i64,
}

/// Ranked neighbor images with their parallel similarity scores.
#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub data: Vec<ImageRecord>,
    pub similarities: Vec<f64>,
}
