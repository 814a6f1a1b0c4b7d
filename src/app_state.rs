use sqlx::PgPool;
use std::sync::Arc;

use crate::services::annotator::Annotator;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub annotator: Arc<Annotator>,
    /// Configured provider selection, for health reporting.
    pub ai_service: String,
    /// Whether a provider credential is configured (presence only).
    pub ai_key_configured: bool,
}

impl AppState {
    pub fn new(
        db: PgPool,
        annotator: Annotator,
        ai_service: String,
        ai_key_configured: bool,
    ) -> Self {
        Self {
            db,
            annotator: Arc::new(annotator),
            ai_service,
            ai_key_configured,
        }
    }
}
