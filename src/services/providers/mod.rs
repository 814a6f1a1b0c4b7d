//! Vision caption providers behind a common `annotate`-style contract.
//!
//! Each adapter turns an image reference into a raw caption; tag and color
//! derivation happen in the orchestrator. Adapter errors never cross the
//! orchestrator boundary.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use strum::{Display, EnumString};

use crate::config::AppConfig;

pub mod google;
pub mod hf;
pub mod local;
pub mod mock;
pub mod openai;
pub mod replicate;

/// Captions shorter than this are treated as an empty result.
const MIN_CAPTION_LEN: usize = 5;

/// Non-recoverable adapter failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("model or endpoint not found: {0}")]
    NotFound(String),

    #[error("rate limited: {detail}")]
    RateLimited {
        detail: String,
        /// Server-suggested wait (with safety buffer), when the error text
        /// carried a usable hint.
        retry_after: Option<u64>,
    },

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider returned an empty or too-short caption")]
    EmptyResult,
}

/// A vision captioning backend.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Short provider identifier for logs and health reporting.
    fn name(&self) -> &'static str;

    /// Produce a free-text caption for the image at `image_url`.
    async fn caption(&self, image_url: &str) -> Result<String, ProviderError>;
}

/// Configured provider selection, parsed once from `AI_SERVICE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    Local,
    Huggingface,
    Replicate,
    Openai,
    Google,
    Mock,
}

/// Build the active provider from startup configuration.
///
/// This is the single selection point: a provider that requires a credential
/// but has none configured falls back to the mock adapter, as does an unknown
/// `AI_SERVICE` value.
pub fn build_provider(config: &AppConfig) -> Arc<dyn CaptionProvider> {
    let kind = ProviderKind::from_str(&config.ai_service).unwrap_or_else(|_| {
        tracing::warn!(service = %config.ai_service, "unknown AI_SERVICE, using mock provider");
        ProviderKind::Mock
    });

    let candidates = config.model_candidates();

    match kind {
        ProviderKind::Mock => Arc::new(mock::MockProvider::new()),
        ProviderKind::Local => Arc::new(local::LocalModelProvider::new(
            config.local_model_path.clone(),
            config.local_model_labels.clone(),
        )),
        ProviderKind::Huggingface => Arc::new(hf::HfInferenceProvider::new(
            config.ai_api_key.clone(),
            candidates,
        )),
        ProviderKind::Replicate => match &config.ai_api_key {
            Some(key) => Arc::new(replicate::ReplicateProvider::new(key.clone(), candidates)),
            None => fallback_to_mock(kind),
        },
        ProviderKind::Openai => match &config.ai_api_key {
            Some(key) => Arc::new(openai::OpenAiVisionProvider::new(key.clone())),
            None => fallback_to_mock(kind),
        },
        ProviderKind::Google => match &config.ai_api_key {
            Some(key) => Arc::new(google::GoogleVisionProvider::new(key.clone())),
            None => fallback_to_mock(kind),
        },
    }
}

fn fallback_to_mock(kind: ProviderKind) -> Arc<dyn CaptionProvider> {
    tracing::warn!(provider = %kind, "AI_API_KEY not configured, using mock provider");
    Arc::new(mock::MockProvider::new())
}

/// Reject captions that are absent or too short to be meaningful.
fn require_caption(raw: String) -> Result<String, ProviderError> {
    let caption = raw.trim().to_string();
    if caption.len() < MIN_CAPTION_LEN {
        return Err(ProviderError::EmptyResult);
    }
    Ok(caption)
}
