//! Annotation orchestrator: provider dispatch, caching, degradation.

use std::sync::Arc;

use crate::models::annotation::AnnotationResult;
use crate::services::cache::AnnotationCache;
use crate::services::colors;
use crate::services::providers::CaptionProvider;
use crate::services::tags::{extract_tags, MAX_TAGS};

/// Tags a successful caption is padded with until it carries at least
/// [`MIN_TAGS`].
const GENERIC_TAGS: [&str; 5] = ["image", "photo", "picture", "visual", "graphic"];

/// Minimum tag count on the success path.
const MIN_TAGS: usize = 5;

/// Maximum description length in characters.
const MAX_DESCRIPTION_LEN: usize = 200;

/// Tag set used when every provider attempt has failed.
const DEGRADED_TAGS: [&str; 3] = ["image", "photo", "picture"];

const DEGRADED_DESCRIPTION: &str =
    "Image processing encountered an error. Please try again later.";

/// Drives a single caption provider and derives the full annotation set.
///
/// `annotate` never fails outward: provider errors of any kind collapse into
/// a degraded-but-valid result, and every result (degraded included) is
/// cached so a persistently failing reference is not retried.
pub struct Annotator {
    provider: Arc<dyn CaptionProvider>,
    cache: AnnotationCache,
    http: reqwest::Client,
}

impl Annotator {
    pub fn new(provider: Arc<dyn CaptionProvider>, http: reqwest::Client, cache_capacity: usize) -> Self {
        Self {
            provider,
            cache: AnnotationCache::new(cache_capacity),
            http,
        }
    }

    /// Name of the active provider, for health reporting.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Annotate the image at `image_url`, consulting the cache first.
    pub async fn annotate(&self, image_url: &str) -> AnnotationResult {
        if let Some(hit) = self.cache.get(image_url) {
            tracing::debug!(url = %image_url, "annotation cache hit");
            metrics::counter!("annotation_cache_hits").increment(1);
            return hit;
        }

        let result = match self.provider.caption(image_url).await {
            Ok(caption) => {
                let mut tags = extract_tags(&caption);
                pad_tags(&mut tags);

                // Colors come from pixels, not the provider, so they are
                // extracted on every path.
                let colors = colors::extract(&self.http, image_url).await;

                AnnotationResult {
                    tags,
                    description: truncate_chars(&caption, MAX_DESCRIPTION_LEN),
                    colors,
                }
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    url = %image_url,
                    error = %e,
                    "caption provider failed, producing degraded annotations"
                );

                let colors = colors::extract(&self.http, image_url).await;

                AnnotationResult {
                    tags: DEGRADED_TAGS.iter().map(|t| t.to_string()).collect(),
                    description: DEGRADED_DESCRIPTION.to_string(),
                    colors,
                }
            }
        };

        self.cache.insert(image_url, result.clone());
        tracing::debug!(cache_size = self.cache.len(), "annotation cached");
        result
    }
}

/// Pad short tag lists with generic fallbacks, skipping duplicates, and cap
/// the result.
fn pad_tags(tags: &mut Vec<String>) {
    for generic in GENERIC_TAGS {
        if tags.len() >= MIN_TAGS {
            break;
        }
        if !tags.iter().any(|t| t == generic) {
            tags.push(generic.to_string());
        }
    }
    tags.truncate(MAX_TAGS);
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
