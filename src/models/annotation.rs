use serde::{Deserialize, Serialize};

/// Annotations produced for a single image.
///
/// Invariants, upheld by the orchestrator on every path (including degraded
/// fallback): 1-10 deduplicated tags, a non-empty description of at most 200
/// characters, and exactly 3 `#rrggbb` color strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationResult {
    pub tags: Vec<String>,
    pub description: String,
    pub colors: Vec<String>,
}
