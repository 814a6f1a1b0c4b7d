//! Bounded in-memory cache for annotation results.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::models::annotation::AnnotationResult;

/// LRU cache of annotation results keyed by image reference.
///
/// Entries live for the process lifetime with no TTL; capacity-based eviction
/// is the only bound. Results from the degraded fallback path are cached the
/// same as successes, so a persistently failing reference is not re-attempted
/// against the provider.
pub struct AnnotationCache {
    inner: Mutex<LruCache<String, AnnotationResult>>,
}

impl AnnotationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, image_url: &str) -> Option<AnnotationResult> {
        self.inner.lock().get(image_url).cloned()
    }

    pub fn insert(&self, image_url: &str, result: AnnotationResult) {
        self.inner.lock().put(image_url.to_string(), result);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
