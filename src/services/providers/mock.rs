//! Deterministic mock provider for development and unconfigured deployments.

use std::time::Duration;

use async_trait::async_trait;

use super::{CaptionProvider, ProviderError};

/// Simulated processing time before the fixed caption is returned.
const MOCK_DELAY: Duration = Duration::from_secs(1);

/// Fixed caption, worded so tag extraction yields a full tag set.
const MOCK_CAPTION: &str =
    "A beautiful landscape with natural scenery, vibrant colors and scenic outdoor photography.";

pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptionProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn caption(&self, _image_url: &str) -> Result<String, ProviderError> {
        tokio::time::sleep(MOCK_DELAY).await;
        Ok(MOCK_CAPTION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tags::extract_tags;

    #[tokio::test]
    async fn test_mock_caption_is_deterministic() {
        let provider = MockProvider::new();
        let first = provider.caption("https://example.com/a.png").await.unwrap();
        let second = provider.caption("https://example.com/b.png").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_mock_caption_yields_full_tag_set() {
        let provider = MockProvider::new();
        let caption = provider.caption("https://example.com/a.png").await.unwrap();
        assert!(extract_tags(&caption).len() >= 5);
    }
}
