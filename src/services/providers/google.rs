//! Google Vision adapter: label detection, single request/response, no retry.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};

use super::{require_caption, CaptionProvider, ProviderError};

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

const MAX_LABELS: usize = 10;

pub struct GoogleVisionProvider {
    http: Client,
    api_key: String,
}

impl GoogleVisionProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl CaptionProvider for GoogleVisionProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn caption(&self, image_url: &str) -> Result<String, ProviderError> {
        // The annotate endpoint cannot reach arbitrary gallery URLs, so the
        // image is fetched and inlined as base64 content.
        let response = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("image download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "image download returned HTTP {}",
                response.status()
            )));
        }

        let image = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("image download failed: {e}")))?;

        let body = json!({
            "requests": [{
                "image": { "content": base64::engine::general_purpose::STANDARD.encode(&image) },
                "features": [{ "type": "LABEL_DETECTION", "maxResults": MAX_LABELS }]
            }]
        });

        let response = self
            .http
            .post(format!("{ANNOTATE_URL}?key={}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!("HTTP {status}: {detail}")));
        }

        let annotations: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let labels: Vec<&str> = annotations["responses"][0]["labelAnnotations"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["description"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        require_caption(caption_from_labels(&labels))
    }
}

/// Assemble a caption sentence from detected labels, most confident first.
fn caption_from_labels(labels: &[&str]) -> String {
    match labels {
        [] => String::new(),
        [only] => format!("An image of {only}."),
        [first, rest @ ..] => format!("An image of {first}, featuring {}.", rest.join(", ")),
    }
}
