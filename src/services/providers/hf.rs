//! Hugging Face inference adapter cascading over endpoint URL templates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::sleep;

use super::{require_caption, CaptionProvider, ProviderError};

/// Known inference endpoint shapes, tried in order per candidate model. The
/// hosted API has moved several times; older routes answer 410 for migrated
/// models.
const ENDPOINT_TEMPLATES: [&str; 4] = [
    "https://api-inference.huggingface.co/models/{model}",
    "https://router.huggingface.co/hf-inference/models/{model}",
    "https://inference.huggingface.co/models/{model}",
    "https://api-inference.huggingface.co/deployed-models/{model}",
];

const DEFAULT_CANDIDATES: [&str; 3] = [
    "Salesforce/blip-image-captioning-base",
    "Salesforce/blip-image-captioning-large",
    "nlpconnect/vit-gpt2-image-captioning",
];

/// Wait before retrying an endpoint that answered 503 (model cold start).
const MODEL_LOADING_WAIT: Duration = Duration::from_secs(20);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HfInferenceProvider {
    http: Client,
    token: Option<String>,
    candidates: Vec<String>,
}

impl HfInferenceProvider {
    pub fn new(token: Option<String>, candidates: Option<Vec<String>>) -> Self {
        Self {
            http: Client::new(),
            token,
            candidates: candidates.unwrap_or_else(|| {
                DEFAULT_CANDIDATES.iter().map(|m| m.to_string()).collect()
            }),
        }
    }

    async fn post_image(&self, url: &str, image: &[u8]) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http
            .post(url)
            .body(image.to_vec())
            .timeout(REQUEST_TIMEOUT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request.send().await
    }

    /// Try every endpoint shape for one candidate model.
    async fn try_model(&self, model: &str, image: &[u8]) -> Result<String, ProviderError> {
        let mut last_error = ProviderError::NotFound(model.to_string());

        for template in ENDPOINT_TEMPLATES {
            let url = template.replace("{model}", model);

            let mut response = match self.post_image(&url, image).await {
                Ok(r) => r,
                Err(e) => {
                    last_error = ProviderError::Unavailable(e.to_string());
                    continue;
                }
            };

            // 410: this endpoint shape no longer serves the model.
            if response.status() == StatusCode::GONE {
                tracing::debug!(url = %url, "endpoint deprecated, trying next");
                last_error = ProviderError::NotFound(url);
                continue;
            }

            // 503: model is loading; wait a fixed interval and retry the same
            // endpoint once.
            if response.status() == StatusCode::SERVICE_UNAVAILABLE {
                tracing::debug!(url = %url, "model loading, waiting before retry");
                sleep(MODEL_LOADING_WAIT).await;
                response = match self.post_image(&url, image).await {
                    Ok(r) => r,
                    Err(e) => {
                        last_error = ProviderError::Unavailable(e.to_string());
                        continue;
                    }
                };
            }

            if !response.status().is_success() {
                last_error = ProviderError::Unavailable(format!("HTTP {}", response.status()));
                continue;
            }

            let body: Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    last_error = ProviderError::Unavailable(format!("invalid JSON response: {e}"));
                    continue;
                }
            };

            match require_caption(parse_caption(&body)) {
                Ok(caption) => return Ok(caption),
                Err(e) => {
                    last_error = e;
                    continue;
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl CaptionProvider for HfInferenceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn caption(&self, image_url: &str) -> Result<String, ProviderError> {
        // The inference API takes raw image bytes, so the image is fetched
        // here rather than passed through by reference.
        let response = self
            .http
            .get(image_url)
            .timeout(REQUEST_TIMEOUT)
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

        let mut last_error = ProviderError::Unavailable("no candidate models configured".to_string());

        for model in &self.candidates {
            tracing::debug!(model = %model, "trying inference model");
            match self.try_model(model, &image).await {
                Ok(caption) => return Ok(caption),
                Err(e) => {
                    tracing::debug!(model = %model, error = %e, "inference model failed");
                    last_error = e;
                }
            }
        }

        Err(ProviderError::Unavailable(format!(
            "all inference endpoints failed, last error: {last_error}"
        )))
    }
}

/// Pull the caption out of the endpoint's list-or-object response shape.
fn parse_caption(body: &Value) -> String {
    let item = match body {
        Value::Array(items) => items.first().unwrap_or(body),
        other => other,
    };

    match item {
        Value::Object(map) => ["generated_text", "caption"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_caption_list_shape() {
        let body = json!([{"generated_text": "a dog on a beach"}]);
        assert_eq!(parse_caption(&body), "a dog on a beach");
    }

    #[test]
    fn test_parse_caption_object_shape() {
        assert_eq!(parse_caption(&json!({"caption": "a red barn"})), "a red barn");
        assert_eq!(parse_caption(&json!({"error": "loading"})), "");
    }

    #[test]
    fn test_parse_caption_bare_string() {
        assert_eq!(parse_caption(&json!("snow covered peak")), "snow covered peak");
    }

    #[test]
    fn test_endpoint_template_expansion() {
        let url = ENDPOINT_TEMPLATES[0].replace("{model}", "Salesforce/blip-image-captioning-base");
        assert_eq!(
            url,
            "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-base"
        );
    }
}
