//! OpenAI vision adapter: single request/response, no retry.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{require_caption, CaptionProvider, ProviderError};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const VISION_MODEL: &str = "gpt-4-vision-preview";

const PROMPT: &str =
    "Describe this image in one or two sentences, mentioning the main objects, the scene, and the dominant colors.";

pub struct OpenAiVisionProvider {
    http: Client,
    api_key: String,
}

impl OpenAiVisionProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl CaptionProvider for OpenAiVisionProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn caption(&self, image_url: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": VISION_MODEL,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PROMPT },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            }],
            "max_tokens": 300
        });

        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!("HTTP {status}: {detail}")));
        }

        let completion: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let caption = completion["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        require_caption(caption)
    }
}
