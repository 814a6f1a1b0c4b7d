//! Replicate adapter with rate-limit-aware retry across candidate models.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::time::sleep;

use super::{require_caption, CaptionProvider, ProviderError};

/// Captioning models tried in order; the free tier throttles hard, so each
/// gets one retry after a rate-limit wait before falling through.
const DEFAULT_CANDIDATES: [&str; 2] = ["lucataco/moondream2", "andreasjansson/blip-2"];

/// Safety margin added to a server-suggested rate-limit wait.
const RATE_LIMIT_BUFFER_SECS: u64 = 15;

/// Wait applied when the rate-limit error carries no usable hint.
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 70;

/// Interval between prediction status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls before an unfinished prediction is declared unavailable.
const MAX_POLLS: u32 = 300;

static WAIT_HINT_RE: OnceLock<Regex> = OnceLock::new();

pub struct ReplicateProvider {
    http: Client,
    api_key: String,
    candidates: Vec<String>,
}

impl ReplicateProvider {
    pub fn new(api_key: String, candidates: Option<Vec<String>>) -> Self {
        Self {
            http: Client::new(),
            api_key,
            candidates: candidates.unwrap_or_else(|| {
                DEFAULT_CANDIDATES.iter().map(|m| m.to_string()).collect()
            }),
        }
    }

    /// Create a prediction for one candidate model and poll it to a terminal
    /// state.
    async fn run_model(&self, model: &str, image_url: &str) -> Result<String, ProviderError> {
        let url = format!("https://api.replicate.com/v1/models/{model}/predictions");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": model_input(model, image_url) }))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let detail = response.text().await.unwrap_or_default();
            let retry_after = wait_hint_seconds(&detail);
            return Err(ProviderError::RateLimited { detail, retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(model.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthFailure(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let mut prediction: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let poll_url = prediction["urls"]["get"].as_str().map(str::to_string);

        let mut polls = 0;
        while !is_terminal(&prediction) {
            if polls >= MAX_POLLS {
                return Err(ProviderError::Unavailable(
                    "prediction did not reach a terminal state".to_string(),
                ));
            }
            polls += 1;
            sleep(POLL_INTERVAL).await;

            let Some(poll_url) = &poll_url else {
                return Err(ProviderError::Unavailable(
                    "prediction response missing poll URL".to_string(),
                ));
            };
            prediction = self
                .http
                .get(poll_url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?
                .json()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        }

        match prediction["status"].as_str() {
            Some("succeeded") => Ok(join_output(&prediction["output"])),
            other => Err(ProviderError::Unavailable(format!(
                "prediction {}: {}",
                other.unwrap_or("unknown"),
                prediction["error"].as_str().unwrap_or("no error detail")
            ))),
        }
    }
}

#[async_trait]
impl CaptionProvider for ReplicateProvider {
    fn name(&self) -> &'static str {
        "replicate"
    }

    async fn caption(&self, image_url: &str) -> Result<String, ProviderError> {
        let mut last_error = ProviderError::Unavailable("no candidate models configured".to_string());

        for model in &self.candidates {
            tracing::debug!(model = %model, "trying replicate model");
            match self.run_model(model, image_url).await {
                Ok(raw) => match require_caption(raw) {
                    Ok(caption) => return Ok(caption),
                    Err(e) => {
                        last_error = e;
                        continue;
                    }
                },
                Err(ProviderError::RateLimited { retry_after, .. }) => {
                    // The quota is per-minute: wait once, then give the same
                    // candidate exactly one more chance before moving on.
                    let wait = retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS);
                    tracing::warn!(
                        model = %model,
                        wait_secs = wait,
                        "rate limited, waiting before single retry"
                    );
                    sleep(Duration::from_secs(wait)).await;

                    match self.run_model(model, image_url).await {
                        Ok(raw) => match require_caption(raw) {
                            Ok(caption) => return Ok(caption),
                            Err(e) => {
                                last_error = e;
                                continue;
                            }
                        },
                        Err(e) => {
                            tracing::warn!(model = %model, error = %e, "retry after rate-limit wait failed");
                            last_error = e;
                            continue;
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(model = %model, error = %e, "replicate model failed");
                    last_error = e;
                    continue;
                }
            }
        }

        Err(ProviderError::Unavailable(format!(
            "all candidate models failed, last error: {last_error}"
        )))
    }
}

/// Per-model prediction input, matching each model's expected schema.
fn model_input(model: &str, image_url: &str) -> Value {
    if model.contains("blip") {
        json!({
            "image": image_url,
            "question": "What is in this image? Describe it and list relevant tags."
        })
    } else {
        json!({
            "prompt": "Describe this image. List objects, colors, and scene details.",
            "image": image_url
        })
    }
}

fn is_terminal(prediction: &Value) -> bool {
    matches!(
        prediction["status"].as_str(),
        Some("succeeded") | Some("failed") | Some("canceled")
    )
}

/// Flatten prediction output into a single caption string.
fn join_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|part| match part {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => ["caption", "description", "text", "output"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| output.to_string()),
        _ => String::new(),
    }
}

/// Wait hint from a rate-limit rejection, if the error text carries one.
///
/// A trailing `resets in ~Ns` yields N plus a safety buffer; callers fall
/// back to the fixed default wait when no hint is present.
fn wait_hint_seconds(detail: &str) -> Option<u64> {
    let re = WAIT_HINT_RE.get_or_init(|| {
        Regex::new(r"(?i)resets in.*?~?(\d+)s").expect("rate-limit hint pattern is valid")
    });

    re.captures(detail)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|secs| secs + RATE_LIMIT_BUFFER_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_hint_extracted_with_buffer() {
        let detail = "Request was throttled. Your prediction quota resets in ~12s.";
        assert_eq!(wait_hint_seconds(detail), Some(27));
    }

    #[test]
    fn test_wait_hint_without_tilde() {
        assert_eq!(wait_hint_seconds("rate limit resets in 10s"), Some(25));
    }

    #[test]
    fn test_default_wait_without_hint() {
        let wait = wait_hint_seconds("Request was throttled.").unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS);
        assert_eq!(wait, 70);
        assert_eq!(wait_hint_seconds(""), None);
    }

    #[test]
    fn test_join_output_shapes() {
        assert_eq!(join_output(&json!("a cat")), "a cat");
        assert_eq!(join_output(&json!(["a", "cat"])), "a cat");
        assert_eq!(join_output(&json!({"caption": "a cat"})), "a cat");
        assert_eq!(join_output(&json!(null)), "");
    }

    #[test]
    fn test_model_input_schemas() {
        let blip = model_input("andreasjansson/blip-2", "https://example.com/x.png");
        assert!(blip.get("question").is_some());
        let moondream = model_input("lucataco/moondream2", "https://example.com/x.png");
        assert!(moondream.get("prompt").is_some());
    }
}
