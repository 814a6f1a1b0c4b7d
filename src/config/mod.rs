use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Active vision provider: replicate, huggingface, local, openai,
    /// google, or mock
    #[serde(default = "default_ai_service")]
    pub ai_service: String,

    /// Credential for the active provider, if it needs one
    pub ai_api_key: Option<String>,

    /// Comma-separated override of the provider's candidate model list
    pub ai_model_candidates: Option<String>,

    /// Path to the local caption model (local provider only)
    pub local_model_path: Option<String>,

    /// Path to the local caption label vocabulary (local provider only)
    pub local_model_labels: Option<String>,

    /// Maximum entries held by the in-memory annotation cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_ai_service() -> String {
    "replicate".to_string()
}

fn default_cache_capacity() -> usize {
    4096
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Candidate model override as an ordered list, if configured.
    pub fn model_candidates(&self) -> Option<Vec<String>> {
        let raw = self.ai_model_candidates.as_deref()?;
        let candidates: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some(candidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_candidates(raw: Option<&str>) -> AppConfig {
        AppConfig {
            bind_addr: default_bind_addr(),
            database_url: "postgres://localhost/test".to_string(),
            ai_service: default_ai_service(),
            ai_api_key: None,
            ai_model_candidates: raw.map(str::to_string),
            local_model_path: None,
            local_model_labels: None,
            cache_capacity: default_cache_capacity(),
        }
    }

    #[test]
    fn test_model_candidates_parsing() {
        let config = config_with_candidates(Some("a/b, c/d ,"));
        assert_eq!(
            config.model_candidates().unwrap(),
            vec!["a/b".to_string(), "c/d".to_string()]
        );
    }

    #[test]
    fn test_model_candidates_absent_or_blank() {
        assert!(config_with_candidates(None).model_candidates().is_none());
        assert!(config_with_candidates(Some(" , ")).model_candidates().is_none());
    }
}
