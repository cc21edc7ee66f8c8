//! Gemini `generateContent` client.

use super::{GatewayError, GatewayResult, ReasoningGateway};
use crate::config::GatewayConfig;
use crate::prompts::PromptKind;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Characters of an error body kept in failure details.
const ERROR_BODY_LIMIT: usize = 300;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

/// HTTP gateway backed by the Generative Language API.
pub struct GeminiGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiGateway {
    pub fn new(config: &GatewayConfig, api_key: String) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl ReasoningGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, kind: PromptKind, prompt: &str) -> GatewayResult<String> {
        debug!(kind = kind.as_str(), model = %self.model, prompt_chars = prompt.len(), "Calling gateway");

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GatewayError::Unavailable(e.to_string())
                } else {
                    GatewayError::Failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(GatewayError::Failed(format!("HTTP {}: {}", status, snippet)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Failed(format!("unreadable response envelope: {}", e)))?;

        parsed
            .text()
            .ok_or_else(|| GatewayError::Failed("response contained no candidates".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_candidate_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"task_id\":1,"},{"text":"\"priority\":80}]"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().unwrap(), r#"[{"task_id":1,"priority":80}]"#);
    }

    #[test]
    fn missing_candidates_yield_none() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn builds_model_url() {
        let config = GatewayConfig {
            endpoint: "https://example.test/v1beta/".to_string(),
            model: "gemini-pro".to_string(),
            ..GatewayConfig::default()
        };
        let gateway = GeminiGateway::new(&config, "key".to_string()).unwrap();
        assert_eq!(
            gateway.url(),
            "https://example.test/v1beta/models/gemini-pro:generateContent"
        );
    }
}
