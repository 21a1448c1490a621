//! Minimal Gemini `generateContent` client shared by the labeler and the
//! drafter.

use std::time::Duration;

use anyhow::{bail, Result};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(model: &str, api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            model: model.to_string(),
            api_key,
            client,
        })
    }

    /// Send one text prompt and return the reply text.
    pub async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": temperature},
        });

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        response_text(&json)
    }
}

/// `GEMINI_API_KEY` from the environment, if set and non-blank.
pub fn api_key_from_env() -> Option<String> {
    std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Concatenate the text parts of the first candidate.
pub fn response_text(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_parts() {
        let json = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "{\"labels\""}, {"text": ": []}"}]}}]
        });
        assert_eq!(response_text(&json).unwrap(), "{\"labels\": []}");
        assert!(response_text(&serde_json::json!({"candidates": []})).is_err());
    }

    #[test]
    fn test_response_text_rejects_blank() {
        let json = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "  "}]}}]
        });
        assert!(response_text(&json).is_err());
    }
}
