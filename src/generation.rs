//! Generation collaborator.
//!
//! The pipeline treats the analysis model as opaque: a description (plus
//! optional plant type and retrieved context) goes in, a structured result
//! comes out. Failures surface as `RagError::Generation` and are handled
//! by the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::RagSettings;
use crate::core::errors::RagError;

const SYSTEM_PROMPT: &str = "You are an expert plant pathologist and agricultural specialist. \
Given a description of plant symptoms, provide a diagnosis with likely disease, severity, \
treatment recommendations, and prevention measures. Respond with a single JSON object using \
the keys: diagnosis, severity, treatments, prevention.";

/// External analysis model.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        description: &str,
        plant_type: Option<&str>,
        context: Option<&str>,
    ) -> Result<Value, RagError>;
}

/// HTTP client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpAnalysisClient {
    pub fn new(settings: &RagSettings) -> Self {
        Self {
            client: Client::new(),
            endpoint: settings.generation_endpoint.trim_end_matches('/').to_string(),
            model: settings.generation_model.clone(),
        }
    }

    fn build_user_prompt(
        description: &str,
        plant_type: Option<&str>,
        context: Option<&str>,
    ) -> String {
        let mut prompt = format!("Symptoms: {description}");
        if let Some(plant) = plant_type {
            prompt.push_str(&format!("\nPlant type: {plant}"));
        }
        if let Some(context) = context {
            prompt.push_str(&format!(
                "\n\nRelevant information from knowledge base:\n{context}"
            ));
        }
        prompt
    }
}

#[async_trait]
impl AnalysisProvider for HttpAnalysisClient {
    async fn analyze(
        &self,
        description: &str,
        plant_type: Option<&str>,
        context: Option<&str>,
    ) -> Result<Value, RagError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::build_user_prompt(description, plant_type, context)},
            ],
            "stream": false,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(RagError::generation)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "analysis request failed: {} {}",
                status, text
            )));
        }

        let payload: Value = response.json().await.map_err(RagError::generation)?;
        let content = extract_content(&payload).ok_or_else(|| {
            RagError::Generation("analysis response missing content".to_string())
        })?;

        Ok(parse_analysis(&content))
    }
}

fn extract_content(payload: &Value) -> Option<String> {
    let choice = payload
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())?;

    choice
        .get("message")
        .and_then(|msg| msg.get("content"))
        .and_then(|v| v.as_str())
        .or_else(|| choice.get("text").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// Interpret the model reply as a JSON object, wrapping plain text so the
/// pipeline always receives a structured result.
fn parse_analysis(content: &str) -> Value {
    let trimmed = content.trim();
    let candidate = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => value,
        _ => json!({ "analysis": trimmed }),
    }
}
