// src/services/ai.rs
//
// Client for the AI relay and helpers for pulling structured JSON back out of
// its free-text answers.
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::Http;
use crate::error::{Result, SourceError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<RelayMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

impl RelayRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, max_tokens: u32) -> Self {
        RelayRequest {
            model: None,
            max_tokens,
            system: system.into(),
            messages: vec![RelayMessage {
                role: "user".to_string(),
                content: user.into(),
            }],
            tools: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_web_search(mut self, max_uses: u32) -> Self {
        self.tools = Some(vec![serde_json::json!({
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": max_uses,
        })]);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelayResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl RelayResponse {
    pub fn from_text(text: &str) -> Self {
        RelayResponse {
            content: vec![ContentBlock {
                kind: "text".to_string(),
                text: Some(text.to_string()),
            }],
        }
    }

    fn texts(&self) -> impl Iterator<Item = &str> {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
    }

    /// With web search on, the answer is the last text block; earlier ones are narration.
    pub fn last_text(&self) -> Result<&str> {
        self.texts()
            .last()
            .ok_or_else(|| SourceError::Empty("no text block in relay response".into()))
    }

    pub fn joined_text(&self) -> Result<String> {
        let joined: Vec<&str> = self.texts().collect();
        if joined.is_empty() {
            return Err(SourceError::Empty("no text block in relay response".into()));
        }
        Ok(joined.join(""))
    }
}

#[async_trait]
pub trait AiRelay: Send + Sync {
    async fn complete(&self, request: &RelayRequest) -> Result<RelayResponse>;
}

pub struct AiRelayClient {
    http: Http,
    url: String,
    model: Option<String>,
}

impl AiRelayClient {
    pub fn new(http: Http, url: impl Into<String>, model: Option<String>) -> Self {
        AiRelayClient {
            http,
            url: url.into(),
            model,
        }
    }
}

#[derive(Deserialize)]
struct RelayErrorBody {
    error: Option<RelayErrorDetail>,
}

#[derive(Deserialize)]
struct RelayErrorDetail {
    message: Option<String>,
}

#[async_trait]
impl AiRelay for AiRelayClient {
    async fn complete(&self, request: &RelayRequest) -> Result<RelayResponse> {
        let mut request = request.clone();
        if self.model.is_some() {
            request.model = self.model.clone();
        }

        info!(
            "[AI] relay call, model {}, {} max tokens",
            request.model.as_deref().unwrap_or("relay default"),
            request.max_tokens
        );
        let resp = self
            .http
            .client()
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.http.map_err(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.http.map_err(e))?;
        if !status.is_success() {
            let detail = serde_json::from_str::<RelayErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|d| d.message);
            debug!("[AI] relay HTTP {}: {:?}", status, detail);
            return Err(SourceError::Status {
                source_name: detail.unwrap_or_else(|| "AI relay".to_string()),
                status: status.as_u16(),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

pub fn strip_code_fences(text: &str) -> Result<String> {
    let fence = Regex::new(r"(?i)```(?:json)?")?;
    Ok(fence.replace_all(text, "").trim().to_string())
}

/// Parses a JSON object out of model text: whole text first, then the outermost `{...}` span.
pub fn extract_object(text: &str) -> Result<Value> {
    extract(text, r"(?s)\{.+\}")
}

/// Same as `extract_object` for a top-level array.
pub fn extract_array(text: &str) -> Result<Value> {
    extract(text, r"(?s)\[.+\]")
}

fn extract(text: &str, span: &str) -> Result<Value> {
    let clean = strip_code_fences(text)?;
    if let Ok(value) = serde_json::from_str::<Value>(&clean) {
        return Ok(value);
    }
    let re = Regex::new(span)?;
    let found = re
        .find(&clean)
        .ok_or_else(|| SourceError::Parse("no JSON found in relay response".into()))?;
    Ok(serde_json::from_str(found.as_str())?)
}

pub fn require_keys(value: &Value, keys: &[&str]) -> Result<()> {
    for key in keys {
        if value.get(key).is_none() {
            return Err(SourceError::Schema(format!("missing required key '{}'", key)));
        }
    }
    Ok(())
}
