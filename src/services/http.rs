// src/services/http.rs
use log::debug;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Result, SourceError};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Shared reqwest client with a per-request timeout and a browser user agent.
#[derive(Debug, Clone)]
pub struct Http {
    client: Client,
    timeout: Duration,
}

impl Http {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Http { client, timeout })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn map_err(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout.as_secs())
        } else {
            SourceError::Transport(e)
        }
    }

    /// GET a body as text, treating any non-2xx status as a failure.
    pub async fn get_text(&self, source_name: &str, url: &str, accept: &str) -> Result<String> {
        debug!("[{}] GET {}", source_name, url);
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_name: source_name.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|e| self.map_err(e))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, source_name: &str, url: &str) -> Result<T> {
        let text = self.get_text(source_name, url, "application/json").await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Percent-encodes a query or path component (spaces become `%20`, never `+`).
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
