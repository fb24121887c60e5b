use std::time::Duration;

use anyhow::{bail, Context, Result};
use moodboard_contracts::log::Logger;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::{error_chain_text, truncate_text};

/// Raw reply of the text-generation endpoint. `body` is `Null` when the
/// payload was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct TextResponse {
    pub status: u16,
    pub body: Value,
}

impl TextResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// External text-generation call used to draft image briefs.
pub trait BriefClient: Send + Sync {
    fn generate(&self, api_key: &str, instruction: &str) -> Result<TextResponse>;
}

pub struct GeminiBriefClient {
    api_base: String,
    model: String,
    http: HttpClient,
}

impl GeminiBriefClient {
    pub fn new(api_base: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            http,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.api_base, &config.text_model, config.brief_timeout)
    }

    pub fn endpoint(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl BriefClient for GeminiBriefClient {
    fn generate(&self, api_key: &str, instruction: &str) -> Result<TextResponse> {
        let endpoint = self.endpoint();
        let payload = json!({
            "contents": [{ "parts": [{ "text": instruction }] }],
        });
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let status = response.status().as_u16();
        let raw = response.text().context("Gemini response body read failed")?;
        let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
        Ok(TextResponse { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderTag {
    NoCredential,
    Failure,
}

impl PlaceholderTag {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoCredential => "No credential",
            Self::Failure => "Failure",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::NoCredential => "no-credential",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefBatch {
    pub briefs: Vec<String>,
    /// Set when the briefs are stand-ins rather than generated text.
    pub placeholder: Option<PlaceholderTag>,
}

impl BriefBatch {
    fn placeholders(tag: PlaceholderTag, count: usize) -> Self {
        Self {
            briefs: (1..=count)
                .map(|idx| format!("{} placeholder {idx}", tag.label()))
                .collect(),
            placeholder: Some(tag),
        }
    }
}

pub fn brief_instruction(prompt: &str, desired_count: usize) -> String {
    format!(
        "Create {desired_count} concise distinct Indian wedding moodboard image briefs (no numbering) for:\n{prompt}"
    )
}

/// Obtains up to `desired_count` briefs, degrading to tagged placeholders
/// when there is no credential or the call fails or yields nothing usable.
pub fn acquire_briefs(
    client: &dyn BriefClient,
    prompt: &str,
    desired_count: usize,
    credential: Option<&str>,
    logger: &Logger,
) -> BriefBatch {
    let Some(api_key) = credential.map(str::trim).filter(|key| !key.is_empty()) else {
        logger.info("No API key provided, returning placeholders", None);
        return BriefBatch::placeholders(PlaceholderTag::NoCredential, desired_count);
    };

    match request_briefs(client, api_key, prompt, desired_count, logger) {
        Ok(briefs) if !briefs.is_empty() => {
            logger.info("Generated briefs", json!({ "briefs": briefs }));
            return BriefBatch {
                briefs,
                placeholder: None,
            };
        }
        Ok(_) => logger.error("Gemini returned no usable briefs", None),
        Err(err) => logger.error(
            "Gemini brief request failed",
            json!({ "error": error_chain_text(&err, 512) }),
        ),
    }

    logger.error("All strategies failed, returning placeholders", None);
    BriefBatch::placeholders(PlaceholderTag::Failure, desired_count)
}

fn request_briefs(
    client: &dyn BriefClient,
    api_key: &str,
    prompt: &str,
    desired_count: usize,
    logger: &Logger,
) -> Result<Vec<String>> {
    let response = client.generate(api_key, &brief_instruction(prompt, desired_count))?;
    logger.info("Text brief endpoint status", json!({ "status": response.status }));
    if !response.is_success() {
        bail!(
            "Gemini request failed ({}): {}",
            response.status,
            truncate_text(&response.body.to_string(), 512)
        );
    }
    let Some(body) = response.body.as_object() else {
        bail!("Gemini returned invalid JSON payload");
    };
    logger.info(
        "Text brief response parsed",
        json!({ "keys": body.keys().collect::<Vec<_>>() }),
    );
    Ok(parse_briefs(&extract_text(&response.body), desired_count))
}

/// Joins the text parts of the first candidate; missing fields read as empty.
pub fn extract_text(body: &Value) -> String {
    body.get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<&str>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Splits free-form model text into at most `limit` briefs, one per
/// non-blank line, with stray list markers removed.
pub fn parse_briefs(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim();
    let without_bullet = trimmed
        .strip_prefix(&['-', '*', '•'][..])
        .map(str::trim_start)
        .unwrap_or(trimmed);
    let digits = without_bullet
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits > 0 {
        let rest = &without_bullet[digits..];
        if let Some(after) = rest.strip_prefix(&['.', ')'][..]) {
            return after.trim_start();
        }
    }
    without_bullet
}
