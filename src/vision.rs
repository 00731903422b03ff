// Vision client: sends one local image plus a prompt to an OpenAI-compatible
// chat completions endpoint (the local Senter server) and extracts the
// model's answer. Single request, no caching.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SENTER_URL: &str = "http://localhost:8081";
pub const DEFAULT_MODEL: &str = "qwen2.5-omni:3b";
pub const DEFAULT_PROMPT: &str = "Analyze this screen.";
pub const CHAT_ENDPOINT: &str = "/v1/chat/completions";

/// Model inference on a small local server can be slow.
pub const VISION_TIMEOUT: Duration = Duration::from_secs(300);

const MAX_TOKENS: u32 = 512;
const TEMPERATURE: f32 = 0.1;

#[derive(Clone, Debug)]
pub struct VisionClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Value,
}

/// What came back from a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// The model's answer.
    Answer(String),
    /// Valid JSON without a `choices` key; carries the raw body.
    ApiError(String),
    /// Body was not JSON; carries the raw body.
    InvalidJson(String),
}

impl VisionClient {
    /// Configure from `SENTER_URL` and `VISION_MODEL`, falling back to the
    /// local defaults.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SENTER_URL").unwrap_or_else(|_| DEFAULT_SENTER_URL.into());
        let model = std::env::var("VISION_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Self::new(&base_url, &model, VISION_TIMEOUT)
    }

    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| Error::transport("Failed to build HTTP client", e))?;
        Ok(VisionClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Read the image at `path` and ask the model about it.
    pub fn analyze_file(&self, path: &Path, prompt: &str) -> Result<Analysis> {
        let bytes = std::fs::read(path).map_err(|source| Error::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        self.analyze(&bytes, prompt)
    }

    /// Send the image as a PNG data URL next to the prompt. Transport
    /// failures, non-success statuses and unusable `choices` are errors;
    /// any other completed exchange is classified into an `Analysis`.
    pub fn analyze(&self, image: &[u8], prompt: &str) -> Result<Analysis> {
        let url = format!("{}{}", self.base_url, CHAT_ENDPOINT);
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(image));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        info!(model = %self.model, "Calling vision model...");
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| Error::transport("Vision request failed", e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::http_status("Vision request failed", status));
        }
        let raw = res
            .text()
            .map_err(|e| Error::transport("Failed to read vision response", e))?;
        debug!(bytes = raw.len(), "vision response received");
        classify_response(raw)
    }
}

/// Sort a completed response. Only a body without a `choices` key is an
/// API error; a `choices` list that is empty or lacks `message.content` is
/// a decode error, which the caller reports like a failed request.
fn classify_response(raw: String) -> Result<Analysis> {
    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => return Ok(Analysis::InvalidJson(raw)),
    };
    if value.get("choices").is_none() {
        return Ok(Analysis::ApiError(raw));
    }
    let resp: ChatResponse = serde_json::from_value(value)
        .map_err(|e| Error::Decode(format!("Malformed choices in vision response: {}", e)))?;
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Decode("Vision response has an empty choices list".into()))?;
    let content = match choice.message.content {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Analysis::Answer(content))
}
