//! Gemini `generateContent` client behind the completion capability.
//!
//! Error descriptions keep fixed prefixes (`Request failed:`, `API error:`,
//! `Failed to parse response:`) because the chat controller classifies
//! failures from the text alone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{CapabilityError, CapabilityResult, CompletionBackend};
use crate::config::AppConfig;
use crate::message::{CompletionRequest, CompletionResult, SourceInfo};

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("No response from Gemini")]
    Empty,
    #[error("Failed to serialize result: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl From<CompletionError> for CapabilityError {
    fn from(e: CompletionError) -> Self {
        CapabilityError::new(e.to_string())
    }
}

// request body

#[derive(Serialize, Debug)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn png(data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/png",
                data,
            }),
        }
    }
}

#[derive(Serialize, Debug)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize, Debug)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize, Debug)]
struct GoogleSearch {}

#[derive(Serialize, Debug)]
struct GenerationConfig {
    #[serde(rename = "thinkingConfig")]
    thinking_config: ThinkingConfig,
}

#[derive(Serialize, Debug)]
struct ThinkingConfig {
    /// -1 lets the model pick a budget, 0 turns thinking off.
    #[serde(rename = "thinkingBudget")]
    thinking_budget: i32,
}

#[derive(Serialize, Debug)]
struct SystemInstruction {
    parts: Vec<Part>,
}

// response body

#[derive(Deserialize, Debug, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Debug)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Deserialize, Debug)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

fn build_request(request: &CompletionRequest) -> GeminiRequest {
    let mut contents: Vec<Content> = request
        .chat_history
        .iter()
        .map(|msg| Content {
            role: if msg.role == "assistant" { "model" } else { "user" },
            parts: vec![Part::text(msg.content.as_str())],
        })
        .collect();

    let mut current = vec![Part::text(request.message.as_str())];
    if let Some(image) = &request.image_data {
        current.push(Part::png(image.clone()));
    }
    contents.push(Content {
        role: "user",
        parts: current,
    });

    let tools = request
        .grounding_enabled
        .unwrap_or(false)
        .then(|| vec![Tool {
            google_search: GoogleSearch {},
        }]);

    let generation_config = request.thinking_enabled.map(|enabled| GenerationConfig {
        thinking_config: ThinkingConfig {
            thinking_budget: if enabled { -1 } else { 0 },
        },
    });

    let system_instruction = request
        .system_instructions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| SystemInstruction {
            parts: vec![Part::text(s)],
        });

    GeminiRequest {
        contents,
        tools,
        generation_config,
        system_instruction,
    }
}

/// Host part of a URI, used when a grounding chunk carries no title.
fn uri_host(uri: &str) -> &str {
    uri.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .filter(|host| !host.is_empty())
        .unwrap_or(uri)
}

fn extract_result(response: GeminiResponse) -> Result<CompletionResult, CompletionError> {
    let first = response.candidates.into_iter().next();

    let text = first
        .as_ref()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.iter().find_map(|p| p.text.clone()))
        .ok_or(CompletionError::Empty)?;

    let metadata = first
        .and_then(|c| c.grounding_metadata)
        .or(response.grounding_metadata);

    let sources: Vec<SourceInfo> = metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| {
            let web = chunk.web?;
            let uri = web.uri?;
            let title = web
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| uri_host(&uri).to_string());
            Some(SourceInfo { title, uri })
        })
        .collect();

    Ok(CompletionResult {
        text,
        sources: (!sources.is_empty()).then_some(sources),
    })
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: config.gemini_endpoint.clone(),
            model: config.gemini_model.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, CompletionError> {
        let body = build_request(request);
        log::debug!(
            "[gemini] POST {} ({} contents, image: {})",
            self.url(),
            body.contents.len(),
            request.image_data.is_some()
        );

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(CompletionError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::warn!("[gemini] {status}: {error_text}");
            return Err(CompletionError::Api(if error_text.is_empty() {
                status.to_string()
            } else {
                error_text
            }));
        }

        let raw = response.text().await.map_err(CompletionError::Request)?;
        let parsed: GeminiResponse =
            serde_json::from_str(&raw).map_err(|e| CompletionError::Parse(e.to_string()))?;
        extract_result(parsed)
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    async fn send_to_gemini(&self, request: CompletionRequest) -> CapabilityResult<String> {
        let result = self.complete(&request).await?;
        let json = serde_json::to_string(&result).map_err(CompletionError::Serialize)?;
        Ok(json)
    }
}
