//! Gemini `generateContent` responder client

use async_trait::async_trait;

use super::{AssistantResponse, Responder, prompt};
use crate::request::AssistantRequest;
use crate::{Error, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(serde::Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(serde::Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Educational responder backed by the Gemini API
pub struct GeminiResponder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiResponder {
    /// Create a new responder.
    ///
    /// # Errors
    ///
    /// Returns a config error if the API key is missing.
    pub fn new(
        api_key: String,
        model: String,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            temperature,
            max_output_tokens,
        })
    }
}

#[async_trait]
impl Responder for GeminiResponder {
    async fn respond(&self, request: &AssistantRequest) -> Result<AssistantResponse> {
        let user_prompt = prompt::render(request);
        tracing::debug!(
            intent = request.intent.as_str(),
            fragments = request.fragments.len(),
            prompt_len = user_prompt.len(),
            "dispatching to responder"
        );

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: prompt::SYSTEM_INSTRUCTION,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &user_prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ResponderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "responder API error");
            return Err(Error::ResponderUnavailable(format!(
                "responder API error {status}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ResponderUnavailable(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(AssistantResponse::new(text))
    }
}
