//! Speech-to-text boundary client (OpenAI Whisper API)

use std::path::Path;

use async_trait::async_trait;

use super::{AudioFormat, Transcriber};
use crate::error::TranscriptionError;
use crate::{Error, Result};

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes voice notes via the hosted Whisper API
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl WhisperTranscriber {
    /// Create a new transcriber.
    ///
    /// # Errors
    ///
    /// Returns a config error if the API key is missing.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, path: &Path, format: AudioFormat) -> Result<String> {
        let audio = tokio::fs::read(path).await?;
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(format!("voice.{}", format.extension()))
                    .mime_str(format.mime())
                    .map_err(|e| {
                        Error::TranscriptionFailed(TranscriptionError::Engine(e.to_string()))
                    })?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::TranscriptionFailed(TranscriptionError::Engine(e.to_string()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");

            // The API reports unreadable containers as a client error
            let reason = if status.as_u16() == 400 && body.to_lowercase().contains("format") {
                TranscriptionError::UnsupportedFormat(format.extension().to_string())
            } else {
                TranscriptionError::Engine(format!("Whisper API error {status}"))
            };
            return Err(Error::TranscriptionFailed(reason));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Whisper response");
            Error::TranscriptionFailed(TranscriptionError::Engine(e.to_string()))
        })?;

        Ok(result.text)
    }
}
