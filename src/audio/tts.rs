//! Text-to-speech boundary client (OpenAI speech API)

use async_trait::async_trait;

use super::{AudioFormat, Synthesizer};
use crate::config::AudioQuality;
use crate::{Error, Result};

/// Synthesizes spoken replies via the hosted speech API
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
}

impl OpenAiSynthesizer {
    /// Create a new synthesizer.
    ///
    /// # Errors
    ///
    /// Returns a config error if the API key is missing.
    pub fn new(api_key: String, voice: String, speed: f32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
        })
    }

    /// Model tier for a requested quality
    const fn model_for(quality: AudioQuality) -> &'static str {
        match quality {
            AudioQuality::Low | AudioQuality::Medium => "tts-1",
            AudioQuality::High => "tts-1-hd",
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        quality: AudioQuality,
    ) -> Result<(Vec<u8>, AudioFormat)> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = SpeechRequest {
            model: Self::model_for(quality),
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "speech API error");
            return Err(Error::SynthesisUnavailable(format!(
                "speech API error {status}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;
        Ok((audio.to_vec(), AudioFormat::Mp3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        let result = OpenAiSynthesizer::new(String::new(), "alloy".to_string(), 1.0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn quality_maps_to_model_tier() {
        assert_eq!(OpenAiSynthesizer::model_for(AudioQuality::Low), "tts-1");
        assert_eq!(OpenAiSynthesizer::model_for(AudioQuality::Medium), "tts-1");
        assert_eq!(OpenAiSynthesizer::model_for(AudioQuality::High), "tts-1-hd");
    }
}
