//! Voice round-trip without leaking storage
//!
//! The [`AudioPipeline`] owns every temporary audio file the gateway
//! creates. Transcription artifacts are released before the call returns,
//! success or failure; synthesis artifacts are handed to the caller, who
//! releases them after upload. The speech engines themselves sit behind
//! the narrow [`Transcriber`] and [`Synthesizer`] capability traits so
//! tests can substitute deterministic fakes.

pub mod artifact;
mod stt;
mod tts;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use artifact::{AudioArtifact, AudioFormat};
pub use stt::WhisperTranscriber;
pub use tts::OpenAiSynthesizer;

use crate::config::AudioQuality;
use crate::error::TranscriptionError;
use crate::{Error, Result};

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Recognize speech in the audio file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TranscriptionFailed`] with a typed reason.
    async fn transcribe(&self, path: &Path, format: AudioFormat) -> Result<String>;
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce an audio rendition of `text` at the requested quality.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SynthesisUnavailable`] when the engine cannot
    /// deliver audio.
    async fn synthesize(&self, text: &str, quality: AudioQuality)
        -> Result<(Vec<u8>, AudioFormat)>;
}

/// Owns the voice-note and spoken-reply lifecycle for one gateway
#[derive(Clone)]
pub struct AudioPipeline {
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    quality: AudioQuality,
    temp_dir: PathBuf,
    stt_timeout: Duration,
    tts_timeout: Duration,
}

impl AudioPipeline {
    /// Create a pipeline over the given engine boundaries
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        quality: AudioQuality,
        temp_dir: PathBuf,
        stt_timeout: Duration,
        tts_timeout: Duration,
    ) -> Self {
        Self {
            transcriber,
            synthesizer,
            quality,
            temp_dir,
            stt_timeout,
            tts_timeout,
        }
    }

    /// Turn a voice note into text.
    ///
    /// The audio is staged into a scoped artifact for the engine and the
    /// artifact is released before this returns, on success and on
    /// failure. An empty recognition result counts as unintelligible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TranscriptionFailed`] with the engine's reason,
    /// or with [`TranscriptionError::TimedOut`] when the bounded call
    /// expires.
    pub async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<String> {
        let artifact = AudioArtifact::create(&self.temp_dir, format, audio)?;
        tracing::debug!(path = %artifact.path().display(), bytes = audio.len(), "staged voice note");

        let outcome = tokio::time::timeout(
            self.stt_timeout,
            self.transcriber.transcribe(artifact.path(), format),
        )
        .await;

        // Release the staging artifact before inspecting the outcome
        drop(artifact);

        let transcript = match outcome {
            Err(_elapsed) => {
                return Err(Error::TranscriptionFailed(TranscriptionError::TimedOut));
            }
            Ok(result) => result?,
        };

        if transcript.trim().is_empty() {
            return Err(Error::TranscriptionFailed(TranscriptionError::Unintelligible));
        }

        tracing::info!(transcript = %transcript, "voice note transcribed");
        Ok(transcript)
    }

    /// Synthesize speech for `text`, returning a scoped artifact the
    /// caller now owns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SynthesisUnavailable`] when the engine fails or
    /// the bounded call expires.
    pub async fn synthesize(&self, text: &str) -> Result<AudioArtifact> {
        let (bytes, format) = tokio::time::timeout(
            self.tts_timeout,
            self.synthesizer.synthesize(text, self.quality),
        )
        .await
        .map_err(|_| Error::SynthesisUnavailable("synthesis timed out".to_string()))??;

        let artifact = AudioArtifact::create(&self.temp_dir, format, &bytes)?
            .with_duration_hint(estimate_duration(text));

        tracing::debug!(
            path = %artifact.path().display(),
            bytes = bytes.len(),
            "synthesized spoken reply"
        );
        Ok(artifact)
    }
}

/// Rough playback length from word count (~150 words per minute)
fn estimate_duration(text: &str) -> Duration {
    let words = u64::try_from(text.split_whitespace().count()).unwrap_or(u64::MAX);
    Duration::from_millis(words.saturating_mul(400))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeTranscriber {
        reply: Result<String>,
        seen_path: Mutex<Option<PathBuf>>,
    }

    impl FakeTranscriber {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen_path: Mutex::new(None),
            }
        }

        fn failing(reason: TranscriptionError) -> Self {
            Self {
                reply: Err(Error::TranscriptionFailed(reason)),
                seen_path: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, path: &Path, _format: AudioFormat) -> Result<String> {
            assert!(path.exists(), "artifact must exist while the engine runs");
            *self.seen_path.lock().unwrap() = Some(path.to_path_buf());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(Error::TranscriptionFailed(reason)) => {
                    Err(Error::TranscriptionFailed(reason.clone()))
                }
                Err(_) => unreachable!(),
            }
        }
    }

    struct FakeSynthesizer {
        fail: bool,
    }

    #[async_trait]
    impl Synthesizer for FakeSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            _quality: AudioQuality,
        ) -> Result<(Vec<u8>, AudioFormat)> {
            if self.fail {
                return Err(Error::SynthesisUnavailable("engine offline".to_string()));
            }
            Ok((text.as_bytes().to_vec(), AudioFormat::Mp3))
        }
    }

    fn pipeline(
        transcriber: Arc<FakeTranscriber>,
        synthesizer: Arc<FakeSynthesizer>,
        dir: &Path,
    ) -> AudioPipeline {
        AudioPipeline::new(
            transcriber,
            synthesizer,
            AudioQuality::Medium,
            dir.to_path_buf(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn transcribe_releases_artifact_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(FakeTranscriber::ok("explain recursion"));
        let p = pipeline(
            Arc::clone(&transcriber),
            Arc::new(FakeSynthesizer { fail: false }),
            dir.path(),
        );

        let text = p.transcribe(b"oggdata", AudioFormat::Ogg).await.unwrap();
        assert_eq!(text, "explain recursion");

        let staged = transcriber.seen_path.lock().unwrap().clone().unwrap();
        assert!(!staged.exists(), "staging artifact must be released");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn transcribe_releases_artifact_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Arc::new(FakeTranscriber::failing(
            TranscriptionError::Unintelligible,
        ));
        let p = pipeline(
            Arc::clone(&transcriber),
            Arc::new(FakeSynthesizer { fail: false }),
            dir.path(),
        );

        let err = p.transcribe(b"static", AudioFormat::Ogg).await.unwrap_err();
        assert!(matches!(
            err,
            Error::TranscriptionFailed(TranscriptionError::Unintelligible)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_transcript_is_unintelligible() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            Arc::new(FakeTranscriber::ok("   ")),
            Arc::new(FakeSynthesizer { fail: false }),
            dir.path(),
        );

        let err = p.transcribe(b"silence", AudioFormat::Ogg).await.unwrap_err();
        assert!(matches!(
            err,
            Error::TranscriptionFailed(TranscriptionError::Unintelligible)
        ));
    }

    #[tokio::test]
    async fn synthesize_hands_ownership_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            Arc::new(FakeTranscriber::ok("unused")),
            Arc::new(FakeSynthesizer { fail: false }),
            dir.path(),
        );

        let artifact = p.synthesize("short spoken summary").await.unwrap();
        assert!(artifact.path().exists());
        assert_eq!(artifact.format(), AudioFormat::Mp3);
        assert!(artifact.duration_hint().is_some());

        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn synthesis_failure_surfaces_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            Arc::new(FakeTranscriber::ok("unused")),
            Arc::new(FakeSynthesizer { fail: true }),
            dir.path(),
        );

        let err = p.synthesize("anything").await.unwrap_err();
        assert!(matches!(err, Error::SynthesisUnavailable(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
