//! Error types for the tutor gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a transcription attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    /// The engine could not make out any speech
    #[error("audio was unintelligible")]
    Unintelligible,

    /// The audio container format is not accepted by the engine
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The engine did not answer within the configured deadline
    #[error("transcription timed out")]
    TimedOut,

    /// Any other engine-side failure
    #[error("speech engine error: {0}")]
    Engine(String),
}

/// Errors that can occur in the tutor gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Voice note could not be turned into text
    #[error("transcription failed: {0}")]
    TranscriptionFailed(TranscriptionError),

    /// Uploaded file could not be decoded as a code file
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The AI responder rejected or could not take the request
    #[error("responder unavailable: {0}")]
    ResponderUnavailable(String),

    /// The AI responder did not answer within the configured deadline
    #[error("responder timed out after {0} s")]
    ResponderTimeout(u64),

    /// Speech synthesis was not possible
    #[error("synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// Inbound payload was malformed beyond recovery
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Transport error
    #[error("transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Stable kind label for logs and counters
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::TranscriptionFailed(_) => "transcription_failed",
            Self::UnsupportedFileType(_) => "unsupported_file_type",
            Self::ResponderUnavailable(_) => "responder_unavailable",
            Self::ResponderTimeout(_) => "responder_timeout",
            Self::SynthesisUnavailable(_) => "synthesis_unavailable",
            Self::MalformedInput(_) => "malformed_input",
            Self::Transport(_) => "transport",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::Toml(_) => "toml",
        }
    }

    /// Friendly apology shown to the sender when a request fails.
    ///
    /// Transcription failures carry a retry hint; everything else gets a
    /// short explanation of the failure class.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::TranscriptionFailed(reason) => {
                let detail = match reason {
                    TranscriptionError::Unintelligible => {
                        "I couldn't make out what was said in your voice note."
                    }
                    TranscriptionError::UnsupportedFormat(_) => {
                        "your voice note is in an audio format I can't process."
                    }
                    TranscriptionError::TimedOut | TranscriptionError::Engine(_) => {
                        "something went wrong while listening to your voice note."
                    }
                };
                format!(
                    "Sorry - {detail} Try recording again in a quiet place, \
                     speaking clearly, or just type your question instead."
                )
            }
            Self::UnsupportedFileType(detail) => format!(
                "Sorry - I couldn't read that file ({detail}). Please upload a \
                 plain-text code file such as .py, .js or .java."
            ),
            Self::ResponderTimeout(_) => {
                "Sorry - my tutoring brain took too long to answer. Please try \
                 again in a moment."
                    .to_string()
            }
            Self::ResponderUnavailable(_) => {
                "Sorry - I can't reach my tutoring brain right now. Please try \
                 again in a moment."
                    .to_string()
            }
            Self::MalformedInput(_) => {
                "Sorry - I couldn't understand that message. Could you rephrase \
                 or resend it?"
                    .to_string()
            }
            _ => "Sorry - something went wrong processing your request. Please \
                  try again."
                .to_string(),
        }
    }
}
