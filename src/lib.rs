//! Tutor Gateway - multi-modal message gateway for an educational coding
//! assistant
//!
//! This library provides the core functionality for the tutor gateway:
//! - Normalizing text, voice and file events into one request shape
//! - Code extraction and language detection
//! - Voice processing (STT in, optional TTS out) with scoped temp files
//! - Educational LLM responder (Gemini)
//! - Transport-sized response chunking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Transport                         │
//! │        text  │  voice note  │  file upload          │
//! └────────────────────┬────────────────────────────────┘
//!                      │ InboundEvent
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Tutor Gateway                        │
//! │  Router │ STT/TTS │ Extract/Detect │ Formatter      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ AssistantRequest
//! ┌────────────────────▼────────────────────────────────┐
//! │              Gemini (educational responder)          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod audio;
pub mod config;
pub mod daemon;
pub mod detect;
pub mod error;
pub mod extract;
pub mod format;
pub mod request;
pub mod router;
pub mod transport;

pub use assistant::{AssistantResponse, GeminiResponder, Responder};
pub use audio::{
    AudioArtifact, AudioFormat, AudioPipeline, OpenAiSynthesizer, Synthesizer, Transcriber,
    WhisperTranscriber,
};
pub use config::{AudioQuality, Config};
pub use daemon::Daemon;
pub use error::{Error, Result, TranscriptionError};
pub use format::ResponseFormatter;
pub use request::{AssistantRequest, Intent, RequestBuilder};
pub use router::{MessageRouter, RequestState, Routed};
pub use transport::{Chunk, Deliverable, InboundEvent, Modality, Payload, Transport};
