//! AI responder boundary
//!
//! The large-language-model call is an external collaborator: an
//! [`AssistantRequest`] goes in, opaque answer text comes out. The
//! [`Responder`] trait keeps the router testable with fakes; the concrete
//! [`GeminiResponder`] talks to the Gemini `generateContent` API.

mod gemini;
pub mod prompt;

use async_trait::async_trait;

pub use gemini::GeminiResponder;

use crate::Result;
use crate::request::AssistantRequest;

/// Raw answer from the educational responder; opaque beyond being text
#[derive(Debug, Clone, Default)]
pub struct AssistantResponse {
    /// The answer text
    pub text: String,
}

impl AssistantResponse {
    /// Wrap answer text
    #[must_use]
    pub const fn new(text: String) -> Self {
        Self { text }
    }
}

/// Capability trait for the educational responder
#[async_trait]
pub trait Responder: Send + Sync {
    /// Answer one normalized request.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ResponderUnavailable`] when the engine
    /// cannot take the request. Deadlines are enforced by the caller.
    async fn respond(&self, request: &AssistantRequest) -> Result<AssistantResponse>;
}
