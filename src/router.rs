//! Per-request orchestration
//!
//! One inbound event flows through normalization, a bounded responder
//! call, and formatting, and comes out the other end as a deliverable.
//! Routing never errors: any failure collapses into a single apology
//! chunk, partial work is discarded, and no audio artifact survives a
//! failed request. Every state transition is logged under a per-request
//! id.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::assistant::Responder;
use crate::audio::{AudioFormat, AudioPipeline};
use crate::config::Config;
use crate::format::ResponseFormatter;
use crate::request::RequestBuilder;
use crate::transport::{Deliverable, InboundEvent, Modality, Payload};
use crate::{Error, Result};

/// Lifecycle of one request through the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Event accepted from the transport
    Received,
    /// Transcription and request building in progress
    Normalizing,
    /// Handed to the AI responder
    Dispatched,
    /// Responder answered; deliverable being assembled
    Formatting,
    /// Deliverable ready for the transport
    Delivered,
    /// Terminal failure; deliverable is a single apology chunk
    Failed,
}

impl RequestState {
    /// Stable label for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Normalizing => "normalizing",
            Self::Dispatched => "dispatched",
            Self::Formatting => "formatting",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of routing one event
#[derive(Debug)]
pub struct Routed {
    /// Ordered chunks to hand to the transport; never empty
    pub deliverable: Deliverable,

    /// Terminal state, [`RequestState::Delivered`] or
    /// [`RequestState::Failed`]
    pub state: RequestState,
}

/// Drives one inbound event end to end
#[derive(Clone)]
pub struct MessageRouter {
    builder: RequestBuilder,
    audio: AudioPipeline,
    responder: Arc<dyn Responder>,
    formatter: ResponseFormatter,
    enable_voice_responses: bool,
    responder_timeout: Duration,
}

impl MessageRouter {
    /// Assemble a router from configuration and its engine boundaries
    #[must_use]
    pub fn new(config: &Config, audio: AudioPipeline, responder: Arc<dyn Responder>) -> Self {
        Self {
            builder: RequestBuilder::new(config.max_file_bytes),
            formatter: ResponseFormatter::new(audio.clone(), config.max_message_len),
            audio,
            responder,
            enable_voice_responses: config.enable_voice_responses,
            responder_timeout: config.responder_timeout,
        }
    }

    /// Route one event to a deliverable.
    ///
    /// Never returns an error: failures become a single apology chunk
    /// with terminal state [`RequestState::Failed`].
    pub async fn route(&self, event: &InboundEvent) -> Routed {
        let request_id = event.id;
        tracing::info!(
            request_id = %request_id,
            sender = %event.sender_id,
            modality = ?event.modality(),
            state = RequestState::Received.as_str(),
            "request accepted"
        );

        match self.run(event, request_id).await {
            Ok(deliverable) => {
                tracing::info!(
                    request_id = %request_id,
                    chunks = deliverable.len(),
                    state = RequestState::Delivered.as_str(),
                    "request complete"
                );
                Routed {
                    deliverable,
                    state: RequestState::Delivered,
                }
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    kind = e.kind(),
                    state = RequestState::Failed.as_str(),
                    "request failed"
                );
                Routed {
                    deliverable: Deliverable::text(e.user_message()),
                    state: RequestState::Failed,
                }
            }
        }
    }

    /// Route one event under a cancellation handle.
    ///
    /// Cancellation does not interrupt in-flight external calls; it
    /// suppresses delivery. Returns `None` when the request was
    /// cancelled, with any synthesized artifacts already released.
    pub async fn route_cancellable(
        &self,
        event: &InboundEvent,
        cancel: &watch::Receiver<bool>,
    ) -> Option<Routed> {
        let routed = self.route(event).await;
        if *cancel.borrow() {
            tracing::info!(request_id = %event.id, "delivery suppressed by cancellation");
            drop(routed);
            return None;
        }
        Some(routed)
    }

    async fn run(&self, event: &InboundEvent, request_id: Uuid) -> Result<Deliverable> {
        // Voice settings are snapshotted here; a config reload mid-flight
        // does not change this request's behavior
        let wants_audio =
            event.modality() == Modality::Voice && self.enable_voice_responses;

        tracing::debug!(
            request_id = %request_id,
            state = RequestState::Normalizing.as_str(),
            "normalizing"
        );
        let transcript = match &event.payload {
            Payload::Voice(audio) => {
                Some(self.audio.transcribe(audio, AudioFormat::Ogg).await?)
            }
            Payload::Text(_) | Payload::File { .. } => None,
        };
        let request = self.builder.build(event, transcript.as_deref())?;

        tracing::debug!(
            request_id = %request_id,
            intent = request.intent.as_str(),
            fragments = request.fragments.len(),
            state = RequestState::Dispatched.as_str(),
            "dispatching to responder"
        );
        let response = tokio::time::timeout(
            self.responder_timeout,
            self.responder.respond(&request),
        )
        .await
        .map_err(|_| Error::ResponderTimeout(self.responder_timeout.as_secs()))??;

        tracing::debug!(
            request_id = %request_id,
            answer_len = response.text.len(),
            state = RequestState::Formatting.as_str(),
            "formatting answer"
        );
        Ok(self.formatter.format(&response, wants_audio).await)
    }
}
