//! Transport boundary types
//!
//! The messaging channel itself (receive loop, file download, upload
//! mechanics) lives outside this crate. What crosses the boundary is an
//! [`InboundEvent`] coming in and a [`Deliverable`] going out, plus the
//! narrow [`Transport`] trait the daemon drives delivery through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;
use crate::audio::AudioArtifact;

/// Kind of channel payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    /// Plain text message
    Text,
    /// Voice note (audio bytes)
    Voice,
    /// File upload (bytes plus declared filename)
    File,
}

/// Raw payload of an inbound event
#[derive(Debug, Clone)]
pub enum Payload {
    /// Message text
    Text(String),
    /// Voice note audio bytes
    Voice(Vec<u8>),
    /// Uploaded file bytes and the sender-declared filename
    File {
        /// File content
        data: Vec<u8>,
        /// Declared filename, used for language hints
        filename: String,
    },
}

/// One message as delivered by the transport. Immutable once received.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Unique id of this event, used for log correlation and as the key
    /// for explicit cancellation
    pub id: Uuid,

    /// Sender identity (platform-specific)
    pub sender_id: String,

    /// When the transport handed us the event
    pub timestamp: DateTime<Utc>,

    /// The raw payload
    pub payload: Payload,
}

impl InboundEvent {
    /// A text message event
    #[must_use]
    pub fn text(sender_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            timestamp: Utc::now(),
            payload: Payload::Text(body.into()),
        }
    }

    /// A voice note event
    #[must_use]
    pub fn voice(sender_id: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            timestamp: Utc::now(),
            payload: Payload::Voice(audio),
        }
    }

    /// A file upload event
    #[must_use]
    pub fn file(
        sender_id: impl Into<String>,
        data: Vec<u8>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            timestamp: Utc::now(),
            payload: Payload::File {
                data,
                filename: filename.into(),
            },
        }
    }

    /// Modality of this event's payload
    #[must_use]
    pub const fn modality(&self) -> Modality {
        match self.payload {
            Payload::Text(_) => Modality::Text,
            Payload::Voice(_) => Modality::Voice,
            Payload::File { .. } => Modality::File,
        }
    }
}

/// One outbound unit: a transport-sized text segment or an audio artifact
#[derive(Debug)]
pub enum Chunk {
    /// Text segment within the transport's message size limit
    Text(String),
    /// Synthesized spoken reply; released after upload
    Audio(AudioArtifact),
}

impl Chunk {
    /// Text content, if this is a text chunk
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Audio(_) => None,
        }
    }
}

/// Ordered outbound chunks answering exactly one inbound event
#[derive(Debug, Default)]
pub struct Deliverable {
    chunks: Vec<Chunk>,
}

impl Deliverable {
    /// Build from chunks, in delivery order
    #[must_use]
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// A single-text-chunk deliverable
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            chunks: vec![Chunk::Text(body.into())],
        }
    }

    /// Append a chunk
    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Chunks in delivery order
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Consume into chunks
    #[must_use]
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// Whether there is nothing to deliver
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Trait for outbound delivery over a messaging channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    /// Maximum single-message text size this channel accepts
    fn max_message_len(&self) -> usize;

    /// Send one text segment to a recipient
    async fn send_text(&self, recipient: &str, text: &str) -> Result<()>;

    /// Upload one audio artifact to a recipient.
    ///
    /// Default is a no-op for text-only channels.
    async fn send_audio(&self, _recipient: &str, _artifact: &AudioArtifact) -> Result<()> {
        Ok(())
    }
}
