//! Normalizing any input modality into a single assistant request

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::{self, CodeFragment};
use crate::transport::{InboundEvent, Modality, Payload};
use crate::{Error, Result, detect};

/// What the sender wants from the tutor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Explain a concept or a piece of code
    Explain,
    /// Review code and suggest improvements
    Review,
    /// Find and fix a problem
    Debug,
    /// Anything else
    General,
}

impl Intent {
    /// Stable label for logs and prompts
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Review => "review",
            Self::Debug => "debug",
            Self::General => "general",
        }
    }
}

/// The normalized request handed to the AI responder. Built once per
/// inbound event; owns its fragments.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    /// Classified intent
    pub intent: Intent,

    /// Prose portion (for voice events, the transcript with code removed)
    pub prose: String,

    /// Code fragments in document order
    pub fragments: Vec<CodeFragment>,

    /// Modality of the originating event
    pub modality: Modality,
}

static DEBUG_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fix|error|bug|debug|broken|crash|exception|fails?|doesn'?t work|not working)\b")
        .expect("valid regex")
});

static REVIEW_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(review|improve|refactor|optimi[sz]e|feedback|clean(?:er)? code|best practice)\b")
        .expect("valid regex")
});

static EXPLAIN_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(explain|how|why|what (?:is|are|does)|understand|difference between|teach)\b")
        .expect("valid regex")
});

/// Classify the sender's intent from the prose portion of a message.
///
/// Simple keyword counting per category; the best-matching category wins
/// and exact ties fall back to [`Intent::General`].
#[must_use]
pub fn classify_intent(prose: &str) -> Intent {
    let debug = DEBUG_WORDS.find_iter(prose).count();
    let review = REVIEW_WORDS.find_iter(prose).count();
    let explain = EXPLAIN_WORDS.find_iter(prose).count();

    let top = debug.max(review).max(explain);
    if top == 0 {
        return Intent::General;
    }

    // A tie between categories is ambiguous
    let winners = usize::from(debug == top) + usize::from(review == top) + usize::from(explain == top);
    if winners > 1 {
        return Intent::General;
    }

    if debug == top {
        Intent::Debug
    } else if review == top {
        Intent::Review
    } else {
        Intent::Explain
    }
}

/// Builds [`AssistantRequest`]s from inbound events
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    max_file_bytes: usize,
}

impl RequestBuilder {
    /// Create a builder with the configured file-size cap
    #[must_use]
    pub const fn new(max_file_bytes: usize) -> Self {
        Self { max_file_bytes }
    }

    /// Normalize one event into an assistant request.
    ///
    /// `transcript` must be supplied for voice events (the audio bytes
    /// never reach the responder) and must be absent otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFileType`] for file uploads that are
    /// not decodable code files, and [`Error::MalformedInput`] when a
    /// voice event arrives without its transcript.
    pub fn build(
        &self,
        event: &InboundEvent,
        transcript: Option<&str>,
    ) -> Result<AssistantRequest> {
        match &event.payload {
            Payload::Text(body) => Ok(Self::from_text(body, Modality::Text)),
            Payload::Voice(_) => {
                let transcript = transcript.ok_or_else(|| {
                    Error::MalformedInput("voice event without transcript".to_string())
                })?;
                Ok(Self::from_text(transcript, Modality::Voice))
            }
            Payload::File { data, filename } => self.from_file(data, filename),
        }
    }

    /// Text and transcripts go through the extractor, then untagged
    /// fragments through the detector.
    fn from_text(body: &str, modality: Modality) -> AssistantRequest {
        let extraction = extract::extract(body);
        let mut fragments = extraction.fragments;

        for fragment in &mut fragments {
            // An explicit fence tag short-circuits detection
            if fragment.language.is_none() {
                fragment.language = detect::detect(&fragment.source)
                    .language
                    .map(ToString::to_string);
            }
        }

        AssistantRequest {
            intent: classify_intent(&extraction.prose),
            prose: extraction.prose,
            fragments,
            modality,
        }
    }

    /// Whole-file uploads become one atomic fragment with the language
    /// taken from the extension; the heuristic pass never runs.
    fn from_file(&self, data: &[u8], filename: &str) -> Result<AssistantRequest> {
        if data.len() > self.max_file_bytes {
            return Err(Error::UnsupportedFileType(format!(
                "file exceeds {} bytes",
                self.max_file_bytes
            )));
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default();
        let Some(language) = detect::from_extension(extension) else {
            return Err(Error::UnsupportedFileType(format!(
                "'.{extension}' is not a recognized code file extension"
            )));
        };

        let source = std::str::from_utf8(data)
            .map_err(|_| {
                Error::UnsupportedFileType("file content is not readable text".to_string())
            })?
            .to_string();
        let span = 0..source.len();

        Ok(AssistantRequest {
            intent: classify_intent(""),
            prose: String::new(),
            fragments: vec![CodeFragment {
                source,
                language: Some(language.to_string()),
                span,
            }],
            modality: Modality::File,
        })
    }
}
