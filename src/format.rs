//! Shaping the responder's answer into deliverable chunks
//!
//! Long answers are split to fit the transport's message size limit,
//! preferring paragraph boundaries, then sentence boundaries, then hard
//! cutoffs, and never splitting inside a fenced code block. A voice reply
//! is appended as a final audio chunk synthesized from a condensed,
//! speech-friendly rendition of the answer; synthesis failure degrades to
//! text-only rather than failing the request.

use std::sync::LazyLock;

use regex::Regex;

use crate::assistant::AssistantResponse;
use crate::audio::AudioPipeline;
use crate::transport::{Chunk, Deliverable};

/// Shown when the responder produced no usable text; a Deliverable is
/// never empty.
const EMPTY_ANSWER_FALLBACK: &str =
    "I don't have a good answer for that one. Could you rephrase your \
     question, or share the code you're working on?";

/// Spoken replies are capped; listeners get pointed at the text
const SPEECH_CHAR_CAP: usize = 500;

static BOLD_OR_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]*)\*\*|\*([^*]*)\*").expect("valid regex"));

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

static INLINE_TICKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]*)`").expect("valid regex"));

/// Produces deliverables from responder answers
#[derive(Clone)]
pub struct ResponseFormatter {
    audio: AudioPipeline,
    max_message_len: usize,
}

impl ResponseFormatter {
    /// Create a formatter bound to the transport limit and the audio
    /// pipeline used for spoken replies
    #[must_use]
    pub const fn new(audio: AudioPipeline, max_message_len: usize) -> Self {
        Self {
            audio,
            max_message_len,
        }
    }

    /// Shape one answer into an ordered, non-empty deliverable.
    ///
    /// An answer that fits the transport limit goes out as one chunk,
    /// byte for byte. When `wants_audio` is set, a condensed spoken
    /// rendition is synthesized and appended as the final chunk; if
    /// synthesis fails the text chunks still go out.
    pub async fn format(&self, response: &AssistantResponse, wants_audio: bool) -> Deliverable {
        let body = if response.text.trim().is_empty() {
            EMPTY_ANSWER_FALLBACK
        } else {
            response.text.as_str()
        };

        let mut deliverable = Deliverable::new(
            chunk_text(body, self.max_message_len)
                .into_iter()
                .map(Chunk::Text)
                .collect(),
        );

        if wants_audio {
            let spoken = condense_for_speech(body);
            match self.audio.synthesize(&spoken).await {
                Ok(artifact) => deliverable.push(Chunk::Audio(artifact)),
                Err(e) => {
                    // Degrade to text-only; the request still succeeds
                    tracing::warn!(error = %e, kind = e.kind(), "spoken reply skipped");
                }
            }
        }

        deliverable
    }
}

/// Split `text` into segments of at most `limit` bytes.
///
/// Fenced code blocks are treated as atomic and only hard-split when a
/// single block alone exceeds the limit.
#[must_use]
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut atoms = Vec::new();
    for segment in fence_segments(text) {
        match segment {
            Segment::Code(code) => {
                if code.len() <= limit {
                    atoms.push(code.to_string());
                } else {
                    atoms.extend(hard_split(code, limit));
                }
            }
            Segment::Prose(prose) => atoms.extend(prose_atoms(prose, limit)),
        }
    }

    pack(atoms, limit)
}

/// A fence-delimited view of the answer text
enum Segment<'a> {
    Prose(&'a str),
    Code(&'a str),
}

/// Split on fenced code blocks, keeping each block as one piece.
///
/// A dangling opening fence is treated as prose.
fn fence_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find("```") {
        let open = pos + found;
        let Some(close_rel) = text[open + 3..].find("```") else {
            break;
        };
        let mut end = open + 3 + close_rel + 3;
        if text[end..].starts_with('\n') {
            end += 1;
        }

        if open > pos {
            segments.push(Segment::Prose(&text[pos..open]));
        }
        segments.push(Segment::Code(&text[open..end]));
        pos = end;
    }

    if pos < text.len() {
        segments.push(Segment::Prose(&text[pos..]));
    }
    segments
}

/// Break prose into atoms no larger than `limit`: paragraphs first, then
/// sentences, then hard cutoffs
fn prose_atoms(prose: &str, limit: usize) -> Vec<String> {
    let mut atoms = Vec::new();
    for paragraph in prose.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.len() <= limit {
            atoms.push(paragraph.to_string());
            continue;
        }
        for sentence in sentence_split(paragraph) {
            if sentence.len() <= limit {
                atoms.push(sentence.to_string());
            } else {
                atoms.extend(hard_split(sentence, limit));
            }
        }
    }
    atoms
}

/// Split on sentence-ending punctuation followed by a space; the
/// punctuation stays with its sentence
fn sentence_split(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|&(_, next)| next == ' ')
        {
            let end = i + 2;
            let piece = text[start..end].trim();
            if !piece.is_empty() {
                out.push(piece);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Last-resort split at `limit`-sized cutoffs, preferring the last
/// newline, then the last space, and always landing on a char boundary.
///
/// A piece is never smaller than one character, so a limit below the
/// width of the next character is exceeded rather than looping.
fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;

    while rest.len() > limit {
        let mut window = floor_char_boundary(rest, limit);
        if window == 0 {
            window = ceil_char_boundary(rest, 1);
        }
        let cut = rest[..window]
            .rfind('\n')
            .or_else(|| rest[..window].rfind(' '))
            .map_or(window, |i| i + 1);
        let cut = if cut == 0 { window } else { cut };

        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Largest byte index `<= at` that is a char boundary
fn floor_char_boundary(text: &str, at: usize) -> usize {
    let mut i = at.min(text.len());
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest byte index `>= at` that is a char boundary
fn ceil_char_boundary(text: &str, at: usize) -> usize {
    let mut i = at.min(text.len());
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Greedily pack atoms into chunks up to `limit`, separated by blank
/// lines
fn pack(atoms: Vec<String>, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for atom in atoms {
        let needed = if current.is_empty() {
            atom.len()
        } else {
            current.len() + 2 + atom.len()
        };

        if needed > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&atom);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Condense an answer into a speech-friendly rendition: markdown markers
/// dropped, code blocks summarized rather than read aloud, length capped
#[must_use]
pub fn condense_for_speech(text: &str) -> String {
    let text = FENCED_BLOCK.replace_all(text, "[code example]");
    let text = BOLD_OR_ITALIC.replace_all(&text, "$1$2");
    let text = INLINE_TICKS.replace_all(&text, "$1");

    let mut spoken = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if spoken.len() > SPEECH_CHAR_CAP {
        let cut = floor_char_boundary(&spoken, SPEECH_CHAR_CAP);
        spoken.truncate(cut);
        spoken.push_str("... The full explanation is in the text reply.");
    }
    spoken
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- chunk_text ----

    #[test]
    fn short_answer_is_one_chunk_verbatim() {
        let chunks = chunk_text("Recursion is a function calling itself.", 4000);
        assert_eq!(chunks, vec!["Recursion is a function calling itself."]);
    }

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
    }

    #[test]
    fn long_answer_splits_at_paragraphs() {
        let text = "First paragraph about loops.\n\nSecond paragraph about arrays.\n\nThird paragraph about maps.";
        let chunks = chunk_text(text, 40);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.len() <= 40));
        assert!(chunks[0].contains("First"));
    }

    #[test]
    fn oversized_paragraph_falls_back_to_sentences() {
        let text = "One sentence here. Another sentence there. A third one follows. And a fourth.";
        let chunks = chunk_text(text, 30);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.len() <= 30));
    }

    #[test]
    fn pathological_input_hard_splits() {
        let text = "x".repeat(100);
        let chunks = chunk_text(&text, 30);
        assert!(chunks.iter().all(|c| c.len() <= 30));
        assert_eq!(chunks.concat().len(), 100);
    }

    #[test]
    fn concatenation_preserves_content() {
        let text = "Intro paragraph.\n\nMiddle one with detail. More detail. Even more.\n\nClosing thought.";
        let chunks = chunk_text(text, 30);

        let stripped = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(stripped(&chunks.concat()), stripped(text));
    }

    #[test]
    fn code_block_never_split_when_it_fits() {
        let code = "```python\ndef f():\n    return 1\n```";
        let text = format!("Before paragraph of text.\n\n{code}\n\nAfter paragraph of text.");
        let chunks = chunk_text(&text, 60);

        assert!(chunks.iter().all(|c| c.len() <= 60));
        let with_code: Vec<_> = chunks.iter().filter(|c| c.contains("```")).collect();
        assert_eq!(with_code.len(), 1);
        assert!(with_code[0].contains("def f():"));
    }

    #[test]
    fn oversized_code_block_still_fits_limit() {
        let code = format!("```\n{}\n```", "line of code\n".repeat(20));
        let chunks = chunk_text(&code, 50);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.len() <= 50));
    }

    #[test]
    fn dangling_fence_is_prose() {
        let text = format!("Some text\n```python\n{}", "unclsed\n".repeat(10));
        let chunks = chunk_text(&text, 40);
        assert!(chunks.iter().all(|c| c.len() <= 40));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "\u{1F600}".repeat(40); // 160 bytes
        let chunks = chunk_text(&text, 30);
        assert!(chunks.iter().all(|c| c.len() <= 30));
        assert!(!chunks.is_empty());
    }

    #[test]
    fn zero_limit_terminates_and_loses_nothing() {
        let chunks = chunk_text("abcdef", 0);
        assert_eq!(chunks.concat(), "abcdef");
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn limit_below_one_char_width_emits_whole_chars() {
        // Each emoji is 4 bytes; a 3-byte limit cannot hold even one
        let chunks = chunk_text("\u{1F600}\u{1F600}", 3);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() == 1));
    }

    // ---- sentence_split ----

    #[test]
    fn sentences_keep_their_punctuation() {
        let parts = sentence_split("Hello there. How are you? Fine!");
        assert_eq!(parts, vec!["Hello there.", "How are you?", "Fine!"]);
    }

    // ---- condense_for_speech ----

    #[test]
    fn speech_rendition_summarizes_code() {
        let text = "Use a loop:\n```python\nfor i in range(3):\n    print(i)\n```\nThat's it.";
        let spoken = condense_for_speech(text);
        assert!(spoken.contains("[code example]"));
        assert!(!spoken.contains("print(i)"));
    }

    #[test]
    fn speech_rendition_strips_markdown() {
        let spoken = condense_for_speech("This is **important** and *useful*, see `x = 1`.");
        assert!(!spoken.contains('*'));
        assert!(!spoken.contains('`'));
        assert!(spoken.contains("important"));
        assert!(spoken.contains("x = 1"));
    }

    #[test]
    fn speech_rendition_is_capped() {
        let spoken = condense_for_speech(&"word ".repeat(500));
        assert!(spoken.len() <= SPEECH_CHAR_CAP + 50);
        assert!(spoken.ends_with("text reply."));
    }

    // ---- format ----

    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::audio::{AudioFormat, Synthesizer, Transcriber};
    use crate::config::AudioQuality;

    struct UnusedTranscriber;

    #[async_trait]
    impl Transcriber for UnusedTranscriber {
        async fn transcribe(&self, _path: &Path, _format: AudioFormat) -> crate::Result<String> {
            unreachable!("formatter never transcribes")
        }
    }

    struct EchoSynthesizer;

    #[async_trait]
    impl Synthesizer for EchoSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            _quality: AudioQuality,
        ) -> crate::Result<(Vec<u8>, AudioFormat)> {
            Ok((text.as_bytes().to_vec(), AudioFormat::Mp3))
        }
    }

    fn formatter(dir: &Path, limit: usize) -> ResponseFormatter {
        let audio = AudioPipeline::new(
            Arc::new(UnusedTranscriber),
            Arc::new(EchoSynthesizer),
            AudioQuality::Medium,
            dir.to_path_buf(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        ResponseFormatter::new(audio, limit)
    }

    #[tokio::test]
    async fn sub_limit_answer_goes_out_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let f = formatter(dir.path(), 4000);

        let answer = "  keep my spacing \n";
        let d = f
            .format(&AssistantResponse::new(answer.to_string()), false)
            .await;

        assert_eq!(d.len(), 1);
        assert_eq!(d.chunks()[0].as_text(), Some(answer));
    }

    #[tokio::test]
    async fn blank_answer_becomes_fallback_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let f = formatter(dir.path(), 4000);

        let d = f
            .format(&AssistantResponse::new("  \n ".to_string()), false)
            .await;

        assert_eq!(d.len(), 1);
        assert!(d.chunks()[0].as_text().unwrap().contains("rephrase"));
    }
}
