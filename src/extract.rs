//! Separating prose from embedded source code
//!
//! Fenced blocks are authoritative and extracted first, in document order.
//! Messages without any fence go through a heuristic pass: inline
//! backtick spans that look like code, then contiguous runs of code-shaped
//! lines. Malformed input never errors; an unterminated fence simply
//! degrades to prose.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// A contiguous span of source code lifted out of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    /// The code itself
    pub source: String,

    /// Language from an explicit fence tag, if any. `None` until the
    /// detector has run (or could not decide).
    pub language: Option<String>,

    /// Byte offsets of `source` within the originating message
    pub span: Range<usize>,
}

/// Result of an extraction pass
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// The message with extracted code removed
    pub prose: String,

    /// Extracted fragments, in document order
    pub fragments: Vec<CodeFragment>,
}

/// Inline backtick span (single backticks, one line)
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

/// Line-level indicators that prose has drifted into code
static CODE_LINE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(def\s+\w+|function\s+\w+|class\s+\w+|import\s+\w+|#include|public\s+class|console\.log|print\s*\(|fn\s+\w+|SELECT\s+.+\s+FROM)",
    )
    .expect("valid regex")
});

/// Split a message into prose and code fragments.
///
/// Never fails: text that cannot be parsed as containing code comes back
/// as pure prose with zero fragments.
#[must_use]
pub fn extract(text: &str) -> Extraction {
    let fenced = extract_fenced(text);
    if !fenced.fragments.is_empty() || text.contains("```") {
        return fenced;
    }

    let inline = extract_inline(text);
    if !inline.fragments.is_empty() {
        return inline;
    }

    extract_indented(text)
}

/// Pass 1: triple-backtick fences with optional language tag.
///
/// An opening fence without a closing fence is not a block; it and
/// everything after it stay in the prose.
fn extract_fenced(text: &str) -> Extraction {
    let mut prose = String::new();
    let mut fragments = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find("```") {
        let fence_start = pos + found;

        // Language tag is the rest of the fence line
        let tag_start = fence_start + 3;
        let Some(tag_end_rel) = text[tag_start..].find('\n') else {
            // Fence opened on the last line; nothing can close it
            break;
        };
        let body_start = tag_start + tag_end_rel + 1;
        let tag = text[tag_start..tag_start + tag_end_rel].trim();

        // Closing fence must start a line
        let Some(close_rel) = find_closing_fence(&text[body_start..]) else {
            break;
        };
        let body_end = body_start + close_rel;

        // End of the block is the end of the closing fence line
        let mut block_end = body_end + 3;
        if text[block_end..].starts_with('\n') {
            block_end += 1;
        }

        prose.push_str(&text[pos..fence_start]);
        fragments.push(CodeFragment {
            source: text[body_start..body_end].to_string(),
            language: if tag.is_empty() {
                None
            } else {
                Some(tag.to_ascii_lowercase())
            },
            span: body_start..body_end,
        });
        pos = block_end;
    }

    prose.push_str(&text[pos..]);
    Extraction { prose, fragments }
}

/// Find the offset of a closing ``` that begins a line
fn find_closing_fence(body: &str) -> Option<usize> {
    if body.starts_with("```") {
        return Some(0);
    }
    body.find("\n```").map(|i| i + 1)
}

/// Pass 2: inline single-backtick spans that look like code
fn extract_inline(text: &str) -> Extraction {
    let mut prose = String::new();
    let mut fragments = Vec::new();
    let mut pos = 0;

    for caps in INLINE_CODE.captures_iter(text) {
        let whole = caps.get(0).expect("match exists");
        let inner = caps.get(1).expect("group exists");
        if !looks_like_code(inner.as_str()) {
            continue;
        }

        prose.push_str(&text[pos..whole.start()]);
        fragments.push(CodeFragment {
            source: inner.as_str().to_string(),
            language: None,
            span: inner.range(),
        });
        pos = whole.end();
    }

    prose.push_str(&text[pos..]);
    Extraction { prose, fragments }
}

/// Pass 3: contiguous runs of code-shaped lines in unfenced text.
///
/// A run of at least two consecutive code-shaped lines becomes a single
/// fragment; everything else is prose.
fn extract_indented(text: &str) -> Extraction {
    let mut fragments = Vec::new();
    let mut prose = String::new();

    let mut run_start: Option<usize> = None;
    let mut run_lines = 0_usize;
    let mut run_end = 0_usize;
    let mut offset = 0;

    let mut flush = |start: Option<usize>, end: usize, lines: usize,
                     fragments: &mut Vec<CodeFragment>,
                     prose: &mut String| {
        if let Some(s) = start {
            if lines >= 2 {
                fragments.push(CodeFragment {
                    source: text[s..end].to_string(),
                    language: None,
                    span: s..end,
                });
            } else {
                prose.push_str(&text[s..end]);
            }
        }
    };

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        if is_code_line(line) {
            if run_start.is_none() {
                run_start = Some(start);
                run_lines = 0;
            }
            run_lines += 1;
            run_end = offset;
        } else {
            flush(run_start.take(), run_end, run_lines, &mut fragments, &mut prose);
            prose.push_str(line);
        }
    }
    flush(run_start.take(), run_end, run_lines, &mut fragments, &mut prose);

    Extraction { prose, fragments }
}

/// Heuristic: does this line read like source code rather than prose?
fn is_code_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return false;
    }
    if line.starts_with("    ") || line.starts_with('\t') {
        return true;
    }
    if CODE_LINE_HINT.is_match(trimmed) {
        return true;
    }
    punctuation_density(trimmed) > 0.15
}

/// Does an inline span read like code rather than an emphasized word?
fn looks_like_code(span: &str) -> bool {
    span.contains('(')
        || span.contains('=')
        || span.contains(';')
        || span.contains("::")
        || span.contains('{')
        || CODE_LINE_HINT.is_match(span)
}

/// Share of characters that are code punctuation
#[allow(clippy::cast_precision_loss)]
fn punctuation_density(line: &str) -> f64 {
    if line.len() < 4 {
        return 0.0;
    }
    let punct = line
        .chars()
        .filter(|c| matches!(c, '{' | '}' | '(' | ')' | ';' | '=' | '<' | '>' | '[' | ']'))
        .count();
    punct as f64 / line.len() as f64
}
