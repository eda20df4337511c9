//! Prompt shaping for the educational responder
//!
//! The system instruction sets the tutoring register once; the per-request
//! prompt carries the prose, the extracted code re-fenced with its
//! detected language, and an intent-specific ask list.

use std::fmt::Write;

use crate::request::{AssistantRequest, Intent};

/// Standing instruction sent with every request
pub const SYSTEM_INSTRUCTION: &str = "\
You are an experienced programming tutor. Provide clear, step-by-step \
explanations suitable for learners: break concepts into digestible parts, \
use examples and analogies, point out common mistakes and how to avoid \
them, and encourage good practices. Always explain the reasoning behind a \
solution. Focus on teaching, not just answering - help the user understand \
the why behind the what.";

/// Intent-specific asks appended after the sender's material
const fn intent_brief(intent: Intent) -> &'static str {
    match intent {
        Intent::Debug => {
            "Identify any errors or issues, explain what is wrong and why, \
             give a step-by-step fix with corrected code, and add a tip for \
             avoiding the same mistake."
        }
        Intent::Review => {
            "Give an educational code review: overall quality, best \
             practices, performance and readability, and concrete \
             improvement suggestions with examples."
        }
        Intent::Explain => {
            "Explain in beginner-friendly terms: a simple definition, why \
             it matters, a small worked example, and common pitfalls."
        }
        Intent::General => {
            "Answer helpfully with an educational focus, and suggest what \
             to learn next."
        }
    }
}

/// Render an assistant request into the prompt text for the responder
#[must_use]
pub fn render(request: &AssistantRequest) -> String {
    let mut prompt = String::new();

    let prose = request.prose.trim();
    if !prose.is_empty() {
        let _ = writeln!(prompt, "{prose}");
    }

    for fragment in &request.fragments {
        let tag = fragment.language.as_deref().unwrap_or_default();
        let _ = writeln!(prompt, "\n```{tag}\n{}\n```", fragment.source.trim_end());
    }

    if prompt.is_empty() {
        prompt.push_str("(empty message)\n");
    }

    let _ = write!(prompt, "\n{}", intent_brief(request.intent));
    prompt
}
