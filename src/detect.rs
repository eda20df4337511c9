//! Programming-language detection heuristics
//!
//! Two-stage detection: an ordered list of decisive signature rules first
//! (all required patterns must match, yielding high confidence), then a
//! weighted scoring pass over per-language pattern sets as a fallback.
//! Detection is pure and deterministic; identical input always yields the
//! same answer.

use std::sync::LazyLock;

use regex::Regex;

/// How sure the detector is about its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// A decisive signature rule matched
    High,
    /// Best-scoring candidate from the weighted pass
    Low,
}

/// Result of a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Detected language, or `None` when nothing cleared the minimum score
    pub language: Option<&'static str>,
    /// Confidence of the answer
    pub confidence: Confidence,
}

impl Detection {
    const fn unknown() -> Self {
        Self {
            language: None,
            confidence: Confidence::Low,
        }
    }
}

/// A decisive signature rule: every pattern must match
struct SignatureRule {
    language: &'static str,
    required: Vec<Regex>,
}

fn rule(language: &'static str, patterns: &[&str]) -> SignatureRule {
    SignatureRule {
        language,
        required: patterns
            .iter()
            .map(|p| Regex::new(p).expect("valid signature pattern"))
            .collect(),
    }
}

/// Ordered decisive rules. More specific languages come first so that
/// e.g. C++ streams win over plain C includes.
static SIGNATURE_RULES: LazyLock<Vec<SignatureRule>> = LazyLock::new(|| {
    vec![
        rule("php", &[r"<\?php"]),
        rule("html", &[r"(?i)<!DOCTYPE\s+html|<html"]),
        rule("python", &[r"def\s+\w+\s*\([^)]*\)\s*:"]),
        rule("python", &[r#"if\s+__name__\s*==\s*['"]__main__['"]"#]),
        rule("rust", &[r"fn\s+\w+\s*\(", r"(let\s+mut\s+|->\s|::|println!)"]),
        rule("go", &[r"package\s+\w+", r"func\s+\w+\s*\("]),
        rule("java", &[r"public\s+(static\s+)?(class|void|int|String)"]),
        rule("cpp", &[r"#include\s*<", r"(std::|cout\s*<<|cin\s*>>)"]),
        rule("c", &[r"#include\s*<", r"(printf\s*\(|scanf\s*\()"]),
        rule("javascript", &[r"function\s+\w+\s*\(|=>", r"(console\.log|const\s+\w+|let\s+\w+)"]),
        rule("css", &[r"@media|@import", r"[.#][\w-]+\s*\{"]),
    ]
});

/// Weighted scoring patterns per language (fallback pass)
struct ScoreSet {
    language: &'static str,
    patterns: Vec<(Regex, u32)>,
}

fn scores(language: &'static str, patterns: &[(&str, u32)]) -> ScoreSet {
    ScoreSet {
        language,
        patterns: patterns
            .iter()
            .map(|(p, w)| (Regex::new(p).expect("valid scoring pattern"), *w))
            .collect(),
    }
}

static SCORE_SETS: LazyLock<Vec<ScoreSet>> = LazyLock::new(|| {
    vec![
        scores(
            "python",
            &[
                (r"\bdef\s+\w+", 2),
                (r"\bimport\s+\w+", 1),
                (r"\bclass\s+\w+", 1),
                (r"\bprint\s*\(", 2),
                (r"\bfor\s+\w+\s+in\b", 2),
                (r"\brange\s*\(", 2),
                (r"\bself\b", 1),
                (r"\belif\b", 2),
            ],
        ),
        scores(
            "javascript",
            &[
                (r"\bfunction\s+\w+", 2),
                (r"\bvar\s+\w+", 1),
                (r"\blet\s+\w+", 1),
                (r"\bconst\s+\w+", 1),
                (r"console\.log", 2),
                (r"=>", 2),
                (r"===", 2),
            ],
        ),
        scores(
            "java",
            &[
                (r"public\s+class", 2),
                (r"System\.out\.print", 2),
                (r"import\s+java\.", 2),
                (r"new\s+\w+\s*\(", 1),
                (r"void\s+\w+\s*\(", 1),
            ],
        ),
        scores(
            "cpp",
            &[
                (r"#include\s*<", 1),
                (r"int\s+main\s*\(", 1),
                (r"std::", 2),
                (r"cout\s*<<", 2),
                (r"cin\s*>>", 2),
            ],
        ),
        scores(
            "c",
            &[
                (r"#include\s*<", 1),
                (r"int\s+main\s*\(", 1),
                (r"printf\s*\(", 2),
                (r"scanf\s*\(", 2),
                (r"malloc\s*\(", 2),
            ],
        ),
        scores(
            "go",
            &[
                (r"package\s+main", 2),
                (r"func\s+\w+", 2),
                (r"fmt\.Print", 2),
                (r":=", 2),
            ],
        ),
        scores(
            "rust",
            &[
                (r"fn\s+\w+", 2),
                (r"let\s+mut\s+", 2),
                (r"println!\s*\(", 2),
                (r"use\s+std::", 2),
                (r"impl\s+\w+", 2),
                (r"match\s+\w+", 1),
            ],
        ),
        scores(
            "php",
            &[(r"\$\w+", 1), (r"echo\s+", 2), (r"->\w+\s*\(", 1)],
        ),
        scores(
            "html",
            &[(r"</\w+>", 2), (r"<div|<span|<body|<head", 2)],
        ),
        scores(
            "css",
            &[(r"[.#][\w-]+\s*\{", 2), (r":\s*[\w-]+\s*;", 1)],
        ),
        scores(
            "ruby",
            &[(r"(?m)\bdef\s+\w+\s*$", 1), (r"\bend\b", 1), (r"puts\s+", 2)],
        ),
    ]
});

/// Minimum fallback score a candidate must clear
const MIN_SCORE: u32 = 2;

/// Detect the most likely programming language of `code`.
///
/// Decisive signature rules are tried in order; the first rule whose
/// required patterns all match wins at high confidence. Otherwise the
/// weighted pass returns the best-scoring candidate at low confidence.
/// An exact tie between the two best candidates, or no candidate clearing
/// the minimum score, yields no language.
#[must_use]
pub fn detect(code: &str) -> Detection {
    for rule in SIGNATURE_RULES.iter() {
        if rule.required.iter().all(|re| re.is_match(code)) {
            return Detection {
                language: Some(rule.language),
                confidence: Confidence::High,
            };
        }
    }

    let mut best: Option<(&'static str, u32)> = None;
    let mut runner_up: u32 = 0;

    for set in SCORE_SETS.iter() {
        let score: u32 = set
            .patterns
            .iter()
            .map(|(re, weight)| u32::try_from(re.find_iter(code).count()).unwrap_or(u32::MAX) * weight)
            .sum();

        if best.is_none_or(|(_, top)| score > top) {
            if let Some((_, top)) = best {
                runner_up = top;
            }
            best = Some((set.language, score));
        } else if score > runner_up {
            runner_up = score;
        }
    }

    match best {
        // Exact tie between the top two candidates is ambiguous
        Some((language, score)) if score >= MIN_SCORE && score != runner_up => Detection {
            language: Some(language),
            confidence: Confidence::Low,
        },
        _ => Detection::unknown(),
    }
}

/// Map a file extension to a language name (file uploads bypass the
/// heuristic pass entirely)
#[must_use]
pub fn from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "py" => Some("python"),
        "js" | "mjs" => Some("javascript"),
        "ts" => Some("typescript"),
        "java" => Some("java"),
        "cpp" | "cc" | "cxx" | "hpp" => Some("cpp"),
        "c" | "h" => Some("c"),
        "html" | "htm" => Some("html"),
        "css" => Some("css"),
        "php" => Some("php"),
        "go" => Some("go"),
        "rs" => Some("rust"),
        "rb" => Some("ruby"),
        "swift" => Some("swift"),
        _ => None,
    }
}
