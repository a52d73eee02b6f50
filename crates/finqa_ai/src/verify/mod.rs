use finqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::llm::Llm;

/// Judged support for a draft answer. `score` is in [0, 1]; higher means
/// stronger grounding in the supplied evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub notes: String,
}

fn judge_prompt(question: &str, draft: &str, evidence_blocks: &str, query_blocks: &str) -> String {
    format!(
        r#"You judge whether an answer is supported by the provided evidence.
Higher score means stronger support. Penalize any number or statement not
clearly grounded in the evidence below.

Return ONLY a single JSON object: {{"score": <float in [0,1]>, "notes": "..."}}

Question: {question}

Answer:
{draft}

Evidence (filing text):
{evidence_blocks}

Evidence (query results):
{query_blocks}
"#
    )
}

/// Second model call: judge the draft against its evidence. Transport
/// failures propagate; an unparsable judgment is `VERIFIER_PARSE_FAILED`,
/// which the abstention gate treats as a score of zero.
pub fn verify_answer(
    llm: &dyn Llm,
    model: &str,
    question: &str,
    draft: &str,
    evidence_blocks: &str,
    query_blocks: &str,
) -> Result<Verdict, AppError> {
    let raw = llm.generate(model, &judge_prompt(question, draft, evidence_blocks, query_blocks))?;
    parse_verdict(&raw)
}

#[derive(Debug, Deserialize)]
struct VerdictWire {
    score: Option<f64>,
    // The judge model sometimes names the field after the quality itself.
    faithfulness: Option<f64>,
    #[serde(default)]
    notes: String,
}

/// Extract a verdict from possibly noisy judge output.
///
/// Strategy, in order: strict JSON decode; JSON recovered from code fences
/// or the outermost brace span; deterministic scan for a `"score"`-keyed
/// number. Recovered scores are clamped to [0, 1]. Only when every stage
/// fails is this a `VERIFIER_PARSE_FAILED` — never a silent default.
pub fn parse_verdict(raw: &str) -> Result<Verdict, AppError> {
    if let Some(value) = extract_json_object(raw) {
        if let Ok(wire) = serde_json::from_value::<VerdictWire>(value) {
            if let Some(score) = wire.score.or(wire.faithfulness) {
                return Ok(Verdict {
                    score: score.clamp(0.0, 1.0),
                    notes: wire.notes,
                });
            }
        }
    }

    if let Some(score) =
        extract_named_number(raw, "score").or_else(|| extract_named_number(raw, "faithfulness"))
    {
        return Ok(Verdict {
            score: score.clamp(0.0, 1.0),
            notes: String::new(),
        });
    }

    Err(AppError::new(
        "VERIFIER_PARSE_FAILED",
        "No faithfulness score recoverable from judge output",
    )
    .with_details(detail_snippet(raw)))
}

/// Best-effort JSON object extraction: strict parse, then fenced blocks,
/// then the outermost `{ .. }` span.
pub(crate) fn extract_json_object(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(inner.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
        Ok(v) if v.is_object() => Some(v),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Deterministic fallback: scan for `"key" : <number>` and parse the number.
pub(crate) fn extract_named_number(raw: &str, key: &str) -> Option<f64> {
    let needle = format!("\"{key}\"");
    let mut search_from = 0;
    while let Some(pos) = raw[search_from..].find(&needle) {
        let after = &raw[search_from + pos + needle.len()..];
        let after = after.trim_start();
        if let Some(rest) = after.strip_prefix(':') {
            let rest = rest.trim_start();
            let num: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
                .collect();
            if let Ok(v) = num.parse::<f64>() {
                return Some(v);
            }
        }
        search_from += pos + needle.len();
    }
    None
}

pub(crate) fn detail_snippet(raw: &str) -> String {
    let t = raw.trim();
    if t.chars().count() <= 200 {
        format!("raw={t}")
    } else {
        let head: String = t.chars().take(200).collect();
        format!("raw={head}...")
    }
}
