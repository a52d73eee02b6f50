use std::collections::BTreeSet;

use finqa_core::error::AppError;

/// Citation markers found in a draft, by kind.
///
/// Text evidence is cited as `[[chunk:<id>]]`, executed queries as
/// `[[query:<id>]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSets {
    pub chunks: BTreeSet<String>,
    pub queries: BTreeSet<String>,
}

pub fn extract_markers(text: &str) -> MarkerSets {
    MarkerSets {
        chunks: extract_with_prefix(text, "[[chunk:"),
        queries: extract_with_prefix(text, "[[query:"),
    }
}

fn extract_with_prefix(text: &str, prefix: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let bytes = text.as_bytes();
    let plen = prefix.len();
    let mut i = 0usize;
    while i + plen < bytes.len() {
        if bytes[i..].starts_with(prefix.as_bytes()) {
            let start = i + plen;
            if let Some(end) = bytes[start..].iter().position(|&b| b == b']') {
                let after = start + end;
                if text.get(after..after + 2) == Some("]]") {
                    let id = text[start..after].trim();
                    if !id.is_empty() {
                        out.insert(id.to_string());
                    }
                }
                i = after + 2;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Enforce the grounding contract on a draft before verification:
///
/// 1. at least one citation marker overall;
/// 2. every marker references a supplied chunk or query id;
/// 3. every line asserting a number carries a `[[query:]]` marker for a
///    query that executed successfully.
///
/// The pipeline converts a violation into an abstention, not a user-visible
/// error: a partially-cited draft is never released.
pub fn enforce_grounding(
    draft: &str,
    allowed_chunks: &BTreeSet<String>,
    allowed_queries: &BTreeSet<String>,
    healthy_queries: &BTreeSet<String>,
) -> Result<(), AppError> {
    let markers = extract_markers(draft);
    if markers.chunks.is_empty() && markers.queries.is_empty() {
        return Err(AppError::new(
            "ANSWER_CITATION_REQUIRED",
            "Draft contains no citation markers",
        ));
    }
    for id in markers.chunks.iter() {
        if !allowed_chunks.contains(id) {
            return Err(AppError::new(
                "ANSWER_CITATION_INVALID",
                "Draft cited a chunk outside the supplied evidence",
            )
            .with_details(format!("chunk_id={id}")));
        }
    }
    for id in markers.queries.iter() {
        if !allowed_queries.contains(id) {
            return Err(AppError::new(
                "ANSWER_CITATION_INVALID",
                "Draft cited an unknown query id",
            )
            .with_details(format!("query_id={id}")));
        }
    }

    for (lineno, line) in draft.lines().enumerate() {
        let line_markers = extract_markers(line);
        let stripped = strip_markers(line);
        if !has_numeric_claim(&stripped) {
            continue;
        }
        let grounded = line_markers.queries.iter().any(|q| healthy_queries.contains(q));
        if !grounded {
            return Err(AppError::new(
                "ANSWER_NUMERIC_UNGROUNDED",
                "Numeric claim lacks a successful query citation",
            )
            .with_details(format!("line={}; text={}", lineno + 1, stripped.trim())));
        }
    }

    Ok(())
}

fn strip_markers(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        match rest[start..].find("]]") {
            Some(end) => rest = &rest[start + end + 2..],
            None => {
                rest = &rest[start + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Filing form names look numeric but are not claims.
const FORM_TOKENS: [&str; 6] = ["10-K/A", "10-Q/A", "10-K", "10-Q", "8-K", "20-F"];

fn has_numeric_claim(line: &str) -> bool {
    let mut cleaned = line.to_string();
    for form in FORM_TOKENS.iter() {
        cleaned = cleaned.replace(form, " ");
    }

    let mut digits_in_run = 0u32;
    let mut run_has_point = false;
    for c in cleaned.chars().chain(std::iter::once(' ')) {
        match c {
            '0'..='9' => digits_in_run += 1,
            '.' | ',' if digits_in_run > 0 => run_has_point = c == '.' || run_has_point,
            '%' if digits_in_run > 0 => return true,
            _ => {
                if digits_in_run >= 2 || (digits_in_run >= 1 && run_has_point) {
                    return true;
                }
                digits_in_run = 0;
                run_has_point = false;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_both_marker_kinds() {
        let m = extract_markers("Revenue grew [[query:S1]] as stated [[chunk:abc]] and [[chunk:def]].");
        assert_eq!(m.queries, set(&["S1"]));
        assert_eq!(m.chunks, set(&["abc", "def"]));
    }

    #[test]
    fn requires_at_least_one_marker() {
        let err = enforce_grounding("no citations here", &set(&[]), &set(&[]), &set(&[]))
            .expect_err("should fail");
        assert_eq!(err.code, "ANSWER_CITATION_REQUIRED");
    }

    #[test]
    fn rejects_markers_outside_supplied_evidence() {
        let err = enforce_grounding(
            "Claim [[chunk:unknown]]",
            &set(&["known"]),
            &set(&[]),
            &set(&[]),
        )
        .expect_err("should fail");
        assert_eq!(err.code, "ANSWER_CITATION_INVALID");
    }

    #[test]
    fn numeric_line_needs_healthy_query_citation() {
        let allowed_chunks = set(&["c1"]);
        let allowed_queries = set(&["S1"]);

        // Ungrounded number.
        let err = enforce_grounding(
            "Revenue was 212000 last year [[chunk:c1]]",
            &allowed_chunks,
            &allowed_queries,
            &allowed_queries,
        )
        .expect_err("should fail");
        assert_eq!(err.code, "ANSWER_NUMERIC_UNGROUNDED");

        // Same number, cited to a healthy query.
        enforce_grounding(
            "Revenue was 212000 last year [[query:S1]] [[chunk:c1]]",
            &allowed_chunks,
            &allowed_queries,
            &allowed_queries,
        )
        .expect("should pass");

        // Cited to an errored query: still ungrounded.
        let err = enforce_grounding(
            "Revenue was 212000 last year [[query:S1]] [[chunk:c1]]",
            &allowed_chunks,
            &allowed_queries,
            &set(&[]),
        )
        .expect_err("should fail");
        assert_eq!(err.code, "ANSWER_NUMERIC_UNGROUNDED");
    }

    #[test]
    fn form_names_and_marker_ids_are_not_numeric_claims() {
        enforce_grounding(
            "The 10-K discusses segment mix [[chunk:c1]]",
            &set(&["c1"]),
            &set(&[]),
            &set(&[]),
        )
        .expect("form token is not a claim");

        // Digits inside a marker id do not count either.
        enforce_grounding(
            "Margins improved [[chunk:c42]]",
            &set(&["c42"]),
            &set(&[]),
            &set(&[]),
        )
        .expect("marker id digits are stripped");
    }
}
