use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[ \t]*(?i:json)?").expect("valid fence regex"));

pub fn strip_code_fences(raw: &str) -> String {
    FENCE_PATTERN.replace_all(raw, "").trim().to_string()
}

/// Finds the JSON object inside an LLM reply.
///
/// Fences are removed first. The text is then walked one top-level balanced
/// span at a time and the largest span that parses as a JSON object wins, so
/// stray or empty braces in prose around the payload are skipped. A span that
/// fails to parse is stepped over whole; its nested objects are never offered
/// on their own. When nothing parses, the span from the first `{` to the last
/// `}` is returned, and when there is no such span the cleaned text comes back
/// unchanged. The result is a candidate only; the caller still has to parse it.
pub fn extract_json(raw: &str) -> String {
    let cleaned = strip_code_fences(raw);

    if let Some(candidate) = largest_parseable_object(&cleaned) {
        return candidate.to_string();
    }

    match greedy_object_span(&cleaned) {
        Some(span) => span.to_string(),
        None => cleaned,
    }
}

fn largest_parseable_object(text: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        // An unclosed brace swallows the rest of the text.
        let Some(length) = balanced_length(&text[start..]) else {
            break;
        };

        let candidate = &text[start..start + length];
        let is_object = matches!(
            serde_json::from_str::<Value>(candidate),
            Ok(Value::Object(_))
        );
        if is_object && best.map_or(true, |current| candidate.len() > current.len()) {
            best = Some(candidate);
        }

        cursor = start + length;
    }

    best
}

/// Byte length of the brace-balanced span opening at the start of `text`,
/// ignoring braces inside JSON string literals.
fn balanced_length(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn greedy_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_and_bare_payloads_extract_identically() {
        let bare = r#"{"flight":{"budget":{"min":1}}}"#;
        let fenced = format!("```json\n{bare}\n```");
        let untagged = format!("```\n{bare}\n```");

        assert_eq!(extract_json(&fenced), extract_json(bare));
        assert_eq!(extract_json(&untagged), bare);
    }

    #[test]
    fn skips_prose_braces_before_payload() {
        let raw = r#"Prices vary {roughly} by season. {"budget":{"min":10,"max":20}} Hope this helps"#;
        assert_eq!(extract_json(raw), r#"{"budget":{"min":10,"max":20}}"#);
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        let raw = r#"Result: {"details":"use code {SUMMER}","price":"}"} done"#;
        assert_eq!(
            extract_json(raw),
            r#"{"details":"use code {SUMMER}","price":"}"}"#
        );
    }

    #[test]
    fn falls_back_to_greedy_span_when_nothing_parses() {
        let raw = "intro {not: json} and {also not} outro";
        assert_eq!(extract_json(raw), "{not: json} and {also not}");
    }

    #[test]
    fn failed_outer_span_is_not_mined_for_inner_objects() {
        let raw = r#"{"flight":{"budget":{"min":200,"max":400},"premium":{"min":900,}}}"#;
        assert_eq!(extract_json(raw), raw);
        assert!(serde_json::from_str::<Value>(&extract_json(raw)).is_err());
    }

    #[test]
    fn largest_top_level_object_beats_empty_template() {
        let raw = r#"Template: {} Answer: {"budget":{"min":200}} Note: {"ok":1}"#;
        assert_eq!(extract_json(raw), r#"{"budget":{"min":200}}"#);
    }

    #[test]
    fn truncated_reply_is_not_mined_for_inner_objects() {
        let raw = r#"{"flight":{"budget":{"min":200,"max":400}}"#;
        assert!(serde_json::from_str::<Value>(&extract_json(raw)).is_err());
    }

    #[test]
    fn text_without_braces_is_returned_cleaned() {
        assert_eq!(extract_json("  not json at all "), "not json at all");
    }
}
