// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that asks for a numeric score.
pub const SCORE_RANGE_INSTRUCTION: &str = "\
    Every score and percentage MUST be a number between 0 and 100 inclusive.";

/// Fills `{name}` placeholders in a single left-to-right pass over `template`.
///
/// Substituted values are never rescanned, so caller text that happens to
/// contain `{resume_text}` or similar reaches the model verbatim. Unknown
/// placeholders and stray braces are copied through unchanged.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_replaces_each_placeholder() {
        let filled = fill_template("A={a}, B={b}, A again={a}", &[("a", "1"), ("b", "2")]);
        assert_eq!(filled, "A=1, B=2, A again=1");
    }

    #[test]
    fn test_fill_template_does_not_rescan_values() {
        let filled = fill_template(
            "R: {resume_text}\nJ: {job_description}",
            &[
                ("resume_text", "mentions {job_description}"),
                ("job_description", "mentions {resume_text}"),
            ],
        );
        assert_eq!(filled, "R: mentions {job_description}\nJ: mentions {resume_text}");
    }

    #[test]
    fn test_fill_template_keeps_unknown_and_literal_braces() {
        let filled = fill_template(r#"{"percentage": number} {other} {x"#, &[("x", "X")]);
        assert_eq!(filled, r#"{"percentage": number} {other} {x"#);
    }
}
