const DECISION_PROMPT: &str = include_str!("prompts/decision.md");
const SYNTHESIS_PROMPT: &str = include_str!("prompts/synthesis.md");

/// Substitutes `{{name}}` placeholders in one pass, so placeholder-looking
/// text inside the substituted values is left as is.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let value = after.find("}}").and_then(|end| {
            values
                .iter()
                .find(|(name, _)| *name == &after[..end])
                .map(|(_, value)| (end, *value))
        });

        match value {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub(crate) fn decision(query: &str, findings: &str, topics: &[String], schema: &str) -> String {
    render(
        DECISION_PROMPT,
        &[
            ("query", query),
            ("findings", findings),
            ("topics", &topics.join(", ")),
            ("schema", schema),
        ],
    )
}

pub(crate) fn synthesis(query: &str, findings: &str, content: &str, language: &str) -> String {
    render(
        SYNTHESIS_PROMPT,
        &[
            ("query", query),
            ("findings", findings),
            ("content", content),
            ("language", language),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::{decision, render};

    #[test]
    fn test_render() {
        assert_eq!(render("a {{x}} b {{y}}", &[("x", "1"), ("y", "{{x}}")]), "a 1 b {{x}}");
        assert_eq!(render("{{unknown}} {{x", &[("x", "1")]), "{{unknown}} {{x");
    }

    #[test]
    fn test_decision_prompt() {
        let prompt = decision(
            "rust",
            "### Search topic 1: rust\n[1]\n",
            &["rust".to_string(), "tokio".to_string()],
            "{\"type\": \"object\"}",
        );

        assert!(prompt.contains("## User's Query\nrust\n"));
        assert!(prompt.contains("### Search topic 1: rust\n[1]\n"));
        assert!(prompt.contains("rust, tokio"));
        assert!(prompt.contains("{\"type\": \"object\"}"));
        assert!(!prompt.contains("{{"));
    }
}
