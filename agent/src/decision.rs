use crate::{Error, Result};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;

/// What the model wants to do after a search round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuationDecision {
    pub next_topic: Option<String>,
    pub should_continue: bool,
}

/// Wire shape of the decision answer.
#[derive(Deserialize, JsonSchema)]
struct DecisionPayload {
    /// Next query to search, or null when nothing is left to look up.
    #[serde(rename = "nextSearchTopic", default)]
    next_search_topic: Option<String>,

    /// Whether another search round is needed.
    #[serde(rename = "shouldContinue", default)]
    #[schemars(with = "bool")]
    should_continue: Option<Flag>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Number(n) => *n != 0.0,
            Flag::Text(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        }
    }
}

/// JSON schema of the expected answer, embedded in the decision prompt.
pub fn decision_schema() -> Result<String> {
    Ok(serde_json::to_string_pretty(&schema_for!(DecisionPayload))?)
}

/// Body of the first ``` fence, preferring one tagged `json`.
fn fenced_block(output: &str) -> Option<&str> {
    let (start, tag_len) = match output.find("```json") {
        Some(start) => (start, "```json".len()),
        None => (output.find("```")?, "```".len()),
    };

    let body = &output[start + tag_len..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

fn brace_span(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (start < end).then(|| &output[start..=end])
}

impl ContinuationDecision {
    /// Decision used when the model's answer cannot be read: keep searching.
    pub fn fallback() -> Self {
        Self {
            next_topic: None,
            should_continue: true,
        }
    }

    /// Reads the decision out of a model answer. Tries a fenced block, then
    /// the whole text, then the outermost `{...}` span. Missing fields take
    /// their defaults (no topic, continue).
    pub fn parse(output: &str) -> Result<Self> {
        let candidates = [fenced_block(output), Some(output.trim()), brace_span(output)];

        let mut last_err = None;
        for candidate in candidates.into_iter().flatten() {
            match serde_json::from_str::<DecisionPayload>(candidate) {
                Ok(payload) => return Ok(payload.into()),
                Err(err) => last_err = Some(err),
            }
        }

        Err(Error::DecisionParseError(match last_err {
            Some(err) => err.to_string(),
            None => "empty response".to_string(),
        }))
    }
}

impl From<DecisionPayload> for ContinuationDecision {
    fn from(payload: DecisionPayload) -> Self {
        Self {
            next_topic: payload
                .next_search_topic
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty()),
            should_continue: payload.should_continue.as_ref().is_none_or(Flag::is_set),
        }
    }
}
