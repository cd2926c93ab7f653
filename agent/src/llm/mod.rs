use crate::Result;
use async_trait::async_trait;

mod openai;
pub use openai::OpenAI;

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    User(String),
    Assistant(String),
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::User(content) => write!(f, "#### User\n\n{}\n\n", content),
            Message::Assistant(content) => write!(f, "#### Assistant\n\n{}\n\n", content),
        }
    }
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub max_tokens: Option<u32>,
}

pub struct CompletionResponse {
    pub content: String,
}

#[async_trait]
pub trait LLM {
    /// Identifier reported in the report header.
    fn model(&self) -> &str;

    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}
