use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("No response from llm: {0}")]
    LLMResponseError(String),

    #[error("Request timed out: {0}")]
    TimeoutError(String),

    #[error("Connection failed: {0}")]
    ConnectError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("HTTP status {status} from {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Could not parse decision: {0}")]
    DecisionParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing arg: {0}")]
    MissingArg(String),

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|| "<unknown url>".to_string());

        if err.is_timeout() {
            Error::TimeoutError(url)
        } else if err.is_connect() {
            Error::ConnectError(url)
        } else if let Some(status) = err.status() {
            Error::HttpStatusError {
                status: status.as_u16(),
                url,
            }
        } else if err.is_decode() || err.is_body() {
            Error::ProtocolError(err.to_string())
        } else {
            Error::TransportError(err.to_string())
        }
    }
}
