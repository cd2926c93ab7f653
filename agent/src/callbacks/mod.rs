use crate::Result;
use crate::llm::Message;
use async_trait::async_trait;

mod logger;
pub use logger::MessageLogger;

/// Observes every model exchange of a research run.
#[async_trait]
pub trait Callback {
    async fn call(&mut self, stage: &str, messages: &[Message]) -> Result<()>;
}
