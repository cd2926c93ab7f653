mod agent;
pub mod budget;
pub mod callbacks;
pub mod decision;
pub mod dedupe;
mod error;
pub mod fetch;
pub mod llm;
mod prompts;
pub mod report;
pub mod search;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use agent::{
    FindingEntry, ResearchAgent, ResearchAgentBuilder, ResearchConfig, ResearchState,
};
