use crate::config::Config;
use anyhow::{Context, Result};
use research_agent::callbacks::MessageLogger;
use research_agent::fetch::HttpPageSource;
use research_agent::llm::OpenAI;
use research_agent::report::Report;
use research_agent::search::BraveSearch;
use research_agent::{ResearchAgent, ResearchAgentBuilder};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

pub struct Orchestrator {
    agent: ResearchAgent,
    query: String,
}

impl Orchestrator {
    pub fn new(config: Config, query: String, transcript: Option<&Path>) -> Result<Self> {
        let llm = OpenAI::azure(
            &config.llm.endpoint,
            &config.llm.api_key,
            &config.llm.api_version,
            config.llm.model.clone(),
        );

        let search = BraveSearch::new(
            config.search.endpoint.clone(),
            config.search.api_key.clone(),
            config.search.locale.clone(),
        )
        .context("failed to build the search client")?;

        let mut builder = ResearchAgentBuilder::new()
            .llm(llm)
            .search(Arc::new(search))
            .config(config.research.clone());

        if config.research.scrape_pages {
            let pages =
                HttpPageSource::new(config.fetch_timeout, &config.search.locale.accept_language)
                    .context("failed to build the page fetcher")?;
            builder = builder.pages(Arc::new(pages));
        }

        if let Some(path) = transcript {
            let file = File::create(path)
                .with_context(|| format!("failed to create transcript {}", path.display()))?;
            builder = builder.callback(MessageLogger::new(&query, BufWriter::new(file))?);
        }

        Ok(Self {
            agent: builder.build()?,
            query,
        })
    }

    pub async fn run(mut self) -> Result<Report> {
        let report = self
            .agent
            .run(&self.query)
            .await
            .context("research run failed")?;
        Ok(report)
    }
}
