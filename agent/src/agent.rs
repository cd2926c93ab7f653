use crate::budget::{CONTENT_SEPARATOR, Compactor, TOPIC_HEADER, approx_tokens};
use crate::callbacks;
use crate::decision::{ContinuationDecision, decision_schema};
use crate::dedupe::{SeenUrls, dedupe};
use crate::fetch::{self, FetchTarget, PageSource, ScrapedPage};
use crate::llm;
use crate::prompts;
use crate::report::{self, Report};
use crate::search::{SearchResult, WebSearch};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tuning knobs of a research run. `Default` carries the reference values.
#[derive(Clone, Debug)]
pub struct ResearchConfig {
    pub max_iterations: usize,
    pub results_per_search: usize,
    pub scrape_pages: bool,
    pub max_scrape_pages: usize,
    pub max_scrape_chars: usize,
    pub fetch_concurrency: usize,
    /// Prompt budget for the compactor and completion cap for the model.
    pub max_tokens: usize,
    pub report_language: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            results_per_search: 5,
            scrape_pages: true,
            max_scrape_pages: 3,
            max_scrape_chars: 3000,
            fetch_concurrency: 5,
            max_tokens: 65536,
            report_language: "Japanese".to_string(),
        }
    }
}

/// One search round as it is shown to the model.
#[derive(Clone, Debug)]
pub struct FindingEntry {
    pub query: String,
    pub formatted_results: String,
}

/// Everything a run accumulates. Lives for one run only.
#[derive(Debug)]
pub struct ResearchState {
    pub initial_query: String,
    pub current_query: String,
    pub iterations_done: usize,
    pub max_iterations: usize,
    pub findings: Vec<FindingEntry>,
    pub scraped_pages: Vec<ScrapedPage>,
    pub searched_topics: Vec<String>,
    pub seen_urls: SeenUrls,
}

impl ResearchState {
    pub fn new(query: &str, max_iterations: usize) -> Self {
        Self {
            initial_query: query.to_string(),
            current_query: query.to_string(),
            iterations_done: 0,
            max_iterations,
            findings: Vec::new(),
            scraped_pages: Vec::new(),
            searched_topics: vec![query.to_string()],
            seen_urls: SeenUrls::new(),
        }
    }

    pub fn findings_text(&self) -> String {
        self.findings
            .iter()
            .enumerate()
            .map(|(i, finding)| {
                format!(
                    "{}{}: {}\n{}\n\n",
                    TOPIC_HEADER,
                    i + 1,
                    finding.query,
                    finding.formatted_results
                )
            })
            .collect()
    }

    pub fn detailed_content(&self) -> String {
        self.scraped_pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                format!(
                    "\n## Scraped content {}: {}\nURL: {}\n\n{}\n\n{}",
                    i + 1,
                    page.title,
                    page.url,
                    page.content,
                    CONTENT_SEPARATOR
                )
            })
            .collect()
    }

    fn fallback_topic(&self) -> String {
        format!("{} additional information", self.initial_query)
    }
}

fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}]\nTitle: {}\nDescription: {}\nURL: {}\n",
                i + 1,
                result.title,
                result.description,
                result.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Searching,
    Evaluating,
    Done,
}

type Callback = Box<dyn callbacks::Callback + Send>;

pub struct ResearchAgent {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    search: Arc<dyn WebSearch + Send + Sync>,
    pages: Option<Arc<dyn PageSource + Send + Sync>>,
    callbacks: Vec<Callback>,
    compactor: Compactor,
    config: ResearchConfig,
}

impl ResearchAgent {
    async fn complete(&mut self, stage: &str, prompt: String) -> Result<String> {
        debug!(stage, approx_tokens = approx_tokens(&prompt), "calling model");

        let mut messages = vec![llm::Message::User(prompt)];
        let response = self
            .llm
            .completion(llm::CompletionRequest {
                messages: &messages,
                max_tokens: u32::try_from(self.config.max_tokens).ok(),
            })
            .await?;

        messages.push(llm::Message::Assistant(response.content.clone()));
        for callback in &mut self.callbacks {
            callback.call(stage, &messages).await?;
        }

        Ok(response.content)
    }

    #[instrument(skip(self, state), fields(round = state.iterations_done + 1, query = %state.current_query))]
    async fn search_round(&mut self, state: &mut ResearchState) -> Phase {
        let raw = match self
            .search
            .search(&state.current_query, self.config.results_per_search)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "search failed, finishing with what we have");
                return Phase::Done;
            }
        };
        let returned = raw.len();

        let accepted = dedupe(raw, &mut state.seen_urls);

        let targets: Vec<FetchTarget> = match &self.pages {
            Some(_) if self.config.scrape_pages => accepted
                .iter()
                .take(self.config.max_scrape_pages)
                .map(|result| FetchTarget {
                    url: result.url.clone(),
                    title: result.title.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };

        let formatted_results = if returned == 0 {
            "No search results were found.".to_string()
        } else if accepted.is_empty() {
            "No new search results were found.".to_string()
        } else {
            format_results(&accepted)
        };

        let pages = match &self.pages {
            Some(source) if !targets.is_empty() => {
                fetch::fetch_many(
                    source.clone(),
                    targets,
                    self.config.fetch_concurrency,
                    self.config.max_scrape_chars,
                )
                .await
            }
            _ => Vec::new(),
        };

        info!(
            returned,
            accepted = accepted.len(),
            scraped = pages.len(),
            "search round complete"
        );

        state.findings.push(FindingEntry {
            query: state.current_query.clone(),
            formatted_results,
        });
        state.scraped_pages.extend(pages);
        state.iterations_done += 1;

        Phase::Evaluating
    }

    async fn evaluate(&mut self, state: &mut ResearchState) -> Result<Phase> {
        let prompt = prompts::decision(
            &state.initial_query,
            &state.findings_text(),
            &state.searched_topics,
            &decision_schema()?,
        );

        let stage = format!("decision {}", state.iterations_done);
        let decision = match self.complete(&stage, prompt).await {
            Ok(output) => ContinuationDecision::parse(&output).unwrap_or_else(|err| {
                warn!(error = %err, "unreadable decision, continuing");
                ContinuationDecision::fallback()
            }),
            Err(err @ (Error::IOError(_) | Error::TaskJoinError(_))) => return Err(err),
            Err(err) => {
                warn!(error = %err, "decision call failed, continuing");
                ContinuationDecision::fallback()
            }
        };

        if !decision.should_continue || state.iterations_done >= state.max_iterations {
            info!(
                should_continue = decision.should_continue,
                iterations = state.iterations_done,
                "research finished"
            );
            return Ok(Phase::Done);
        }

        let next = decision
            .next_topic
            .unwrap_or_else(|| state.fallback_topic());
        info!(next = %next, "next search topic");

        state.current_query = next.clone();
        state.searched_topics.push(next);
        Ok(Phase::Searching)
    }

    #[instrument(skip(self, state), fields(iterations = state.iterations_done))]
    async fn synthesize(&mut self, state: ResearchState) -> Result<Report> {
        let (findings, content) = self.compactor.compact(
            &state.findings_text(),
            &state.detailed_content(),
            self.config.max_tokens,
        );

        let prompt = prompts::synthesis(
            &state.initial_query,
            &findings,
            &content,
            &self.config.report_language,
        );

        let body = self.complete("synthesis", prompt).await?;

        Ok(Report {
            topic: state.initial_query,
            generated_at: chrono::Local::now(),
            iterations: state.iterations_done,
            model: self.llm.model().to_string(),
            body: report::clean(&body),
        })
    }

    /// Runs the search / evaluate cycle for `query` and writes the report.
    /// Search and fetch failures only end the cycle early; a failed synthesis
    /// call is returned as an error.
    pub async fn run(&mut self, query: &str) -> Result<Report> {
        let mut state = ResearchState::new(query, self.config.max_iterations);
        info!(query, max_iterations = state.max_iterations, "starting research");

        let mut phase = if state.max_iterations == 0 {
            Phase::Done
        } else {
            Phase::Searching
        };

        while phase != Phase::Done {
            phase = match phase {
                Phase::Searching => self.search_round(&mut state).await,
                Phase::Evaluating => self.evaluate(&mut state).await?,
                Phase::Done => Phase::Done,
            };
        }

        self.synthesize(state).await
    }
}

pub struct ResearchAgentBuilder {
    llm: Option<Arc<dyn llm::LLM + Send + Sync>>,
    search: Option<Arc<dyn WebSearch + Send + Sync>>,
    pages: Option<Arc<dyn PageSource + Send + Sync>>,
    callbacks: Vec<Callback>,
    compactor: Compactor,
    config: ResearchConfig,
}

impl ResearchAgentBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            search: None,
            pages: None,
            callbacks: Vec::new(),
            compactor: Compactor::default(),
            config: ResearchConfig::default(),
        }
    }

    pub fn llm(mut self, llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn search(mut self, search: Arc<dyn WebSearch + Send + Sync>) -> Self {
        self.search = Some(search);
        self
    }

    /// Without a page source no pages are scraped.
    pub fn pages(mut self, pages: Arc<dyn PageSource + Send + Sync>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn callback(mut self, callback: Callback) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn compactor(mut self, compactor: Compactor) -> Self {
        self.compactor = compactor;
        self
    }

    pub fn config(mut self, config: ResearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ResearchAgent> {
        Ok(ResearchAgent {
            llm: self
                .llm
                .ok_or(Error::MissingArg("llm is required for research".to_string()))?,
            search: self.search.ok_or(Error::MissingArg(
                "search client is required for research".to_string(),
            ))?,
            pages: self.pages,
            callbacks: self.callbacks,
            compactor: self.compactor,
            config: self.config,
        })
    }
}

impl Default for ResearchAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
