use crate::{Error, Result};
use async_trait::async_trait;
use scraper::{Html, Node};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const TRUNCATION_MARKER: &str = "...(truncated)";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript",
];

#[derive(Clone, Debug, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub content: String,
    pub truncated: bool,
    pub failed: bool,
}

#[derive(Clone, Debug)]
pub struct FetchTarget {
    pub url: String,
    pub title: String,
}

/// Where raw HTML comes from.
#[async_trait]
pub trait PageSource {
    async fn get_html(&self, url: &str) -> Result<String>;
}

pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(timeout: Duration, accept_language: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_str(accept_language)
                .map_err(|e| Error::ConfigError(format!("invalid accept language: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Visible text of an HTML document: non-content subtrees dropped, lines
/// trimmed, blank lines removed.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        raw.push_str(text);
        raw.push('\n');
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cuts `text` to `max_chars` characters and appends [`TRUNCATION_MARKER`].
/// Returns whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}{}", &text[..cut], TRUNCATION_MARKER), true),
        None => (text.to_string(), false),
    }
}

fn failure_text(err: &Error, url: &str) -> String {
    match err {
        Error::TimeoutError(_) => format!("Fetch timed out: {}", url),
        Error::HttpStatusError { status, .. } => format!("HTTP error {} - URL: {}", status, url),
        Error::ConnectError(_) => format!("Connection error: could not connect to {}", url),
        other => format!("Fetch error: {} - URL: {}", other, url),
    }
}

fn failed_page(url: String, title: String, err: &Error) -> ScrapedPage {
    warn!(url = %url, error = %err, "page fetch failed");
    ScrapedPage {
        content: failure_text(err, &url),
        url,
        title,
        truncated: false,
        failed: true,
    }
}

async fn fetch_page(
    source: Arc<dyn PageSource + Send + Sync>,
    target: FetchTarget,
    max_chars: usize,
) -> ScrapedPage {
    let FetchTarget { url, title } = target;

    let extracted = match source.get_html(&url).await {
        // scraper's DOM is not Send, so parsing stays inside one blocking task
        Ok(html) => tokio::task::spawn_blocking(move || extract_text(&html))
            .await
            .map_err(Error::from),
        Err(err) => Err(err),
    };

    match extracted {
        Ok(text) => {
            let (content, truncated) = truncate_chars(&text, max_chars);
            debug!(url = %url, chars = text.chars().count(), truncated, "page fetched");
            ScrapedPage {
                url,
                title,
                content,
                truncated,
                failed: false,
            }
        }
        Err(err) => failed_page(url, title, &err),
    }
}

/// Fetches all targets with at most `max_concurrency` requests in flight.
/// Pages come back in completion order, one per target, even when a task panics.
pub async fn fetch_many(
    source: Arc<dyn PageSource + Send + Sync>,
    targets: Vec<FetchTarget>,
    max_concurrency: usize,
    max_chars: usize,
) -> Vec<ScrapedPage> {
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::with_capacity(targets.len());

    for target in targets {
        let source = source.clone();
        let permits = permits.clone();
        let attempted = target.clone();
        let handle = tasks.spawn(async move {
            // the semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            fetch_page(source, target, max_chars).await
        });
        pending.insert(handle.id(), attempted);
    }

    let mut pages = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, page)) => {
                pending.remove(&id);
                pages.push(page);
            }
            Err(err) => {
                if let Some(FetchTarget { url, title }) = pending.remove(&err.id()) {
                    pages.push(failed_page(url, title, &Error::TaskJoinError(err)));
                }
            }
        }
    }
    pages
}
