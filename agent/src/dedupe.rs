use crate::search::SearchResult;
use std::collections::HashSet;

/// URLs already handed downstream during one research run. Only grows.
#[derive(Clone, Debug, Default)]
pub struct SeenUrls(HashSet<String>);

impl SeenUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, url: &str) -> bool {
        self.0.insert(url.to_string())
    }
}

/// Keeps the results whose URL has not been seen yet, in their original
/// ranking order, and records each accepted URL before looking at the next.
/// Results without a URL are dropped.
pub fn dedupe(raw: Vec<SearchResult>, seen: &mut SeenUrls) -> Vec<SearchResult> {
    raw.into_iter()
        .filter(|result| !result.url.is_empty() && seen.insert(&result.url))
        .collect()
}
