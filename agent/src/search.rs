use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One ranked hit as returned by the search API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

#[async_trait]
pub trait WebSearch {
    /// Results in relevance order. An empty vec means "nothing found"; `Err`
    /// means the search itself failed.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>>;
}

/// Locale sent with every query.
#[derive(Clone, Debug)]
pub struct SearchLocale {
    pub search_lang: String,
    pub country: String,
    pub loc_country: String,
    pub accept_language: String,
}

impl Default for SearchLocale {
    fn default() -> Self {
        Self {
            search_lang: "jp".to_string(),
            country: "jp".to_string(),
            loc_country: "JP".to_string(),
            accept_language: "ja-JP,ja;q=0.9".to_string(),
        }
    }
}

pub struct BraveSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    locale: SearchLocale,
}

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

impl BraveSearch {
    pub fn new(endpoint: String, api_key: String, locale: SearchLocale) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            locale,
        })
    }

    fn request(&self, query: &str, count: usize) -> reqwest::RequestBuilder {
        self.client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("Accept-Encoding", "gzip")
            .header("Accept-Language", &self.locale.accept_language)
            .header("X-Loc-Country", &self.locale.loc_country)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query),
                ("search_lang", self.locale.search_lang.as_str()),
                ("country", self.locale.country.as_str()),
                ("count", count.to_string().as_str()),
            ])
    }
}

#[derive(Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<SearchResult>,
}

pub(crate) fn parse_results(body: &str) -> Result<Vec<SearchResult>> {
    let response: BraveResponse = serde_json::from_str(body)
        .map_err(|e| Error::ProtocolError(format!("malformed search response: {}", e)))?;
    Ok(response.web.map(|web| web.results).unwrap_or_default())
}

#[async_trait]
impl WebSearch for BraveSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>> {
        let response = self.request(query, count).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatusError {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body = response.text().await?;
        let results = parse_results(&body)?;
        debug!(query, count = results.len(), "search returned");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::{BraveSearch, SearchLocale, SearchResult, WebSearch, parse_results};
    use crate::{Error, Result};

    #[test]
    fn test_request_shape() -> Result<()> {
        let client = BraveSearch::new(
            "https://search.example/res/v1/web/search".to_string(),
            "secret".to_string(),
            SearchLocale::default(),
        )?;

        let request = client.request("rust async", 7).build()?;

        let pairs: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "rust async".to_string()),
                ("search_lang".to_string(), "jp".to_string()),
                ("country".to_string(), "jp".to_string()),
                ("count".to_string(), "7".to_string()),
            ]
        );

        let headers = request.headers();
        assert_eq!(headers["X-Subscription-Token"], "secret");
        assert_eq!(headers["X-Loc-Country"], "JP");
        assert_eq!(headers["Accept-Language"], "ja-JP,ja;q=0.9");
        assert_eq!(headers["Accept"], "application/json");

        Ok(())
    }

    #[test]
    fn test_parse_results() -> Result<()> {
        let body = r#"{
            "type": "search",
            "web": {
                "results": [
                    {"title": "A", "description": "first", "url": "https://a.example", "age": "1d"},
                    {"title": "B", "url": "https://b.example"}
                ]
            }
        }"#;

        let results = parse_results(body)?;
        assert_eq!(
            results,
            vec![
                SearchResult {
                    title: "A".to_string(),
                    description: "first".to_string(),
                    url: "https://a.example".to_string(),
                },
                SearchResult {
                    title: "B".to_string(),
                    description: String::new(),
                    url: "https://b.example".to_string(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_missing_results_is_empty() -> Result<()> {
        assert!(parse_results(r#"{"type": "search"}"#)?.is_empty());
        assert!(parse_results(r#"{"web": {}}"#)?.is_empty());
        assert!(parse_results(r#"{"web": {"results": []}}"#)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            parse_results("<html>rate limited</html>"),
            Err(Error::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_port_is_connect_error() -> Result<()> {
        let client = BraveSearch::new(
            "http://127.0.0.1:9/res/v1/web/search".to_string(),
            "secret".to_string(),
            SearchLocale::default(),
        )?;

        let err = client.search("rust", 5).await.unwrap_err();
        assert!(matches!(err, Error::ConnectError(_)), "got {:?}", err);
        Ok(())
    }
}
