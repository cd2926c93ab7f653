use research_agent::search::SearchLocale;
use research_agent::{Error, ResearchConfig, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: String,
    pub endpoint: String,
    pub locale: SearchLocale,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub research: ResearchConfig,
    pub fetch_timeout: Duration,
}

const REQUIRED: &[&str] = &[
    "BRAVE_API_KEY",
    "BRAVE_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_ENDPOINT",
];

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse().map_err(|e| {
                Error::ConfigError(format!("{} has an invalid value {:?}: {}", key, raw, e))
            }),
            None => Ok(default),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`. Fails before anything touches
    /// the network when a required variable is missing or a value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        let missing: Vec<&str> = REQUIRED
            .iter()
            .copied()
            .filter(|key| env.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::ConfigError(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let defaults = ResearchConfig::default();
        let locale = SearchLocale::default();

        Ok(Self {
            search: SearchConfig {
                api_key: env.required("BRAVE_API_KEY"),
                endpoint: env.required("BRAVE_ENDPOINT"),
                locale: SearchLocale {
                    search_lang: env.string_or("DEEPRESEARCH_SEARCH_LANG", &locale.search_lang),
                    country: env.string_or("DEEPRESEARCH_COUNTRY", &locale.country),
                    loc_country: env.string_or("DEEPRESEARCH_LOC_COUNTRY", &locale.loc_country),
                    accept_language: env
                        .string_or("DEEPRESEARCH_ACCEPT_LANGUAGE", &locale.accept_language),
                },
            },
            llm: LlmConfig {
                api_key: env.required("AZURE_OPENAI_API_KEY"),
                endpoint: env.required("AZURE_OPENAI_ENDPOINT"),
                api_version: env.string_or("AZURE_OPENAI_API_VERSION", "2024-02-01"),
                model: env.string_or("DEEPRESEARCH_MODEL", "o1-mini"),
            },
            research: ResearchConfig {
                max_iterations: defaults.max_iterations,
                results_per_search: env
                    .parse_or("DEEPRESEARCH_RESULT_COUNT", defaults.results_per_search)?,
                scrape_pages: env.parse_or("DEEPRESEARCH_SCRAPE_PAGES", defaults.scrape_pages)?,
                max_scrape_pages: env
                    .parse_or("DEEPRESEARCH_MAX_SCRAPE_PAGES", defaults.max_scrape_pages)?,
                max_scrape_chars: env
                    .parse_or("DEEPRESEARCH_MAX_SCRAPE_LENGTH", defaults.max_scrape_chars)?,
                fetch_concurrency: env
                    .parse_or("DEEPRESEARCH_FETCH_CONCURRENCY", defaults.fetch_concurrency)?,
                max_tokens: env.parse_or("DEEPRESEARCH_MAX_TOKENS", defaults.max_tokens)?,
                report_language: env
                    .string_or("DEEPRESEARCH_REPORT_LANGUAGE", &defaults.report_language),
            },
            fetch_timeout: Duration::from_secs(
                env.parse_or("DEEPRESEARCH_FETCH_TIMEOUT_SECS", 10)?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("BRAVE_API_KEY", "brave-key"),
        ("BRAVE_ENDPOINT", "https://api.search.brave.com/res/v1/web/search"),
        ("AZURE_OPENAI_API_KEY", "azure-key"),
        ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(REQUIRED_VARS)).unwrap();

        assert_eq!(config.search.api_key, "brave-key");
        assert_eq!(config.search.locale.country, "jp");
        assert_eq!(config.llm.api_version, "2024-02-01");
        assert_eq!(config.llm.model, "o1-mini");
        assert_eq!(config.research.max_scrape_pages, 3);
        assert_eq!(config.research.max_scrape_chars, 3000);
        assert_eq!(config.research.max_tokens, 65536);
        assert!(config.research.scrape_pages);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED_VARS.to_vec();
        vars.extend([
            ("DEEPRESEARCH_MODEL", "gpt-4o"),
            ("DEEPRESEARCH_COUNTRY", "us"),
            ("DEEPRESEARCH_SCRAPE_PAGES", "false"),
            ("DEEPRESEARCH_MAX_SCRAPE_LENGTH", "100000"),
            ("DEEPRESEARCH_REPORT_LANGUAGE", "English"),
        ]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.search.locale.country, "us");
        assert!(!config.research.scrape_pages);
        assert_eq!(config.research.max_scrape_chars, 100000);
        assert_eq!(config.research.report_language, "English");
    }

    #[test]
    fn test_missing_required_are_all_reported() {
        let err = Config::from_lookup(lookup(&[
            ("BRAVE_API_KEY", "k"),
            ("AZURE_OPENAI_ENDPOINT", "  "),
        ]))
        .unwrap_err()
        .to_string();

        assert_eq!(
            err,
            "Configuration error: missing required environment variables: BRAVE_ENDPOINT, AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT"
        );
    }

    #[test]
    fn test_malformed_number() {
        let mut vars = REQUIRED_VARS.to_vec();
        vars.push(("DEEPRESEARCH_MAX_TOKENS", "lots"));

        let err = Config::from_lookup(lookup(&vars)).unwrap_err().to_string();
        assert!(err.contains("DEEPRESEARCH_MAX_TOKENS"));
    }
}
