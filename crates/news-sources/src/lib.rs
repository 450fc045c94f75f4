//! News provider adapters.
//!
//! Every adapter implements [`analysis_core::NewsSource`] and degrades to an
//! empty result on any failure:
//! - NewsAPI `/v2/everything`: keyed, date-ranged search
//! - Finnhub `company-news`: keyed, epoch timestamps
//! - Google News RSS: keyless, capped at a 30 day lookback

use std::sync::Arc;
use std::time::Duration;

use analysis_core::{AnalysisError, Headline, NewsSource};
use reqwest::Client;

pub mod finnhub;
pub mod google_rss;
pub mod newsapi;

pub use finnhub::FinnhubClient;
pub use google_rss::GoogleNewsRssClient;
pub use newsapi::NewsApiClient;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; RhymeWatch/1.0)";

/// Credentials and transport settings for the adapters. Built once by the
/// caller and handed to each adapter; adapters never read the environment.
#[derive(Debug, Clone)]
pub struct NewsSourceConfig {
    pub newsapi_key: Option<String>,
    pub finnhub_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for NewsSourceConfig {
    fn default() -> Self {
        Self {
            newsapi_key: None,
            finnhub_key: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl NewsSourceConfig {
    /// Blank keys are treated the same as missing ones.
    pub fn with_keys(newsapi_key: Option<String>, finnhub_key: Option<String>) -> Self {
        Self {
            newsapi_key: non_blank(newsapi_key),
            finnhub_key: non_blank(finnhub_key),
            ..Default::default()
        }
    }
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// All adapters in fallback priority order: NewsAPI, Finnhub, Google RSS.
pub fn default_sources(config: &NewsSourceConfig) -> Vec<Arc<dyn NewsSource>> {
    vec![
        Arc::new(NewsApiClient::new(config)),
        Arc::new(FinnhubClient::new(config)),
        Arc::new(GoogleNewsRssClient::new(config)),
    ]
}

pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Turn an adapter's internal result into the never-failing boundary value.
pub(crate) fn absorb(
    source: &'static str,
    symbol: &str,
    result: Result<Vec<Headline>, AnalysisError>,
) -> Vec<Headline> {
    match result {
        Ok(headlines) => {
            tracing::debug!("{} returned {} headlines for {}", source, headlines.len(), symbol);
            headlines
        }
        Err(e) => {
            tracing::warn!("{} degraded to empty result for {}: {}", source, symbol, e);
            Vec::new()
        }
    }
}

pub(crate) async fn send(
    source: &'static str,
    builder: reqwest::RequestBuilder,
) -> Result<reqwest::Response, AnalysisError> {
    builder.send().await.map_err(|e| {
        if e.is_timeout() {
            AnalysisError::upstream(source, "request timed out")
        } else {
            AnalysisError::upstream(source, e.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keys_are_absent() {
        let config = NewsSourceConfig::with_keys(Some("  ".to_string()), Some("abc ".to_string()));
        assert!(config.newsapi_key.is_none());
        assert_eq!(config.finnhub_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_default_sources_priority_order() {
        let sources = default_sources(&NewsSourceConfig::default());
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["newsapi", "finnhub", "google_rss"]);
    }

    #[test]
    fn test_absorb_swallows_errors() {
        let failed = absorb("newsapi", "AAPL", Err(AnalysisError::upstream("newsapi", "boom")));
        assert!(failed.is_empty());

        let ok = absorb(
            "newsapi",
            "AAPL",
            Ok(vec![Headline::new("Apple rallies", "2024-07-05", "newsapi")]),
        );
        assert_eq!(ok.len(), 1);
    }
}
