use analysis_core::{AnalysisError, DateWindow, Headline, NewsSource};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;

use crate::{absorb, http_client, send, NewsSourceConfig};

const BASE_URL: &str = "https://finnhub.io/api/v1/company-news";
const SOURCE: &str = "finnhub";

/// Finnhub company news. Timestamps arrive as epoch seconds and are
/// rendered as RFC 3339 UTC.
pub struct FinnhubClient {
    api_key: Option<String>,
    client: Client,
}

impl FinnhubClient {
    pub fn new(config: &NewsSourceConfig) -> Self {
        Self {
            api_key: config.finnhub_key.clone(),
            client: http_client(config.request_timeout),
        }
    }

    async fn company_news(
        &self,
        api_key: &str,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<Vec<Headline>, AnalysisError> {
        let from = window.start.format("%Y-%m-%d").to_string();
        let to = window.end.format("%Y-%m-%d").to_string();

        let response = send(
            SOURCE,
            self.client.get(BASE_URL).query(&[
                ("symbol", symbol),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", api_key),
            ]),
        )
        .await?;

        let status = response.status().as_u16();
        if status == 429 {
            tracing::info!("Finnhub rate limit reached, returning no headlines");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::upstream(SOURCE, e.to_string()))?;

        parse_company_news(&body)
    }
}

#[async_trait]
impl NewsSource for FinnhubClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, symbol: &str, window: &DateWindow) -> Vec<Headline> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("Finnhub key not configured, skipping");
            return Vec::new();
        };
        absorb(SOURCE, symbol, self.company_news(api_key, symbol, window).await)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompanyNewsResponse {
    Articles(Vec<Article>),
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    datetime: i64,
}

pub(crate) fn parse_company_news(body: &str) -> Result<Vec<Headline>, AnalysisError> {
    let response: CompanyNewsResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::upstream(SOURCE, format!("unreadable response: {}", e)))?;

    let articles = match response {
        CompanyNewsResponse::Articles(articles) => articles,
        CompanyNewsResponse::Error { error } => {
            // Premium-only endpoints answer "You don't have access to this resource."
            if error.to_lowercase().contains("access") {
                tracing::info!("Finnhub plan limit: {}", error);
                return Ok(Vec::new());
            }
            return Err(AnalysisError::upstream(SOURCE, error));
        }
    };

    Ok(articles
        .into_iter()
        .filter_map(|a| {
            let text = a.headline.trim();
            if text.is_empty() || a.datetime <= 0 {
                return None;
            }
            let published = DateTime::from_timestamp(a.datetime, 0)?;
            Some(Headline::new(text, published.to_rfc3339(), SOURCE))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_epoch_seconds_become_rfc3339() {
        let body = r#"[
            {"category": "company", "datetime": 1720189800, "headline": "Apple unveils new chip", "id": 1, "source": "Reuters"},
            {"category": "company", "datetime": 0, "headline": "Undated item", "id": 2},
            {"category": "company", "datetime": 1720000000, "headline": "   ", "id": 3}
        ]"#;

        let headlines = parse_company_news(body).unwrap();
        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].text, "Apple unveils new chip");
        assert_eq!(headlines[0].published_at, "2024-07-05T14:30:00+00:00");
        assert_eq!(headlines[0].source, "finnhub");
    }

    #[test]
    fn test_access_denied_is_zero_results() {
        let body = r#"{"error": "You don't have access to this resource."}"#;
        assert!(parse_company_news(body).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_key_is_upstream_error() {
        let body = r#"{"error": "Invalid API key"}"#;
        assert!(matches!(
            parse_company_news(body),
            Err(AnalysisError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_company_news("[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let client = FinnhubClient::new(&NewsSourceConfig::with_keys(None, Some(String::new())));
        let window = DateWindow::trailing(NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(), 7);
        assert!(client.fetch("AAPL", &window).await.is_empty());
    }
}
