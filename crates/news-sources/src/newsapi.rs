use analysis_core::{AnalysisError, DateWindow, Headline, NewsSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{absorb, http_client, send, NewsSourceConfig};

const BASE_URL: &str = "https://newsapi.org/v2/everything";
const SOURCE: &str = "newsapi";

/// Error codes NewsAPI uses for plan and quota limits. These mean "no
/// results today", not a broken integration.
const QUOTA_CODES: &[&str] = &["rateLimited", "maximumResultsReached", "parameterInvalid"];

/// NewsAPI `/v2/everything` search. Disabled when no key is configured.
pub struct NewsApiClient {
    api_key: Option<String>,
    client: Client,
}

impl NewsApiClient {
    pub fn new(config: &NewsSourceConfig) -> Self {
        Self {
            api_key: config.newsapi_key.clone(),
            client: http_client(config.request_timeout),
        }
    }

    async fn search(
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
                ("q", symbol),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("language", "en"),
                ("pageSize", "100"),
                ("sortBy", "publishedAt"),
                ("apiKey", api_key),
            ]),
        )
        .await?;

        // NewsAPI reports errors in the JSON body for 4xx as well, so read it
        // before looking at the status.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::upstream(SOURCE, e.to_string()))?;

        if status.as_u16() == 429 {
            tracing::info!("NewsAPI rate limit reached, returning no headlines");
            return Ok(Vec::new());
        }

        parse_everything_response(&body)
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, symbol: &str, window: &DateWindow) -> Vec<Headline> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("NewsAPI key not configured, skipping");
            return Vec::new();
        };
        absorb(SOURCE, symbol, self.search(api_key, symbol, window).await)
    }
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

pub(crate) fn parse_everything_response(body: &str) -> Result<Vec<Headline>, AnalysisError> {
    let response: EverythingResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::upstream(SOURCE, format!("unreadable response: {}", e)))?;

    if response.status != "ok" {
        let code = response.code.unwrap_or_default();
        let message = response.message.unwrap_or_default();
        if QUOTA_CODES.contains(&code.as_str()) || message.to_lowercase().contains("upgrade") {
            tracing::info!("NewsAPI plan limit ({}): {}", code, message);
            return Ok(Vec::new());
        }
        return Err(AnalysisError::upstream(SOURCE, format!("{}: {}", code, message)));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|a| {
            let title = a.title?.trim().to_string();
            // Deleted articles keep a placeholder title.
            if title.is_empty() || title == "[Removed]" {
                return None;
            }
            Some(Headline::new(title, a.published_at?, SOURCE))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_articles() {
        let body = r#"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {"title": "Apple beats earnings expectations", "publishedAt": "2024-07-05T14:30:00Z"},
                {"title": "[Removed]", "publishedAt": "2024-07-04T10:00:00Z"},
                {"title": null, "publishedAt": "2024-07-04T10:00:00Z"},
                {"title": "Apple supplier warns on demand", "publishedAt": "2024-07-03T08:15:00Z"}
            ]
        }"#;

        let headlines = parse_everything_response(body).unwrap();
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].text, "Apple beats earnings expectations");
        assert_eq!(headlines[0].published_at, "2024-07-05T14:30:00Z");
        assert_eq!(headlines[0].source, "newsapi");
    }

    #[test]
    fn test_plan_limit_is_zero_results() {
        let body = r#"{
            "status": "error",
            "code": "parameterInvalid",
            "message": "You are trying to request results too far in the past. Your plan permits you to request articles as far back as 2024-06-05. To extend this please upgrade to a paid plan."
        }"#;
        assert!(parse_everything_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_key_is_upstream_error() {
        let body = r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid."}"#;
        let err = parse_everything_response(body).unwrap_err();
        assert!(matches!(err, AnalysisError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn test_garbage_body_is_upstream_error() {
        assert!(parse_everything_response("<html>bad gateway</html>").is_err());
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let client = NewsApiClient::new(&NewsSourceConfig::default());
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(),
        )
        .unwrap();
        assert!(client.fetch("AAPL", &window).await.is_empty());
    }
}
