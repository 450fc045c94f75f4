use analysis_core::{AnalysisError, DateWindow, Headline, NewsSource};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::Client;

use crate::{absorb, http_client, send, NewsSourceConfig};

const BASE_URL: &str = "https://news.google.com/rss/search";
const SOURCE: &str = "google_rss";

/// Google's `when:` operator stops being useful past a month.
const MAX_FEED_DAYS: i64 = 30;

/// Google News search feed. Keyless, so it is always available as the last
/// fallback.
pub struct GoogleNewsRssClient {
    client: Client,
}

impl GoogleNewsRssClient {
    pub fn new(config: &NewsSourceConfig) -> Self {
        Self {
            client: http_client(config.request_timeout),
        }
    }

    async fn search(&self, symbol: &str, window: &DateWindow) -> Result<Vec<Headline>, AnalysisError> {
        let days = feed_days(window);
        let query = build_query(symbol, days);

        let response = send(
            SOURCE,
            self.client.get(BASE_URL).query(&[
                ("q", query.as_str()),
                ("hl", "en-US"),
                ("gl", "US"),
                ("ceid", "US:en"),
            ]),
        )
        .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::upstream(
                SOURCE,
                format!("feed returned status {}", response.status()),
            ));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::upstream(SOURCE, e.to_string()))?;

        let cutoff = window
            .end
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(window.start);
        parse_feed(&content, cutoff)
    }
}

#[async_trait]
impl NewsSource for GoogleNewsRssClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, symbol: &str, window: &DateWindow) -> Vec<Headline> {
        absorb(SOURCE, symbol, self.search(symbol, window).await)
    }
}

fn feed_days(window: &DateWindow) -> i64 {
    window.span_days().clamp(1, MAX_FEED_DAYS)
}

fn build_query(symbol: &str, days: i64) -> String {
    format!("{} stock when:{}d", symbol, days)
}

/// Parse an RSS 2.0 document. Items with an RFC 2822 `pubDate` older than
/// `cutoff` are dropped and the rest are rewritten to RFC 3339; other date
/// strings pass through untouched for the normalizer to deal with.
pub(crate) fn parse_feed(content: &[u8], cutoff: NaiveDate) -> Result<Vec<Headline>, AnalysisError> {
    let channel = rss::Channel::read_from(content)
        .map_err(|e| AnalysisError::upstream(SOURCE, format!("unreadable feed: {}", e)))?;

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            if title.is_empty() {
                return None;
            }
            let raw_date = item.pub_date()?.trim();

            let published_at = match DateTime::parse_from_rfc2822(raw_date) {
                Ok(dt) => {
                    let utc = dt.with_timezone(&Utc);
                    if utc.date_naive() < cutoff {
                        return None;
                    }
                    utc.to_rfc3339()
                }
                Err(_) => raw_date.to_string(),
            };
            Some(Headline::new(title, published_at, SOURCE))
        })
        .collect())
}
