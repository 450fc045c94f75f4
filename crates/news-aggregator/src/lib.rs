use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{
    AnalysisError, DateNormalizer, DateWindow, Headline, NewsSource, NormalizedHeadline,
    ReferenceClock,
};
use futures_util::future::join_all;
use news_sources::{default_sources, NewsSourceConfig};
use serde::{Deserialize, Serialize};

/// How the adapters are combined. Fixed per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Try adapters in priority order, stop at the first non-empty result.
    #[default]
    FirstSuccess,
    /// Query every adapter concurrently and merge.
    UnionMerge,
}

impl FromStr for AggregationPolicy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first-success" | "first_success" | "fallback" => Ok(AggregationPolicy::FirstSuccess),
            "union-merge" | "union_merge" | "merge" => Ok(AggregationPolicy::UnionMerge),
            other => Err(AnalysisError::InvalidInput(format!(
                "unknown aggregation policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub policy: AggregationPolicy,
    /// Per-adapter bound under union-merge.
    pub source_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            policy: AggregationPolicy::default(),
            source_timeout: Duration::from_secs(10),
        }
    }
}

/// A raw headline tagged with where it came from, for stable ordering.
struct Candidate {
    priority: usize,
    position: usize,
    headline: Headline,
}

/// Runs the fallback chain (or merge) across news adapters and returns a
/// deduplicated, window-filtered, newest-first headline list.
pub struct HeadlineAggregator {
    sources: Vec<Arc<dyn NewsSource>>,
    config: AggregatorConfig,
    clock: ReferenceClock,
}

impl HeadlineAggregator {
    /// `sources` must already be in priority order.
    pub fn new(sources: Vec<Arc<dyn NewsSource>>, config: AggregatorConfig) -> Self {
        Self {
            sources,
            config,
            clock: ReferenceClock::SystemUtc,
        }
    }

    /// Aggregator over the stock NewsAPI → Finnhub → Google RSS chain.
    pub fn with_default_sources(source_config: &NewsSourceConfig, config: AggregatorConfig) -> Self {
        Self::new(default_sources(source_config), config)
    }

    pub fn with_clock(mut self, clock: ReferenceClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.config.policy
    }

    pub fn clock(&self) -> ReferenceClock {
        self.clock
    }

    pub async fn get_headlines(&self, symbol: &str, window: &DateWindow) -> Vec<NormalizedHeadline> {
        let candidates = match self.config.policy {
            AggregationPolicy::FirstSuccess => self.first_success(symbol, window).await,
            AggregationPolicy::UnionMerge => self.union_merge(symbol, window).await,
        };

        let headlines = consolidate(candidates, window, &DateNormalizer::from_clock(&self.clock));
        tracing::info!(
            "Aggregated {} headlines for {} ({} to {}, {:?})",
            headlines.len(),
            symbol,
            window.start,
            window.end,
            self.config.policy
        );
        headlines
    }

    async fn first_success(&self, symbol: &str, window: &DateWindow) -> Vec<Candidate> {
        for (priority, source) in self.sources.iter().enumerate() {
            let fetched = source.fetch(symbol, window).await;
            if !fetched.is_empty() {
                tracing::debug!("{} satisfied the request for {}", source.name(), symbol);
                return tag(priority, fetched);
            }
            tracing::debug!("{} returned nothing for {}, falling back", source.name(), symbol);
        }
        Vec::new()
    }

    async fn union_merge(&self, symbol: &str, window: &DateWindow) -> Vec<Candidate> {
        let timeout = self.config.source_timeout;
        let calls = self.sources.iter().map(|source| async move {
            match tokio::time::timeout(timeout, source.fetch(symbol, window)).await {
                Ok(fetched) => fetched,
                Err(_) => {
                    tracing::warn!(
                        "{}",
                        AnalysisError::upstream(
                            source.name(),
                            format!("no response within {:?}", timeout)
                        )
                    );
                    Vec::new()
                }
            }
        });

        // join_all keeps input order, so results line up with priority.
        join_all(calls)
            .await
            .into_iter()
            .enumerate()
            .flat_map(|(priority, fetched)| tag(priority, fetched))
            .collect()
    }
}

fn tag(priority: usize, headlines: Vec<Headline>) -> Vec<Candidate> {
    headlines
        .into_iter()
        .enumerate()
        .map(|(position, headline)| Candidate {
            priority,
            position,
            headline,
        })
        .collect()
}

/// Normalize, drop blanks, dedupe on exact text (first wins), window-filter,
/// then order newest-first with priority and original position as tie-breaks.
fn consolidate(
    candidates: Vec<Candidate>,
    window: &DateWindow,
    normalizer: &DateNormalizer,
) -> Vec<NormalizedHeadline> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<(usize, usize, NormalizedHeadline)> = Vec::new();

    for candidate in candidates {
        let Some(date) = normalizer.parse(&candidate.headline.published_at) else {
            tracing::debug!(
                "Dropping headline with unparseable date '{}' from {}",
                candidate.headline.published_at,
                candidate.headline.source
            );
            continue;
        };

        if candidate.headline.text.trim().is_empty() {
            continue;
        }

        if !seen.insert(candidate.headline.text.clone()) {
            continue;
        }

        if !window.contains(date) {
            continue;
        }

        kept.push((
            candidate.priority,
            candidate.position,
            NormalizedHeadline {
                headline: candidate.headline,
                date,
            },
        ));
    }

    kept.sort_by(|a, b| {
        b.2.date
            .cmp(&a.2.date)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });

    kept.into_iter().map(|(_, _, headline)| headline).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(date(2024, 7, 1), date(2024, 7, 10)).unwrap()
    }

    struct FakeSource {
        name: &'static str,
        headlines: Vec<(&'static str, &'static str)>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(name: &'static str, headlines: Vec<(&'static str, &'static str)>) -> Arc<Self> {
            Arc::new(Self {
                name,
                headlines,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                headlines: vec![("Slow headline", "2024-07-05")],
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl NewsSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _symbol: &str, _window: &DateWindow) -> Vec<Headline> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.headlines
                .iter()
                .map(|(text, ts)| Headline::new(*text, *ts, self.name))
                .collect()
        }
    }

    fn aggregator(sources: Vec<Arc<dyn NewsSource>>, policy: AggregationPolicy) -> HeadlineAggregator {
        HeadlineAggregator::new(
            sources,
            AggregatorConfig {
                policy,
                source_timeout: Duration::from_millis(200),
            },
        )
        .with_clock(ReferenceClock::Fixed(date(2024, 7, 10)))
    }

    #[tokio::test]
    async fn test_first_success_stops_at_first_non_empty() {
        let empty = FakeSource::new("newsapi", vec![]);
        let finnhub = FakeSource::new("finnhub", vec![("Apple gains", "2024-07-05")]);
        let google = FakeSource::new("google_rss", vec![("Apple slips", "2024-07-06")]);

        let agg = aggregator(
            vec![empty.clone(), finnhub.clone(), google.clone()],
            AggregationPolicy::FirstSuccess,
        );
        let headlines = agg.get_headlines("AAPL", &window()).await;

        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].source(), "finnhub");
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(google.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_union_merge_dedupes_keeping_priority_date() {
        let newsapi = FakeSource::new("newsapi", vec![("Apple beats estimates", "2024-07-05")]);
        let google = FakeSource::new(
            "google_rss",
            vec![("Apple beats estimates", "2024-07-07"), ("Apple hires", "2024-07-06")],
        );

        let agg = aggregator(vec![newsapi, google], AggregationPolicy::UnionMerge);
        let headlines = agg.get_headlines("AAPL", &window()).await;

        assert_eq!(headlines.len(), 2);
        let beat = headlines
            .iter()
            .find(|h| h.text() == "Apple beats estimates")
            .unwrap();
        assert_eq!(beat.date, date(2024, 7, 5));
        assert_eq!(beat.source(), "newsapi");
    }

    #[tokio::test]
    async fn test_window_filter_and_unparseable_dates() {
        let source = FakeSource::new(
            "newsapi",
            vec![
                ("Inside start", "2024-07-01"),
                ("Inside end", "2024-07-10"),
                ("Too old", "2024-06-30"),
                ("Future", "2024-07-11"),
                ("No date", "N/A"),
                ("   ", "2024-07-03"),
            ],
        );

        let agg = aggregator(vec![source], AggregationPolicy::FirstSuccess);
        let headlines = agg.get_headlines("AAPL", &window()).await;
        let texts: Vec<&str> = headlines.iter().map(|h| h.text()).collect();
        assert_eq!(texts, vec!["Inside end", "Inside start"]);
    }

    #[tokio::test]
    async fn test_newest_first_with_priority_tie_break() {
        let newsapi = FakeSource::new(
            "newsapi",
            vec![("A1", "2024-07-03"), ("A2", "2024-07-05"), ("A3", "2024-07-05")],
        );
        let finnhub = FakeSource::new("finnhub", vec![("B1", "2024-07-05"), ("B2", "2024-07-08")]);

        let agg = aggregator(vec![newsapi, finnhub], AggregationPolicy::UnionMerge);
        let headlines = agg.get_headlines("AAPL", &window()).await;
        let texts: Vec<&str> = headlines.iter().map(|h| h.text()).collect();
        assert_eq!(texts, vec!["B2", "A2", "A3", "B1", "A1"]);
    }

    #[tokio::test]
    async fn test_relative_dates_use_reference_clock() {
        let source = FakeSource::new("google_rss", vec![("Apple today", "3 hours ago"), ("Apple earlier", "2 days ago")]);
        let agg = aggregator(vec![source], AggregationPolicy::FirstSuccess);
        let headlines = agg.get_headlines("AAPL", &window()).await;

        assert_eq!(headlines[0].date, date(2024, 7, 10));
        assert_eq!(headlines[1].date, date(2024, 7, 8));
    }

    #[tokio::test]
    async fn test_all_sources_empty() {
        let agg = aggregator(
            vec![FakeSource::new("newsapi", vec![]), FakeSource::new("finnhub", vec![])],
            AggregationPolicy::UnionMerge,
        );
        assert!(agg.get_headlines("AAPL", &window()).await.is_empty());
    }

    #[tokio::test]
    async fn test_slow_source_does_not_block_others() {
        let slow = FakeSource::slow("newsapi", Duration::from_secs(5));
        let fast = FakeSource::new("finnhub", vec![("Fast headline", "2024-07-04")]);

        let agg = aggregator(vec![slow, fast], AggregationPolicy::UnionMerge);
        let headlines = agg.get_headlines("AAPL", &window()).await;

        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].text(), "Fast headline");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("first-success".parse::<AggregationPolicy>().unwrap(), AggregationPolicy::FirstSuccess);
        assert_eq!("UNION-MERGE".parse::<AggregationPolicy>().unwrap(), AggregationPolicy::UnionMerge);
        assert!("random".parse::<AggregationPolicy>().is_err());
    }
}
