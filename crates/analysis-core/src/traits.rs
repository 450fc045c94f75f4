use async_trait::async_trait;

use crate::{AnalysisError, DateWindow, Headline, PricePoint, SentimentLabel};

/// A news provider adapter.
///
/// `fetch` never fails: transport, auth and quota problems are logged inside
/// the adapter and surface as an empty result.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Short provider name, used as `Headline::source` and in logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, symbol: &str, window: &DateWindow) -> Vec<Headline>;
}

/// Maps headline texts to labels. The output must be parallel to the input
/// (same length, same order).
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentLabel>, AnalysisError>;

    fn backend_name(&self) -> &'static str;
}

/// Daily close series for a symbol, oldest first.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn daily_closes(
        &self,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<Vec<PricePoint>, AnalysisError>;
}
