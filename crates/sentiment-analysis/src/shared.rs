use std::sync::Arc;
use std::time::Duration;

use analysis_core::{AnalysisError, SentimentLabel, SentimentScorer};
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::{FinBertScorer, LexiconScorer};

/// Builds the underlying scorer. Called at most once per successful load.
#[async_trait]
pub trait ScorerLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn SentimentScorer>, AnalysisError>;
}

/// Which scorer to construct on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScorerBackend {
    Lexicon,
    FinBert { base_url: String, timeout: Duration },
}

impl ScorerBackend {
    /// FinBERT when a service URL is configured, the lexicon otherwise.
    pub fn from_service_url(url: Option<String>, timeout: Duration) -> Self {
        match url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            Some(base_url) => ScorerBackend::FinBert { base_url, timeout },
            None => ScorerBackend::Lexicon,
        }
    }
}

#[async_trait]
impl ScorerLoader for ScorerBackend {
    async fn load(&self) -> Result<Arc<dyn SentimentScorer>, AnalysisError> {
        match self {
            ScorerBackend::Lexicon => Ok(Arc::new(LexiconScorer::new())),
            ScorerBackend::FinBert { base_url, timeout } => {
                let scorer = FinBertScorer::connect(base_url.clone(), *timeout).await?;
                Ok(Arc::new(scorer))
            }
        }
    }
}

/// Process-wide scorer that is constructed lazily on the first request.
///
/// Concurrent first callers wait on a single initialization. A failed load
/// leaves the cell empty, so the request fails with `ScorerUnavailable` and
/// the next one tries again. Once loaded the scorer is never replaced.
pub struct SharedScorer {
    loader: Arc<dyn ScorerLoader>,
    cell: OnceCell<Arc<dyn SentimentScorer>>,
}

impl SharedScorer {
    pub fn new(loader: Arc<dyn ScorerLoader>) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    pub fn from_backend(backend: ScorerBackend) -> Self {
        Self::new(Arc::new(backend))
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<dyn SentimentScorer>, AnalysisError> {
        let scorer = self
            .cell
            .get_or_try_init(|| async {
                tracing::info!("Loading sentiment scorer");
                self.loader.load().await.map_err(|e| match e {
                    AnalysisError::ScorerUnavailable(_) => e,
                    other => AnalysisError::ScorerUnavailable(other.to_string()),
                })
            })
            .await
            .map_err(|e| {
                tracing::warn!("Sentiment scorer failed to load: {}", e);
                e
            })?;
        Ok(Arc::clone(scorer))
    }
}

#[async_trait]
impl SentimentScorer for SharedScorer {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentLabel>, AnalysisError> {
        self.get().await?.classify(texts).await
    }

    fn backend_name(&self) -> &'static str {
        self.cell
            .get()
            .map(|scorer| scorer.backend_name())
            .unwrap_or("unloaded")
    }
}
