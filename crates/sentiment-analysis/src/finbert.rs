use std::time::Duration;

use analysis_core::{AnalysisError, SentimentLabel, SentimentScorer};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    texts: &'a [String],
    symbol: Option<String>,
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
}

/// Client for a FinBERT-style model service (`POST /predict`,
/// `GET /health`).
pub struct FinBertScorer {
    client: Client,
    base_url: String,
}

impl FinBertScorer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the client and confirm the service answers its health check.
    pub async fn connect(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AnalysisError> {
        let scorer = Self::new(base_url, timeout);
        scorer.health().await?;
        tracing::info!("Sentiment service ready at {}", scorer.base_url);
        Ok(scorer)
    }

    pub async fn health(&self) -> Result<(), AnalysisError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| AnalysisError::ScorerUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::ScorerUnavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SentimentScorer for FinBertScorer {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentLabel>, AnalysisError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = PredictRequest {
            texts,
            symbol: None,
            use_cache: true,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::ScorerUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::ScorerUnavailable(format!(
                "predict returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::ScorerUnavailable(e.to_string()))?;

        decode_predictions(&body)
    }

    fn backend_name(&self) -> &'static str {
        "finbert"
    }
}

/// Decode a `/predict` body. Unknown label spellings become neutral.
pub(crate) fn decode_predictions(body: &str) -> Result<Vec<SentimentLabel>, AnalysisError> {
    let response: PredictResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::ScorerUnavailable(format!("unreadable response: {}", e)))?;

    Ok(response
        .predictions
        .iter()
        .map(|p| {
            SentimentLabel::decode(&p.label).unwrap_or_else(|| {
                tracing::warn!("Unrecognized sentiment label '{}', treating as neutral", p.label);
                SentimentLabel::Neutral
            })
        })
        .collect())
}
