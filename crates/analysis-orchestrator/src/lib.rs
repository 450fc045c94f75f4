use std::sync::Arc;

use analysis_core::{
    AnalysisError, DailySentiment, DateWindow, DirectionCall, PricePoint, PriceSource,
    ScoredHeadline, SentimentCounts, SentimentLabel, SentimentScorer,
};
use chrono::NaiveDate;
use ml_engine::{
    daily_sentiment, DirectionPredictor, FeatureBuilder, FeatureConfig, FeatureDiagnostics,
    ForestConfig,
};
use news_aggregator::HeadlineAggregator;
use sentiment_analysis::label_headlines;
use serde::{Deserialize, Serialize};


pub const DEFAULT_LOOKBACK_DAYS: u32 = 60;
pub const MAX_LOOKBACK_DAYS: u32 = 365;
const MAX_SYMBOL_LEN: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    pub forest: ForestConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineEntry {
    pub text: String,
    pub date: NaiveDate,
    pub sentiment: SentimentLabel,
    pub source: String,
}

impl From<&ScoredHeadline> for HeadlineEntry {
    fn from(scored: &ScoredHeadline) -> Self {
        Self {
            text: scored.headline.text().to_string(),
            date: scored.date(),
            sentiment: scored.sentiment,
            source: scored.headline.source().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySentimentEntry {
    pub date: NaiveDate,
    pub avg_score: f64,
    pub count: usize,
}

impl From<&DailySentiment> for DailySentimentEntry {
    fn from(day: &DailySentiment) -> Self {
        Self {
            date: day.date,
            avg_score: day.average_score,
            count: day.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: Option<f64>,
}

impl From<&PricePoint> for PriceEntry {
    fn from(point: &PricePoint) -> Self {
        Self {
            date: point.date,
            close: point.close,
            volume: point.volume,
        }
    }
}

/// Both fields are `null` when no prediction could be made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: Option<bool>,
    pub confidence: Option<f64>,
}

impl From<DirectionCall> for Prediction {
    fn from(call: DirectionCall) -> Self {
        Self {
            direction: Some(call.direction),
            confidence: Some(call.confidence),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDiagnostics {
    pub features: FeatureDiagnostics,
    pub training_rows: Option<usize>,
    pub holdout_accuracy: Option<f64>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub symbol: String,
    pub window: DateWindow,
    pub headlines: Vec<HeadlineEntry>,
    pub sentiment_counts: SentimentCounts,
    pub daily_sentiment: Vec<DailySentimentEntry>,
    pub price_history: Vec<PriceEntry>,
    pub prediction: Prediction,
    pub total_headlines: usize,
    /// Why parts of the report are missing, if any are.
    pub notices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diagnostics: Option<ModelDiagnostics>,
}

impl AnalysisReport {
    fn empty(symbol: String, window: DateWindow) -> Self {
        Self {
            symbol,
            window,
            headlines: Vec::new(),
            sentiment_counts: SentimentCounts::default(),
            daily_sentiment: Vec::new(),
            price_history: Vec::new(),
            prediction: Prediction::default(),
            total_headlines: 0,
            notices: Vec::new(),
            diagnostics: None,
        }
    }

    pub fn has_headlines(&self) -> bool {
        self.total_headlines > 0
    }

    pub fn has_prediction(&self) -> bool {
        self.prediction.direction.is_some()
    }
}

/// Trim, uppercase and check a ticker symbol.
pub fn normalize_symbol(raw: &str) -> Result<String, AnalysisError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
        return Err(AnalysisError::InvalidInput(format!(
            "symbol must be 1 to {} characters, got '{}'",
            MAX_SYMBOL_LEN, raw
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
    {
        return Err(AnalysisError::InvalidInput(format!(
            "symbol '{}' contains unsupported characters",
            raw
        )));
    }
    Ok(symbol)
}

pub fn validate_days(days: u32) -> Result<u32, AnalysisError> {
    if days == 0 || days > MAX_LOOKBACK_DAYS {
        return Err(AnalysisError::InvalidInput(format!(
            "days must be between 1 and {}, got {}",
            MAX_LOOKBACK_DAYS, days
        )));
    }
    Ok(days)
}

/// fetch → normalize → dedupe → score → build features → train → predict.
pub struct AnalysisPipeline {
    aggregator: HeadlineAggregator,
    scorer: Arc<dyn SentimentScorer>,
    prices: Arc<dyn PriceSource>,
    features: FeatureBuilder,
    predictor: DirectionPredictor,
}

impl AnalysisPipeline {
    pub fn new(
        aggregator: HeadlineAggregator,
        scorer: Arc<dyn SentimentScorer>,
        prices: Arc<dyn PriceSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            aggregator,
            scorer,
            prices,
            features: FeatureBuilder::new(config.features),
            predictor: DirectionPredictor::new(config.forest),
        }
    }

    /// Analyze the `days` days up to and including today (UTC).
    ///
    /// Missing prices or too little history degrade the report (see
    /// `notices`); zero headlines give an empty report. Only invalid input,
    /// a scorer that cannot load, or broken internal invariants are errors.
    pub async fn analyze(&self, symbol: &str, days: u32) -> Result<AnalysisReport, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        let days = validate_days(days)?;
        let window = DateWindow::trailing(self.aggregator.clock().today(), days);

        tracing::info!(
            "Starting analysis for {} ({} to {}, {} days)",
            symbol,
            window.start,
            window.end,
            days
        );

        let headlines = self.aggregator.get_headlines(&symbol, &window).await;
        if headlines.is_empty() {
            tracing::info!("No headlines found for {}", symbol);
            let mut report = AnalysisReport::empty(symbol.clone(), window);
            report
                .notices
                .push(AnalysisError::NoDataFound(format!("no news found for {}", symbol)).to_string());
            return Ok(report);
        }

        let scored = label_headlines(self.scorer.as_ref(), headlines).await?;
        let daily = daily_sentiment(&scored);

        let mut report = AnalysisReport::empty(symbol.clone(), window);
        report.sentiment_counts = SentimentCounts::tally(&scored);
        report.total_headlines = scored.len();
        report.headlines = scored.iter().map(HeadlineEntry::from).collect();
        report.daily_sentiment = daily.iter().map(DailySentimentEntry::from).collect();

        let prices = match self.prices.daily_closes(&symbol, &window).await {
            Ok(prices) => prices,
            Err(e) if e.is_degradable() => {
                tracing::warn!("Price history unavailable for {}: {}", symbol, e);
                report.notices.push(format!("prediction unavailable: {}", e));
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        report.price_history = prices.iter().map(PriceEntry::from).collect();

        let feature_set = match self.features.build_from_daily(&daily, &prices) {
            Ok(set) => set,
            Err(e) if e.is_degradable() => {
                report.notices.push(format!("prediction unavailable: {}", e));
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        let mut diagnostics = ModelDiagnostics {
            features: feature_set.diagnostics,
            training_rows: None,
            holdout_accuracy: None,
        };

        // Forest training is CPU-bound; keep it off the async workers.
        let predictor = self.predictor.clone();
        let forecast = tokio::task::spawn_blocking(move || predictor.forecast(&feature_set))
            .await
            .map_err(|e| AnalysisError::AlignmentError(format!("training task failed: {}", e)))?;

        match forecast {
            Ok((model, call)) => {
                diagnostics.training_rows = Some(model.training_rows());
                diagnostics.holdout_accuracy = model.holdout_accuracy();
                report.prediction = call.into();
            }
            Err(e) if e.is_degradable() => {
                report.notices.push(format!("prediction unavailable: {}", e));
            }
            Err(e) => return Err(e),
        }
        report.diagnostics = Some(diagnostics);

        tracing::info!(
            "Analysis for {} complete: {} headlines, {} price points, prediction {:?}",
            report.symbol,
            report.total_headlines,
            report.price_history.len(),
            report.prediction.direction
        );
        Ok(report)
    }
}
