//! Joins per-day sentiment with the close series into classifier rows.

use std::collections::BTreeMap;

use analysis_core::{
    AnalysisError, DailySentiment, FeatureRow, PricePoint, ScoredHeadline,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;
pub const MAX_SMOOTHING_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    /// Trailing average length in trading days. `None` disables smoothing.
    pub smoothing_window: Option<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            smoothing_window: Some(DEFAULT_SMOOTHING_WINDOW),
        }
    }
}

impl FeatureConfig {
    /// `0` disables smoothing; anything above the maximum is rejected.
    pub fn with_smoothing(window: usize) -> Result<Self, AnalysisError> {
        if window > MAX_SMOOTHING_WINDOW {
            return Err(AnalysisError::InvalidInput(format!(
                "smoothing window {} exceeds maximum of {}",
                window, MAX_SMOOTHING_WINDOW
            )));
        }
        Ok(Self {
            smoothing_window: (window > 0).then_some(window),
        })
    }

    pub fn feature_count(&self) -> usize {
        if self.smoothing_window.is_some() {
            2
        } else {
            1
        }
    }
}

/// How well the sentiment days lined up with trading days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDiagnostics {
    pub price_points: usize,
    pub sentiment_days: usize,
    /// Trading days that had at least one headline.
    pub matched_days: usize,
    /// Trading days with no headline, scored 0.0.
    pub defaulted_days: usize,
    /// Headline days that fell on weekends, holidays or outside the price range.
    pub unmatched_sentiment_days: usize,
}

#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// One row per trading day, oldest first. Only the last is unlabeled.
    pub rows: Vec<FeatureRow>,
    pub diagnostics: FeatureDiagnostics,
}

impl FeatureSet {
    /// Labeled rows as parallel feature/target vectors.
    pub fn training_data(&self) -> (Vec<Vec<f64>>, Vec<bool>) {
        self.rows
            .iter()
            .filter_map(|row| row.label.map(|label| (row.features.clone(), label)))
            .unzip()
    }

    /// The most recent trading day, whose next-day move is unknown.
    pub fn prediction_row(&self) -> Option<&FeatureRow> {
        self.rows.last().filter(|row| row.label.is_none())
    }
}

/// Mean label score per calendar date, oldest first.
pub fn daily_sentiment(headlines: &[ScoredHeadline]) -> Vec<DailySentiment> {
    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for headline in headlines {
        let entry = by_date.entry(headline.date()).or_insert((0.0, 0));
        entry.0 += headline.sentiment.to_score();
        entry.1 += 1;
    }

    by_date
        .into_iter()
        .map(|(date, (sum, count))| DailySentiment {
            date,
            average_score: sum / count as f64,
            count,
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn build(
        &self,
        headlines: &[ScoredHeadline],
        prices: &[PricePoint],
    ) -> Result<FeatureSet, AnalysisError> {
        self.build_from_daily(&daily_sentiment(headlines), prices)
    }

    /// Build rows from already aggregated daily sentiment.
    pub fn build_from_daily(
        &self,
        daily: &[DailySentiment],
        prices: &[PricePoint],
    ) -> Result<FeatureSet, AnalysisError> {
        if prices.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "need at least 2 price points, got {}",
                prices.len()
            )));
        }

        let mut series: Vec<&PricePoint> = prices.iter().collect();
        series.sort_by_key(|p| p.date);

        let scores_by_date: BTreeMap<NaiveDate, f64> =
            daily.iter().map(|d| (d.date, d.average_score)).collect();

        let daily_scores: Vec<f64> = series
            .iter()
            .map(|p| scores_by_date.get(&p.date).copied().unwrap_or(0.0))
            .collect();

        let matched_days = series
            .iter()
            .filter(|p| scores_by_date.contains_key(&p.date))
            .count();
        let price_dates: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
        let unmatched_sentiment_days = daily
            .iter()
            .filter(|d| price_dates.binary_search(&d.date).is_err())
            .count();

        let smoothed = self
            .config
            .smoothing_window
            .map(|window| trailing_mean(&daily_scores, window));

        let targets: Vec<bool> = series
            .windows(2)
            .map(|pair| pair[1].close > pair[0].close)
            .collect();

        // Every day except the last gets a target.
        if targets.len() + 1 != daily_scores.len() {
            return Err(AnalysisError::AlignmentError(format!(
                "{} targets for {} feature days",
                targets.len(),
                daily_scores.len()
            )));
        }

        let rows: Vec<FeatureRow> = series
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let mut features = vec![daily_scores[i]];
                if let Some(smoothed) = &smoothed {
                    features.push(smoothed[i]);
                }
                FeatureRow {
                    date: point.date,
                    features,
                    label: targets.get(i).copied(),
                }
            })
            .collect();

        let diagnostics = FeatureDiagnostics {
            price_points: series.len(),
            sentiment_days: daily.len(),
            matched_days,
            defaulted_days: series.len() - matched_days,
            unmatched_sentiment_days,
        };

        tracing::debug!(
            "Built {} feature rows ({} matched, {} defaulted, {} sentiment days off-calendar)",
            rows.len(),
            diagnostics.matched_days,
            diagnostics.defaulted_days,
            diagnostics.unmatched_sentiment_days
        );

        Ok(FeatureSet { rows, diagnostics })
    }
}

/// Mean of the current value and up to `window - 1` predecessors.
fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Headline, NormalizedHeadline, SentimentLabel};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scored(text: &str, day: NaiveDate, sentiment: SentimentLabel) -> ScoredHeadline {
        ScoredHeadline {
            headline: NormalizedHeadline {
                headline: Headline::new(text, day.to_string(), "newsapi"),
                date: day,
            },
            sentiment,
        }
    }

    fn prices(closes: &[(u32, f64)]) -> Vec<PricePoint> {
        closes
            .iter()
            .map(|(d, c)| PricePoint::new(date(2024, 7, *d), *c))
            .collect()
    }

    #[test]
    fn test_daily_sentiment_means() {
        let headlines = vec![
            scored("a", date(2024, 7, 2), SentimentLabel::Positive),
            scored("b", date(2024, 7, 2), SentimentLabel::Negative),
            scored("c", date(2024, 7, 2), SentimentLabel::Positive),
            scored("d", date(2024, 7, 1), SentimentLabel::Neutral),
        ];
        let daily = daily_sentiment(&headlines);

        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, date(2024, 7, 1));
        assert_eq!(daily[0].average_score, 0.0);
        assert_eq!(daily[1].count, 3);
        assert!((daily[1].average_score - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_counts_and_labels() {
        let builder = FeatureBuilder::new(FeatureConfig::with_smoothing(0).unwrap());
        let set = builder
            .build(&[], &prices(&[(1, 10.0), (2, 11.0), (3, 11.0), (5, 9.0)]))
            .unwrap();

        assert_eq!(set.rows.len(), 4);
        let labels: Vec<Option<bool>> = set.rows.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![Some(true), Some(false), Some(false), None]);

        let (features, targets) = set.training_data();
        assert_eq!(features.len(), 3);
        assert_eq!(targets.len(), 3);
        assert_eq!(set.prediction_row().unwrap().date, date(2024, 7, 5));
    }

    #[test]
    fn test_missing_sentiment_defaults_to_zero() {
        let headlines = vec![
            scored("up", date(2024, 7, 1), SentimentLabel::Positive),
            // Saturday: no trading day to land on.
            scored("weekend", date(2024, 7, 6), SentimentLabel::Negative),
        ];
        let builder = FeatureBuilder::new(FeatureConfig::with_smoothing(0).unwrap());
        let set = builder
            .build(&headlines, &prices(&[(1, 10.0), (2, 11.0), (3, 12.0)]))
            .unwrap();

        assert_eq!(set.rows[0].features, vec![1.0]);
        assert_eq!(set.rows[1].features, vec![0.0]);
        assert_eq!(set.diagnostics.matched_days, 1);
        assert_eq!(set.diagnostics.defaulted_days, 2);
        assert_eq!(set.diagnostics.unmatched_sentiment_days, 1);
    }

    #[test]
    fn test_smoothing_uses_available_history() {
        let headlines = vec![
            scored("a", date(2024, 7, 1), SentimentLabel::Positive),
            scored("b", date(2024, 7, 2), SentimentLabel::Negative),
            scored("c", date(2024, 7, 3), SentimentLabel::Positive),
            scored("d", date(2024, 7, 5), SentimentLabel::Positive),
        ];
        let set = FeatureBuilder::default()
            .build(&headlines, &prices(&[(1, 1.0), (2, 2.0), (3, 3.0), (5, 4.0)]))
            .unwrap();

        let smoothed: Vec<f64> = set.rows.iter().map(|r| r.features[1]).collect();
        assert_eq!(smoothed[0], 1.0);
        assert_eq!(smoothed[1], 0.0);
        assert!((smoothed[2] - 1.0 / 3.0).abs() < 1e-12);
        assert!((smoothed[3] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unsorted_prices_are_ordered() {
        let builder = FeatureBuilder::new(FeatureConfig::with_smoothing(0).unwrap());
        let set = builder
            .build(&[], &prices(&[(3, 12.0), (1, 10.0), (2, 9.0)]))
            .unwrap();
        assert_eq!(set.rows[0].date, date(2024, 7, 1));
        assert_eq!(set.rows[0].label, Some(false));
        assert_eq!(set.rows[1].label, Some(true));
    }

    #[test]
    fn test_too_few_prices() {
        let result = FeatureBuilder::default().build(&[], &prices(&[(1, 10.0)]));
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
    }

    #[test]
    fn test_smoothing_window_limits() {
        assert_eq!(FeatureConfig::with_smoothing(0).unwrap().smoothing_window, None);
        assert_eq!(FeatureConfig::with_smoothing(5).unwrap().feature_count(), 2);
        assert!(FeatureConfig::with_smoothing(6).is_err());
    }
}
