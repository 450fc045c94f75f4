use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw headline as produced by a news source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub text: String,
    /// Timestamp exactly as the provider reported it (or as the adapter
    /// rendered it, e.g. epoch seconds converted to RFC 3339).
    pub published_at: String,
    pub source: String,
}

impl Headline {
    pub fn new(
        text: impl Into<String>,
        published_at: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            published_at: published_at.into(),
            source: source.into(),
        }
    }
}

/// Headline with its publication time resolved to a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHeadline {
    pub headline: Headline,
    pub date: NaiveDate,
}

impl NormalizedHeadline {
    pub fn text(&self) -> &str {
        &self.headline.text
    }

    pub fn source(&self) -> &str {
        &self.headline.source
    }
}

/// Three-way label assigned by the sentiment scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Numeric mapping used for daily aggregation.
    pub fn to_score(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => -1.0,
        }
    }

    /// Decode a classifier's raw label. Only known spellings are accepted;
    /// callers decide what to do with `None`.
    ///
    /// `label_0/1/2` follow the FinBERT id2label order (positive, negative, neutral).
    pub fn decode(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "bullish" | "label_0" => Some(SentimentLabel::Positive),
            "negative" | "neg" | "bearish" | "label_1" => Some(SentimentLabel::Negative),
            "neutral" | "neu" | "label_2" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

/// A normalized headline together with its label. This is the only record
/// that flows past the scorer, so text, date and label cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHeadline {
    pub headline: NormalizedHeadline,
    pub sentiment: SentimentLabel,
}

impl ScoredHeadline {
    pub fn date(&self) -> NaiveDate {
        self.headline.date
    }
}

/// Label counts over a set of scored headlines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn tally(headlines: &[ScoredHeadline]) -> Self {
        headlines
            .iter()
            .fold(SentimentCounts::default(), |mut counts, h| {
                match h.sentiment {
                    SentimentLabel::Positive => counts.positive += 1,
                    SentimentLabel::Neutral => counts.neutral += 1,
                    SentimentLabel::Negative => counts.negative += 1,
                }
                counts
            })
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

/// Mean sentiment for one calendar date. `count` is always at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub average_score: f64,
    pub count: usize,
}

/// Daily close from the market-data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            volume: None,
        }
    }
}

/// One trading day of classifier input. `label` is `None` only for the most
/// recent row, which is the prediction target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub features: Vec<f64>,
    pub label: Option<bool>,
}

/// Next-day direction call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionCall {
    /// `true` = close expected to rise.
    pub direction: bool,
    /// Maximum class probability, in [0.5, 1.0].
    pub confidence: f64,
}
