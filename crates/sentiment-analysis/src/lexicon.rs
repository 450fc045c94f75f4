use std::collections::HashSet;

use analysis_core::{AnalysisError, SentimentLabel, SentimentScorer};
use async_trait::async_trait;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "rallies", "surge", "surges", "gain", "gains", "profit", "growth",
    "beat", "beats", "upgrade", "outperform", "strong", "positive", "rise", "rises",
    "increase", "breakthrough", "innovation", "success", "exceed", "exceeds", "momentum",
    "buy", "recommend", "optimistic", "record", "high", "advance", "soars", "climbs",
    // Financial-specific terms
    "dividend", "buyback", "repurchase", "accretive", "upside", "recovery", "rebound",
    "expansion", "robust", "accelerating", "overweight", "raised", "upgraded", "outpacing",
    "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "declines", "loss", "losses", "fall", "falls", "plunge", "plunges",
    "crash", "miss", "misses", "downgrade", "underperform", "weak", "negative", "drop",
    "drops", "decrease", "concern", "risk", "fail", "disappoint", "slump", "sell", "warning",
    "warns", "pessimistic", "low", "retreat", "fear", "trouble", "slips", "tumbles",
    // Financial-specific terms
    "dilution", "dilutive", "headwind", "lawsuit", "litigation", "recall", "investigation",
    "probe", "default", "bankruptcy", "restructuring", "layoff", "layoffs", "downside",
    "overvalued", "bubble", "underweight", "lowered", "suspended",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't",
    "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly", "barely", "neither",
    "nor", "without",
];

/// A sentiment word is flipped when a negation appears this many words before it.
const NEGATION_WINDOW: usize = 3;

/// Offline keyword scorer. Used when no model service is configured.
pub struct LexiconScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Net keyword score; positive words add one, negative words subtract
    /// one, and a nearby negation flips the sign.
    pub fn score_text(&self, text: &str) -> i32 {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '"'))
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut score = 0;
        for (i, word) in words.iter().enumerate() {
            let polarity = if self.positive.contains(*word) {
                1
            } else if self.negative.contains(*word) {
                -1
            } else {
                continue;
            };

            let negated = negation_positions
                .iter()
                .any(|&neg| neg < i && i - neg <= NEGATION_WINDOW);

            score += if negated { -polarity } else { polarity };
        }
        score
    }

    pub fn label(&self, text: &str) -> SentimentLabel {
        match self.score_text(text) {
            s if s > 0 => SentimentLabel::Positive,
            s if s < 0 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    async fn classify(&self, texts: &[String]) -> Result<Vec<SentimentLabel>, AnalysisError> {
        Ok(texts.iter().map(|t| self.label(t)).collect())
    }

    fn backend_name(&self) -> &'static str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_polarity() {
        let scorer = LexiconScorer::new();
        assert_eq!(scorer.label("Apple stock surges on strong earnings beat"), SentimentLabel::Positive);
        assert_eq!(scorer.label("Tesla plunges after weak guidance"), SentimentLabel::Negative);
        assert_eq!(scorer.label("Apple to hold annual meeting in March"), SentimentLabel::Neutral);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = LexiconScorer::new();
        assert_eq!(scorer.score_text("growth"), 1);
        assert_eq!(scorer.score_text("no growth expected"), -1);
        assert_eq!(scorer.score_text("not a crash"), 1);
        // Outside the window the negation no longer applies.
        assert_eq!(scorer.score_text("not that we expected any real growth"), 1);
    }

    #[tokio::test]
    async fn test_classify_is_parallel_to_input() {
        let scorer = LexiconScorer::new();
        let texts = vec![
            "Shares rally".to_string(),
            "Earnings call scheduled".to_string(),
            "Analyst downgrade".to_string(),
        ];
        let labels = scorer.classify(&texts).await.unwrap();
        assert_eq!(
            labels,
            vec![SentimentLabel::Positive, SentimentLabel::Neutral, SentimentLabel::Negative]
        );
    }
}
