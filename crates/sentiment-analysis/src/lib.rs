//! Headline sentiment: scorer backends, the lazily loaded process-wide
//! scorer, and the step that attaches labels to normalized headlines.

use analysis_core::{
    AnalysisError, NormalizedHeadline, ScoredHeadline, SentimentLabel, SentimentScorer,
};

pub mod finbert;
pub mod lexicon;
pub mod shared;

pub use finbert::FinBertScorer;
pub use lexicon::LexiconScorer;
pub use shared::{ScorerBackend, ScorerLoader, SharedScorer};

/// Label every headline in one scorer call and pair each label with its
/// headline.
///
/// An empty scorer response for a non-empty batch labels everything neutral.
/// Any other length mismatch is an `AlignmentError`.
pub async fn label_headlines(
    scorer: &dyn SentimentScorer,
    headlines: Vec<NormalizedHeadline>,
) -> Result<Vec<ScoredHeadline>, AnalysisError> {
    if headlines.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = headlines.iter().map(|h| h.text().to_string()).collect();
    let mut labels = scorer.classify(&texts).await?;

    if labels.is_empty() {
        tracing::warn!(
            "{} scorer returned no labels for {} headlines, defaulting to neutral",
            scorer.backend_name(),
            headlines.len()
        );
        labels = vec![SentimentLabel::Neutral; headlines.len()];
    }

    if labels.len() != headlines.len() {
        return Err(AnalysisError::AlignmentError(format!(
            "{} scorer returned {} labels for {} headlines",
            scorer.backend_name(),
            labels.len(),
            headlines.len()
        )));
    }

    Ok(headlines
        .into_iter()
        .zip(labels)
        .map(|(headline, sentiment)| ScoredHeadline { headline, sentiment })
        .collect())
}
