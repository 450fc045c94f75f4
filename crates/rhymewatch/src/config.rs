use std::env;
use std::time::Duration;

use analysis_orchestrator::PipelineConfig;
use anyhow::{Context, Result};
use ml_engine::{FeatureConfig, ForestConfig, DEFAULT_SMOOTHING_WINDOW};
use news_aggregator::{AggregationPolicy, AggregatorConfig};
use news_sources::NewsSourceConfig;
use sentiment_analysis::ScorerBackend;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // News providers
    pub newsapi_key: Option<String>,
    pub finnhub_key: Option<String>,
    pub aggregation_policy: AggregationPolicy,
    pub source_timeout_secs: u64,

    // Sentiment scoring (lexicon when unset)
    pub ml_sentiment_url: Option<String>,

    // Model
    pub smoothing_window: usize,     // 3, 0 disables
    pub forest_trees: usize,         // 100
    pub forest_max_depth: usize,     // 5
    pub forest_seed: u64,            // 0
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            newsapi_key: get("NEWSAPI_KEY"),
            finnhub_key: get("FINNHUB_KEY"),
            aggregation_policy: get("AGGREGATION_POLICY")
                .map(|v| v.parse())
                .transpose()
                .context("AGGREGATION_POLICY")?
                .unwrap_or_default(),
            source_timeout_secs: get("SOURCE_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("SOURCE_TIMEOUT_SECS must be a whole number of seconds")?,

            ml_sentiment_url: get("ML_SENTIMENT_URL"),

            smoothing_window: get("SMOOTHING_WINDOW")
                .unwrap_or_else(|| DEFAULT_SMOOTHING_WINDOW.to_string())
                .parse()
                .context("SMOOTHING_WINDOW must be a non-negative integer")?,
            forest_trees: get("FOREST_TREES")
                .unwrap_or_else(|| "100".to_string())
                .parse()
                .context("FOREST_TREES must be a positive integer")?,
            forest_max_depth: get("FOREST_MAX_DEPTH")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("FOREST_MAX_DEPTH must be a non-negative integer")?,
            forest_seed: get("FOREST_SEED")
                .unwrap_or_else(|| "0".to_string())
                .parse()
                .context("FOREST_SEED must be a non-negative integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.source_timeout_secs == 0 {
            anyhow::bail!("SOURCE_TIMEOUT_SECS must be at least 1");
        }
        if self.forest_trees == 0 {
            anyhow::bail!("FOREST_TREES must be at least 1");
        }
        // Range-checks the window.
        self.feature_config()?;
        Ok(())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn news_sources(&self) -> NewsSourceConfig {
        NewsSourceConfig {
            request_timeout: self.source_timeout(),
            ..NewsSourceConfig::with_keys(self.newsapi_key.clone(), self.finnhub_key.clone())
        }
    }

    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            policy: self.aggregation_policy,
            source_timeout: self.source_timeout(),
        }
    }

    pub fn scorer_backend(&self) -> ScorerBackend {
        ScorerBackend::from_service_url(self.ml_sentiment_url.clone(), Duration::from_secs(30))
    }

    pub fn feature_config(&self) -> Result<FeatureConfig> {
        Ok(FeatureConfig::with_smoothing(self.smoothing_window)?)
    }

    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.forest_trees,
            max_depth: self.forest_max_depth,
            seed: self.forest_seed,
            ..Default::default()
        }
    }

    pub fn pipeline(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            features: self.feature_config()?,
            forest: self.forest_config(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.newsapi_key, None);
        assert_eq!(config.aggregation_policy, AggregationPolicy::FirstSuccess);
        assert_eq!(config.source_timeout(), Duration::from_secs(10));
        assert_eq!(config.scorer_backend(), ScorerBackend::Lexicon);
        assert_eq!(config.forest_config(), ForestConfig::default());

        let pipeline = config.pipeline().unwrap();
        assert_eq!(pipeline.features.smoothing_window, Some(DEFAULT_SMOOTHING_WINDOW));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("NEWSAPI_KEY", "abc"),
            ("FINNHUB_KEY", "  "),
            ("AGGREGATION_POLICY", "union-merge"),
            ("SOURCE_TIMEOUT_SECS", "4"),
            ("ML_SENTIMENT_URL", "http://localhost:8001"),
            ("SMOOTHING_WINDOW", "0"),
            ("FOREST_TREES", "25"),
            ("FOREST_SEED", "42"),
        ])
        .unwrap();

        assert_eq!(config.newsapi_key.as_deref(), Some("abc"));
        assert_eq!(config.finnhub_key, None);
        assert_eq!(config.aggregator().policy, AggregationPolicy::UnionMerge);
        assert_eq!(config.news_sources().request_timeout, Duration::from_secs(4));
        assert!(matches!(config.scorer_backend(), ScorerBackend::FinBert { .. }));
        assert_eq!(config.feature_config().unwrap().smoothing_window, None);

        let forest = config.forest_config();
        assert_eq!(forest.n_trees, 25);
        assert_eq!(forest.seed, 42);
        assert_eq!(forest.max_depth, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("AGGREGATION_POLICY", "round-robin")]).is_err());
        assert!(config_from(&[("SOURCE_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("SOURCE_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("SMOOTHING_WINDOW", "9")]).is_err());
        assert!(config_from(&[("FOREST_TREES", "0")]).is_err());
    }
}
