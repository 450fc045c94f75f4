//! Binary classification tree with weighted Gini splits.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Class index 0 is "down" (`false`), 1 is "up" (`true`).
pub type ClassProbs = [f64; 2];

#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; all when `None`.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        probs: ClassProbs,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Training view shared by every node of one tree.
struct TrainingSet<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [bool],
    class_weights: ClassProbs,
}

impl TrainingSet<'_> {
    fn weight(&self, sample: usize) -> (usize, f64) {
        let class = self.labels[sample] as usize;
        (class, self.class_weights[class])
    }

    fn class_totals(&self, samples: &[usize]) -> ClassProbs {
        samples.iter().fold([0.0, 0.0], |mut totals, &s| {
            let (class, w) = self.weight(s);
            totals[class] += w;
            totals
        })
    }
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    /// Grow a tree over `samples` (row indices, repeats allowed for
    /// bootstrap draws). Each occurrence counts with its class weight.
    pub fn fit(
        features: &[Vec<f64>],
        labels: &[bool],
        samples: &[usize],
        class_weights: ClassProbs,
        config: &TreeConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let data = TrainingSet {
            features,
            labels,
            class_weights,
        };
        let root = grow(&data, samples, 0, config, rng);
        Self { root }
    }

    pub fn predict_proba(&self, row: &[f64]) -> ClassProbs {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { probs } => return *probs,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

fn gini(totals: &ClassProbs) -> f64 {
    let sum = totals[0] + totals[1];
    if sum <= 0.0 {
        return 0.0;
    }
    1.0 - totals.iter().map(|t| (t / sum).powi(2)).sum::<f64>()
}

fn leaf(totals: ClassProbs) -> Node {
    let sum = totals[0] + totals[1];
    let probs = if sum > 0.0 {
        [totals[0] / sum, totals[1] / sum]
    } else {
        [0.5, 0.5]
    };
    Node::Leaf { probs }
}

fn grow(
    data: &TrainingSet<'_>,
    samples: &[usize],
    depth: usize,
    config: &TreeConfig,
    rng: &mut ChaCha8Rng,
) -> Node {
    let totals = data.class_totals(samples);
    let impurity = gini(&totals);

    if depth >= config.max_depth || samples.len() < config.min_samples_split || impurity < 1e-12 {
        return leaf(totals);
    }

    let Some(split) = best_split(data, samples, &totals, impurity, config, rng) else {
        return leaf(totals);
    };

    let (left, right): (Vec<usize>, Vec<usize>) = samples
        .iter()
        .partition(|&&s| data.features[s][split.feature] <= split.threshold);

    tracing::trace!(
        "depth {} split on feature {} at {:.4} (gain {:.4})",
        depth,
        split.feature,
        split.threshold,
        split.gain
    );

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow(data, &left, depth + 1, config, rng)),
        right: Box::new(grow(data, &right, depth + 1, config, rng)),
    }
}

fn best_split(
    data: &TrainingSet<'_>,
    samples: &[usize],
    totals: &ClassProbs,
    parent_impurity: f64,
    config: &TreeConfig,
    rng: &mut ChaCha8Rng,
) -> Option<BestSplit> {
    let n_features = data.features.first().map(|r| r.len()).unwrap_or(0);
    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);
    candidates.truncate(config.max_features.unwrap_or(n_features).max(1));

    let parent_weight = totals[0] + totals[1];
    let mut best: Option<BestSplit> = None;

    for feature in candidates {
        let mut ordered: Vec<usize> = samples.to_vec();
        ordered.sort_by(|&a, &b| data.features[a][feature].total_cmp(&data.features[b][feature]));

        let mut left_totals: ClassProbs = [0.0, 0.0];
        for i in 0..ordered.len().saturating_sub(1) {
            let (class, w) = data.weight(ordered[i]);
            left_totals[class] += w;

            let here = data.features[ordered[i]][feature];
            let next = data.features[ordered[i + 1]][feature];
            if here == next {
                continue;
            }

            let left_count = i + 1;
            let right_count = ordered.len() - left_count;
            if left_count < config.min_samples_leaf || right_count < config.min_samples_leaf {
                continue;
            }

            let right_totals = [totals[0] - left_totals[0], totals[1] - left_totals[1]];
            let left_weight = left_totals[0] + left_totals[1];
            let right_weight = right_totals[0] + right_totals[1];
            let child_impurity = (left_weight * gini(&left_totals)
                + right_weight * gini(&right_totals))
                / parent_weight;
            let gain = parent_impurity - child_impurity;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
