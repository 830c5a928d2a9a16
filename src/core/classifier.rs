use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::features::interest_similarity;
use crate::models::{Profile, ProfileInsights};

/// Number of entries in the pairwise feature vector
pub const FEATURE_COUNT: usize = 5;

/// Age gap substituted when either age is unavailable
const DEFAULT_AGE_GAP: f64 = 10.0;

const BOOSTING_ROUNDS: usize = 50;
const LEARNING_RATE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("training set is empty")]
    EmptySet,
    #[error("shape mismatch: {0} feature rows vs {1} labels")]
    ShapeMismatch(usize, usize),
    #[error("inconsistent feature width at row {0}")]
    RaggedFeatures(usize),
}

/// Pairwise feature vector in the fixed order the classifier was trained on:
/// age gap, interest Jaccard, activity delta, completeness delta, cluster
/// equality.
pub fn feature_vector(
    user: &Profile,
    user_insights: &ProfileInsights,
    candidate: &Profile,
    candidate_insights: &ProfileInsights,
) -> Vec<f64> {
    let age_gap = match (user.age, candidate.age) {
        (Some(a), Some(b)) => (i16::from(a) - i16::from(b)).unsigned_abs() as f64,
        _ => DEFAULT_AGE_GAP,
    };

    let same_cluster = user_insights.cluster >= 0
        && candidate_insights.cluster >= 0
        && user_insights.cluster == candidate_insights.cluster;

    vec![
        age_gap,
        interest_similarity(&user.interests, &candidate.interests),
        (user_insights.activity_score - candidate_insights.activity_score).abs(),
        (user_insights.profile_completeness - candidate_insights.profile_completeness).abs(),
        if same_cluster { 1.0 } else { 0.0 },
    ]
}

/// Zero-mean / unit-variance feature scaling, fit once at training time
///
/// The stored parameters are applied verbatim at inference; the scaler is
/// never refit per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows[0].len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut stds = vec![0.0; width];
        for row in rows {
            for ((std, value), mean) in stds.iter_mut().zip(row).zip(&means) {
                *std += (value - mean) * (value - mean);
            }
        }
        for std in &mut stds {
            *std = (*std / n).sqrt();
            if *std < 1e-12 {
                *std = 1.0;
            }
        }

        Self { means, stds }
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(value, (mean, std))| (value - mean) / std)
            .collect()
    }

    fn width(&self) -> usize {
        self.means.len()
    }
}

/// One depth-1 regression tree of the boosted ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature: usize,
    threshold: f64,
    left: f64,
    right: f64,
}

impl Stump {
    fn value(&self, row: &[f64]) -> f64 {
        if row[self.feature] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// Fitted classifier state: scaler plus boosted-stump ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedClassifier {
    scaler: StandardScaler,
    base_score: f64,
    stumps: Vec<Stump>,
}

/// Learned binary match classifier
///
/// Gradient-boosted decision stumps under logistic loss. Fitting is fully
/// deterministic. An unfitted classifier predicts neutral zeroes and never
/// raises, so callers can fall back to the deterministic aggregator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchClassifier {
    fitted: Option<FittedClassifier>,
}

impl MatchClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fitted(fitted: FittedClassifier) -> Self {
        Self {
            fitted: Some(fitted),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted_state(&self) -> Option<&FittedClassifier> {
        self.fitted.as_ref()
    }

    /// Fit the scaler and ensemble on labeled pairs
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<(), ClassifierError> {
        if features.is_empty() {
            return Err(ClassifierError::EmptySet);
        }
        if features.len() != labels.len() {
            return Err(ClassifierError::ShapeMismatch(features.len(), labels.len()));
        }
        let width = features[0].len();
        if let Some(row) = features.iter().position(|r| r.len() != width) {
            return Err(ClassifierError::RaggedFeatures(row));
        }

        let scaler = StandardScaler::fit(features);
        let scaled: Vec<Vec<f64>> = features.iter().map(|row| scaler.transform(row)).collect();

        let positives = labels.iter().filter(|&&l| l).count() as f64;
        let prior = (positives / labels.len() as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut raw: Vec<f64> = vec![base_score; labels.len()];
        let mut stumps = Vec::with_capacity(BOOSTING_ROUNDS);

        for _ in 0..BOOSTING_ROUNDS {
            let probabilities: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residuals: Vec<f64> = labels
                .iter()
                .zip(&probabilities)
                .map(|(&label, &p)| if label { 1.0 - p } else { -p })
                .collect();

            let Some(stump) = best_stump(&scaled, &residuals, &probabilities) else {
                break;
            };

            for (value, row) in raw.iter_mut().zip(&scaled) {
                *value += stump.value(row);
            }
            stumps.push(stump);
        }

        self.fitted = Some(FittedClassifier {
            scaler,
            base_score,
            stumps,
        });
        Ok(())
    }

    /// Positive-class probabilities, one per input row
    ///
    /// Unfitted state or a feature-width mismatch yields an all-zero vector
    /// of the input length; the condition is logged, never propagated.
    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Vec<f64> {
        let Some(fitted) = &self.fitted else {
            tracing::warn!("match classifier is not fitted, returning neutral predictions");
            return vec![0.0; features.len()];
        };

        if features
            .iter()
            .any(|row| row.len() != fitted.scaler.width())
        {
            tracing::warn!(
                expected = fitted.scaler.width(),
                "feature width mismatch, returning neutral predictions"
            );
            return vec![0.0; features.len()];
        }

        features
            .iter()
            .map(|row| {
                let scaled = fitted.scaler.transform(row);
                let raw = fitted.base_score
                    + fitted
                        .stumps
                        .iter()
                        .map(|stump| stump.value(&scaled))
                        .sum::<f64>();
                sigmoid(raw)
            })
            .collect()
    }

    /// Binary labels at the 0.5 probability threshold
    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<bool> {
        self.predict_proba(features)
            .into_iter()
            .map(|p| p >= 0.5)
            .collect()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Exhaustive best-split search over features and threshold midpoints
fn best_stump(rows: &[Vec<f64>], residuals: &[f64], probabilities: &[f64]) -> Option<Stump> {
    let width = rows[0].len();
    let mut best: Option<(f64, Stump)> = None;

    for feature in 0..width {
        let mut values: Vec<f64> = rows.iter().map(|row| row[feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;

            let mut left_residual = 0.0;
            let mut left_hessian = 0.0;
            let mut right_residual = 0.0;
            let mut right_hessian = 0.0;

            for ((row, &residual), &p) in rows.iter().zip(residuals).zip(probabilities) {
                let hessian = (p * (1.0 - p)).max(1e-12);
                if row[feature] <= threshold {
                    left_residual += residual;
                    left_hessian += hessian;
                } else {
                    right_residual += residual;
                    right_hessian += hessian;
                }
            }

            // Newton gain: larger is better
            let gain = left_residual * left_residual / left_hessian
                + right_residual * right_residual / right_hessian;

            if best.as_ref().map_or(true, |(b, _)| gain > *b) {
                best = Some((
                    gain,
                    Stump {
                        feature,
                        threshold,
                        left: LEARNING_RATE * (left_residual / left_hessian),
                        right: LEARNING_RATE * (right_residual / right_hessian),
                    },
                ));
            }
        }
    }

    best.map(|(_, stump)| stump)
}
