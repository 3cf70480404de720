// Population-relative scoring.
//
// An engine is fitted once per comparison population and reused for every
// entity scored against it. Raw z-scores are unbounded and outlier-heavy
// for presentation, so each one is squashed through tanh into (-10, 10):
// near-linear close to the mean, symmetric at the extremes, and monotonic,
// so rank order per statistic is preserved. Scores from different
// populations are never comparable.

use serde::Serialize;
use thiserror::Error;

/// Guards the z-score division when a statistic has near-zero variance. A
/// zero-variance statistic then saturates to ±10, which is intentional.
const VARIANCE_EPSILON: f64 = 1e-7;

#[derive(Debug, Error)]
pub enum ScoreError {
    /// A vector's length does not match the population's statistic list.
    /// Never silently truncated or padded.
    #[error("entity vector has {actual} statistics, population defines {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot fit a scoring engine on an empty population")]
    EmptyPopulation,
}

/// Per-statistic scores for one entity, in the engine's statistic order,
/// plus their sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub per_stat: Vec<f64>,
    pub aggregate: f64,
}

/// Mean/std of one population over a fixed, ordered statistic list.
///
/// Holds no mutable state after construction; one engine may be shared
/// read-only across concurrent scoring calls for the same population.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    names: Vec<String>,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl ScoringEngine {
    /// Fit mean and population standard deviation (N denominator: the
    /// population *is* the comparison universe, not a sample of one) per
    /// statistic index over the sample.
    pub fn fit(names: Vec<String>, sample: &[Vec<f64>]) -> Result<Self, ScoreError> {
        if sample.is_empty() {
            return Err(ScoreError::EmptyPopulation);
        }
        let width = names.len();
        for row in sample {
            if row.len() != width {
                return Err(ScoreError::DimensionMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
        }

        let n = sample.len() as f64;
        let mut mean = vec![0.0; width];
        for row in sample {
            for (i, x) in row.iter().enumerate() {
                mean[i] += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut std = vec![0.0; width];
        for row in sample {
            for (i, x) in row.iter().enumerate() {
                std[i] += (x - mean[i]).powi(2);
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
        }

        Ok(Self { names, mean, std })
    }

    /// Statistic names, in scoring order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    /// Score one entity's statistics against the fitted population:
    /// z = (x - mean) / (std + ε), score = round(tanh(z) × 10, 2 decimals),
    /// aggregate = sum of the per-statistic scores (not averaged).
    pub fn score(&self, values: &[f64]) -> Result<ScoreCard, ScoreError> {
        if values.len() != self.names.len() {
            return Err(ScoreError::DimensionMismatch {
                expected: self.names.len(),
                actual: values.len(),
            });
        }
        let per_stat: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let z = (x - self.mean[i]) / (self.std[i] + VARIANCE_EPSILON);
                round2(z.tanh() * 10.0)
            })
            .collect();
        let aggregate = round2(per_stat.iter().sum());
        Ok(ScoreCard { per_stat, aggregate })
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
