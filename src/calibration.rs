//! Threshold and weight evaluation against human-labeled song pairs.
//!
//! Measures the fuzzy tier only: identifiers are ignored, and pairs with an
//! empty normalized field are always predicted distinct.

use rayon::prelude::*;
use serde::Serialize;

use crate::models::{LabeledPair, MatchWeights, NormalizedIdentity};
use crate::similarity::score_normalized;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, true) => self.false_negatives += 1,
            (false, false) => self.true_negatives += 1,
        }
    }

    /// Share of flagged pairs that really are duplicates. 1.0 when nothing was flagged.
    pub fn precision(&self) -> f64 {
        let flagged = self.true_positives + self.false_positives;
        if flagged == 0 {
            1.0
        } else {
            self.true_positives as f64 / flagged as f64
        }
    }

    /// Share of real duplicates that were flagged. 1.0 when there are none.
    pub fn recall(&self) -> f64 {
        let actual = self.true_positives + self.false_negatives;
        if actual == 0 {
            1.0
        } else {
            self.true_positives as f64 / actual as f64
        }
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdMetrics {
    pub threshold: u8,
    pub weights: MatchWeights,
    pub matrix: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Score every pair once, then tally a confusion matrix per threshold.
pub fn evaluate(
    pairs: &[LabeledPair],
    weights: &MatchWeights,
    thresholds: &[u8],
) -> Vec<ThresholdMetrics> {
    let scored: Vec<(Option<f64>, bool)> = pairs
        .par_iter()
        .map(|pair| {
            let a = NormalizedIdentity::from_song(&pair.a);
            let b = NormalizedIdentity::from_song(&pair.b);
            let score = if a.is_incomplete() || b.is_incomplete() {
                None
            } else {
                Some(score_normalized(&a, &b, weights).combined_score)
            };
            (score, pair.is_duplicate)
        })
        .collect();

    thresholds
        .iter()
        .map(|&threshold| {
            let mut matrix = ConfusionMatrix::default();
            for (score, actual) in &scored {
                let predicted = score.is_some_and(|s| s >= f64::from(threshold));
                matrix.record(predicted, *actual);
            }
            ThresholdMetrics {
                threshold,
                weights: *weights,
                matrix,
                precision: matrix.precision(),
                recall: matrix.recall(),
                f1: matrix.f1(),
            }
        })
        .collect()
}

/// Row with the best F1. Ties prefer the higher threshold (fewer false positives).
pub fn best_by_f1(metrics: &[ThresholdMetrics]) -> Option<&ThresholdMetrics> {
    metrics.iter().max_by(|a, b| {
        a.f1.total_cmp(&b.f1)
            .then_with(|| a.threshold.cmp(&b.threshold))
    })
}
