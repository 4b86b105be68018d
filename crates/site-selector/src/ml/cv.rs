//! K-fold cross-validation scored by R²

use super::{check_training_data, ModelKind};
use crate::{mean, AnalysisError, Result};
use serde::Serialize;
use tracing::debug;

/// Coefficient of determination; a constant target scores 1 when fit exactly, else 0
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let m = mean(y_true);
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - m).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Contiguous, unshuffled folds; the first `n % k` folds get one extra sample
pub fn kfold_ranges(n: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|fold| {
            let len = base + usize::from(fold < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvReport {
    pub fold_scores: Vec<f64>,
    pub mean_r2: f64,
}

/// Train a fresh model per fold and score it on the held-out fold
pub fn cross_val_r2(kind: ModelKind, seed: u64, x: &[Vec<f64>], y: &[f64], folds: usize) -> Result<CvReport> {
    check_training_data(x, y)?;
    if folds < 2 || folds > x.len() {
        return Err(AnalysisError::Model(format!(
            "cannot split {} samples into {} folds",
            x.len(),
            folds
        )));
    }

    let mut fold_scores = Vec::with_capacity(folds);
    for test in kfold_ranges(x.len(), folds) {
        let (train_x, train_y): (Vec<Vec<f64>>, Vec<f64>) = (0..x.len())
            .filter(|i| !test.contains(i))
            .map(|i| (x[i].clone(), y[i]))
            .unzip();

        let mut model = kind.build(seed);
        model.fit(&train_x, &train_y)?;
        let preds = model.predict(&x[test.clone()]);
        fold_scores.push(r2_score(&y[test], &preds));
    }

    let mean_r2 = mean(&fold_scores);
    debug!("   {} fold R²: {:?} (mean {:.3})", kind, fold_scores, mean_r2);
    Ok(CvReport { fold_scores, mean_r2 })
}
