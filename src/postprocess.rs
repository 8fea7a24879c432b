//! From ensembled probabilities to the final hypnogram.
//!
//! 1. Keep only epochs that fit wholly inside the raw recording.
//! 2. Permute probability columns into canonical order (if the family has a
//!    permutation).
//! 3. Arg-max each row; the lowest index wins ties.
//! 4. Rewrite labels through the family's remap table, in order.
//!
//! Stage codes: 0 Wake, 1 N1, 2 N2, 3 N3, 5 REM, 6 Artifact.
use ndarray::{s, Array2, Axis};

use crate::config::FamilyConfig;
use crate::error::{Error, Result};

/// Canonical stage names, in probability-column order.
pub const STAGE_NAMES: [&str; 6] = ["Wake", "N1", "N2", "N3", "REM", "Art"];

/// Final result of scoring one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Scoring {
    /// One stage code per epoch.
    pub hypnogram: Vec<u8>,
    /// `[epochs, classes]`, canonical column order.
    pub probabilities: Array2<f32>,
}

impl Scoring {
    pub fn n_epochs(&self) -> usize {
        self.hypnogram.len()
    }
}

/// Keep the first `n_epochs` rows.  Idempotent.
pub fn truncate(probs: Array2<f32>, n_epochs: usize) -> Array2<f32> {
    if probs.nrows() <= n_epochs {
        return probs;
    }
    probs.slice(s![..n_epochs, ..]).to_owned()
}

/// Output column `j` takes input column `perm[j]`.
pub fn permute_columns(probs: &Array2<f32>, perm: &[usize]) -> Result<Array2<f32>> {
    if let Some(&bad) = perm.iter().find(|&&c| c >= probs.ncols()) {
        return Err(Error::ShapeMismatch(format!(
            "class permutation references column {bad} of {}",
            probs.ncols()
        )));
    }
    Ok(probs.select(Axis(1), perm))
}

/// Row-wise arg-max.  NaN never wins; ties go to the lowest index.
pub fn argmax_rows(probs: &Array2<f32>) -> Vec<u8> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_v = f32::NEG_INFINITY;
            for (k, &v) in row.iter().enumerate() {
                if v > best_v {
                    best = k;
                    best_v = v;
                }
            }
            best as u8
        })
        .collect()
}

/// Rewrite labels through `table`, one pair at a time.
pub fn remap_labels(labels: &mut [u8], table: &[(u8, u8)]) {
    for &(from, to) in table {
        for l in labels.iter_mut().filter(|l| **l == from) {
            *l = to;
        }
    }
}

/// Run the full post-processing chain for `family`.
pub fn postprocess(probs: Array2<f32>, n_raw_epochs: usize, family: &FamilyConfig) -> Result<Scoring> {
    let mut probs = truncate(probs, n_raw_epochs);
    if let Some(perm) = &family.class_permutation {
        probs = permute_columns(&probs, perm)?;
    }
    let mut hypnogram = argmax_rows(&probs);
    remap_labels(&mut hypnogram, &family.label_remap);
    Ok(Scoring { hypnogram, probabilities: probs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn one_hot(labels: &[usize], n_classes: usize) -> Array2<f32> {
        Array2::from_shape_fn((labels.len(), n_classes), |(e, k)| if labels[e] == k { 1.0 } else { 0.0 })
    }

    #[test]
    fn truncation_is_idempotent() {
        let probs = Array2::<f32>::ones((12, 5));
        let once = truncate(probs, 9);
        let twice = truncate(once.clone(), 9);
        assert_eq!(once.nrows(), 9);
        assert_eq!(once, twice);
        assert_eq!(truncate(once, 20).nrows(), 9);
    }

    #[test]
    fn psg_remaps_only_four() {
        let probs = one_hot(&[0, 1, 2, 3, 4, 4, 5], 6);
        let out = postprocess(probs.clone(), 7, &FamilyConfig::psg()).unwrap();
        assert_eq!(out.hypnogram, vec![0, 1, 2, 3, 5, 5, 5]);
        assert_eq!(out.probabilities, probs);
    }

    #[test]
    fn forehead_permutes_then_remaps() {
        // Raw column order: [N3, N2, N1, REM, Wake, Art].
        let probs = one_hot(&[4, 2, 1, 0, 3, 5], 6);
        let out = postprocess(probs, 6, &FamilyConfig::forehead()).unwrap();
        assert_eq!(out.hypnogram, vec![0, 1, 2, 3, 5, 6]);
        // Wake's raw column 4 is now column 0.
        assert_eq!(out.probabilities[[0, 0]], 1.0);
    }

    #[test]
    fn ties_pick_lowest_index() {
        let probs = array![[0.4_f32, 0.4, 0.2], [f32::NAN, 0.1, 0.1]];
        assert_eq!(argmax_rows(&probs), vec![0, 1]);
    }

    #[test]
    fn remap_is_ordered() {
        let mut labels = vec![4, 5, 3];
        remap_labels(&mut labels, &[(5, 6), (4, 5)]);
        assert_eq!(labels, vec![5, 6, 3]);
    }

    #[test]
    fn permutation_out_of_range() {
        let probs = Array2::<f32>::zeros((2, 5));
        assert!(matches!(
            permute_columns(&probs, &[4, 2, 1, 0, 3, 5]),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
