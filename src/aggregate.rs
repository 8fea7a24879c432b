//! Coverage-weighted accumulation of block predictions and the cross-group
//! ensemble.
//!
//! Each block contributes its valid rows to `prob_sum[start..start + valid]`
//! and bumps `coverage` over the same range.  Accumulators merge by plain
//! summation, so block order and batching have no effect on the result.
use ndarray::{s, Array1, Array2, ArrayView2, ArrayView3, Axis};

use crate::error::{Error, Result};

/// Lower bound on the coverage divisor.
pub const COVERAGE_EPS: f32 = 1e-7;

/// Per-group probability sum and coverage count.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    prob_sum: Array2<f32>,
    coverage: Array1<u32>,
}

impl Accumulator {
    pub fn new(n_epochs: usize, n_classes: usize) -> Self {
        Self {
            prob_sum: Array2::zeros((n_epochs, n_classes)),
            coverage: Array1::zeros(n_epochs),
        }
    }

    pub fn n_epochs(&self) -> usize {
        self.coverage.len()
    }

    pub fn n_classes(&self) -> usize {
        self.prob_sum.ncols()
    }

    pub fn coverage(&self) -> &Array1<u32> {
        &self.coverage
    }

    /// Add the rows of `probs` ([rows, classes]) for epochs starting at
    /// `start`.  Rows past the last epoch are ignored.
    pub fn add(&mut self, start: usize, probs: ArrayView2<'_, f32>) -> Result<()> {
        if probs.ncols() != self.n_classes() {
            return Err(Error::ShapeMismatch(format!(
                "block has {} classes, accumulator has {}",
                probs.ncols(),
                self.n_classes()
            )));
        }
        let stop = (start + probs.nrows()).min(self.n_epochs());
        if start >= stop {
            return Ok(());
        }
        let rows = probs.slice(s![..stop - start, ..]);
        let mut dst = self.prob_sum.slice_mut(s![start..stop, ..]);
        dst += &rows;
        self.coverage.slice_mut(s![start..stop]).mapv_inplace(|c| c + 1);
        Ok(())
    }

    /// Add predictions `probs` ([B, ≥valid, classes]) for blocks starting at
    /// `starts`, keeping only the first `valid[b]` rows of block `b`.
    pub fn add_blocks(&mut self, starts: &[usize], valid: &[usize], probs: ArrayView3<'_, f32>) -> Result<()> {
        let n_blocks = probs.len_of(Axis(0));
        if n_blocks != starts.len() || n_blocks != valid.len() {
            return Err(Error::ShapeMismatch(format!(
                "{n_blocks} prediction blocks for {} packed blocks",
                starts.len()
            )));
        }
        for (b, block_probs) in probs.axis_iter(Axis(0)).enumerate() {
            if block_probs.nrows() < valid[b] {
                return Err(Error::ShapeMismatch(format!(
                    "block {b} has {} prediction rows, {} epochs are valid",
                    block_probs.nrows(),
                    valid[b]
                )));
            }
            self.add(starts[b], block_probs.slice(s![..valid[b], ..]))?;
        }
        Ok(())
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: &Accumulator) -> Result<()> {
        if other.prob_sum.dim() != self.prob_sum.dim() {
            return Err(Error::ShapeMismatch(format!(
                "cannot merge accumulator {:?} into {:?}",
                other.prob_sum.dim(),
                self.prob_sum.dim()
            )));
        }
        self.prob_sum += &other.prob_sum;
        self.coverage += &other.coverage;
        Ok(())
    }

    /// `prob_sum / max(coverage, ε)` row-wise.
    pub fn finalize(self) -> Array2<f32> {
        let Self { mut prob_sum, coverage } = self;
        for (mut row, &c) in prob_sum.rows_mut().into_iter().zip(coverage.iter()) {
            let denom = (c as f32).max(COVERAGE_EPS);
            row.mapv_inplace(|v| v / denom);
        }
        prob_sum
    }
}

/// Unweighted mean of per-group probability matrices, summed in group order.
pub fn ensemble(groups: &[Array2<f32>]) -> Result<Array2<f32>> {
    let Some(first) = groups.first() else {
        return Err(Error::Configuration("no channel groups to ensemble".into()));
    };
    let mut sum = Array2::<f32>::zeros(first.dim());
    for (g, probs) in groups.iter().enumerate() {
        if probs.dim() != first.dim() {
            return Err(Error::ShapeMismatch(format!(
                "group {g} probabilities {:?} differ from group 0 {:?}",
                probs.dim(),
                first.dim()
            )));
        }
        sum += probs;
    }
    sum /= groups.len() as f32;
    Ok(sum)
}
