//! The scoring collaborator.
//!
//! The network itself lives outside this crate.  A [`Scorer`] takes a batch
//! of blocks `[B, L, S, C]` and returns per-epoch class probabilities
//! `[B, L, K]`.  It declares its own block length `L` and class count `K`;
//! the pipeline reads both rather than assuming family constants.
use ndarray::{Array3, ArrayView4};

use crate::error::BoxError;

pub trait Scorer: Sync {
    /// Epochs per block.
    fn block_len(&self) -> usize;

    /// Classes per output row.
    fn n_classes(&self) -> usize;

    /// Samples per epoch the scorer expects, if it checks.
    fn samples_per_epoch(&self) -> Option<usize> {
        None
    }

    /// Score a batch of blocks.
    ///
    /// Sequence-family scorers also receive shorter trailing blocks
    /// (`[1, valid, S, C]`) and must return one row per input epoch.
    fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError>;
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn block_len(&self) -> usize {
        (**self).block_len()
    }

    fn n_classes(&self) -> usize {
        (**self).n_classes()
    }

    fn samples_per_epoch(&self) -> Option<usize> {
        (**self).samples_per_epoch()
    }

    fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
        (**self).score(batch)
    }
}

impl<S: Scorer + ?Sized> Scorer for &S {
    fn block_len(&self) -> usize {
        (**self).block_len()
    }

    fn n_classes(&self) -> usize {
        (**self).n_classes()
    }

    fn samples_per_epoch(&self) -> Option<usize> {
        (**self).samples_per_epoch()
    }

    fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
        (**self).score(batch)
    }
}

/// Output shape did not match the batch that was scored.
#[derive(Debug, thiserror::Error)]
#[error("scorer returned {got:?}, expected {expected:?}")]
pub struct MalformedOutput {
    pub got: Vec<usize>,
    pub expected: [usize; 3],
}

/// Check `out` is `[batch, rows, n_classes]` for the given input batch.
pub fn check_output(
    batch: &ArrayView4<'_, f32>,
    out: &Array3<f32>,
    n_classes: usize,
) -> Result<(), MalformedOutput> {
    let expected = [batch.shape()[0], batch.shape()[1], n_classes];
    if out.shape() == expected {
        Ok(())
    } else {
        Err(MalformedOutput { got: out.shape().to_vec(), expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    struct Flat;

    impl Scorer for Flat {
        fn block_len(&self) -> usize {
            4
        }

        fn n_classes(&self) -> usize {
            3
        }

        fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
            Ok(Array3::from_elem((batch.shape()[0], batch.shape()[1], 3), 1.0 / 3.0))
        }
    }

    #[test]
    fn boxed_scorer_delegates() {
        let boxed: Box<dyn Scorer> = Box::new(Flat);
        assert_eq!(boxed.block_len(), 4);
        assert_eq!(boxed.samples_per_epoch(), None);
        let batch = Array4::<f32>::zeros((2, 4, 8, 1));
        let out = boxed.score(batch.view()).unwrap();
        assert!(check_output(&batch.view(), &out, 3).is_ok());
    }

    #[test]
    fn wrong_shape_reported() {
        let batch = Array4::<f32>::zeros((2, 4, 8, 1));
        let out = Array3::<f32>::zeros((2, 3, 3));
        let err = check_output(&batch.view(), &out, 3).unwrap_err();
        assert_eq!(err.expected, [2, 4, 3]);
        assert_eq!(err.got, vec![2, 3, 3]);
    }
}
