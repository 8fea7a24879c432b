//! Fixed-length epoching.
//!
//! Splits continuous [C, T] data into non-overlapping windows of
//! `epoch_samples` samples.  Trailing samples that do not fill a complete
//! window are dropped, never padded.
use ndarray::{s, Array2, Array3, ArrayView2};

/// Number of whole epochs in `n_samples`.
pub fn epoch_count(n_samples: usize, epoch_samples: usize) -> usize {
    if epoch_samples == 0 { 0 } else { n_samples / epoch_samples }
}

/// Epoch `data` ([C, T]) into a 3-D array [C, E, epoch_samples].
pub fn epoch(data: ArrayView2<'_, f32>, epoch_samples: usize) -> Array3<f32> {
    let (n_ch, n_t) = data.dim();
    let n_epochs = epoch_count(n_t, epoch_samples);

    let mut out = Array3::<f32>::zeros((n_ch, n_epochs, epoch_samples));
    for e in 0..n_epochs {
        let start = e * epoch_samples;
        out.slice_mut(s![.., e, ..])
            .assign(&data.slice(s![.., start..start + epoch_samples]));
    }
    out
}

/// Drop trailing samples so `data` holds a whole number of epochs.
pub fn truncate_to_epochs(data: &Array2<f32>, epoch_samples: usize) -> Array2<f32> {
    let n_epochs = epoch_count(data.ncols(), epoch_samples);
    data.slice(s![.., ..n_epochs * epoch_samples]).to_owned()
}
