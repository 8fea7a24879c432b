//! Packing epochs into scorer-sized blocks.
//!
//! Both policies produce [`Blocks`]: a `[B, L, S, C]` tensor (channel
//! innermost) plus, for each block, the first epoch it covers and how many
//! of its `L` rows are real epochs.
//!
//! Sliding windows (`L` = block length, `N` = epochs, stride `L / 2`):
//!
//! ```text
//! N = 50, L = 35
//!   stride starts  0            (17 + 35 > 50 stops the stride)
//!   forced tail    15           (= N − L, appended if missing)
//!   coverage       1 … 1 2 … 2 1 … 1
//!                  0   15  34  35  49
//! ```
use ndarray::{s, Array4, ArrayView3, Axis};

use crate::config::BlockPolicy;

/// Model-ready blocks for one channel group.
#[derive(Debug, Clone)]
pub struct Blocks {
    /// `[B, L, S, C]`.
    pub data: Array4<f32>,
    /// First epoch covered by each block.
    pub starts: Vec<usize>,
    /// Number of real epochs at the front of each block.
    pub valid: Vec<usize>,
}

impl Blocks {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn block_len(&self) -> usize {
        self.data.shape()[1]
    }

    /// Epoch range whose predictions block `b` contributes.
    pub fn epoch_range(&self, b: usize) -> std::ops::Range<usize> {
        self.starts[b]..self.starts[b] + self.valid[b]
    }
}

/// Pack one channel group according to `policy`.
///
/// `epochs` is `[C, E, S]` for all loaded channels; `channels` selects and
/// orders the group's members.
pub fn pack(policy: BlockPolicy, epochs: ArrayView3<'_, f32>, channels: &[usize], block_len: usize) -> Blocks {
    match policy {
        BlockPolicy::Sequence => pack_sequences(epochs, channels, block_len),
        BlockPolicy::SlidingWindow => pack_windows(epochs, channels, block_len),
    }
}

/// Window start offsets for `n_epochs` epochs and windows of `block_len`.
///
/// Stride is `block_len / 2` (at least 1).  The final window always starts
/// at `n_epochs − block_len`, so the tail is covered even when the stride
/// does not divide the remainder.  Recordings no longer than one window get
/// a single window at 0.
pub fn window_starts(n_epochs: usize, block_len: usize) -> Vec<usize> {
    if n_epochs <= block_len {
        return vec![0];
    }
    let margin = (block_len / 2).max(1);
    let last_start = n_epochs - block_len;
    let mut starts: Vec<usize> = (0..=last_start).step_by(margin).collect();
    if starts.last() != Some(&last_start) {
        starts.push(last_start);
    }
    starts
}

/// Overlapping windows.  A recording shorter than one window is zero-padded
/// up to `block_len`.
pub fn pack_windows(epochs: ArrayView3<'_, f32>, channels: &[usize], block_len: usize) -> Blocks {
    let group = epochs.select(Axis(0), channels);
    let group = group.view().permuted_axes([1, 2, 0]); // [E, S, C]
    let (n_epochs, n_samples, n_ch) = group.dim();

    let starts = window_starts(n_epochs, block_len);
    let mut data = Array4::<f32>::zeros((starts.len(), block_len, n_samples, n_ch));
    let mut valid = Vec::with_capacity(starts.len());
    for (b, &start) in starts.iter().enumerate() {
        let stop = (start + block_len).min(n_epochs);
        data.slice_mut(s![b, ..stop - start, .., ..])
            .assign(&group.slice(s![start..stop, .., ..]));
        valid.push(stop - start);
    }
    Blocks { data, starts, valid }
}

/// Consecutive non-overlapping sequences.  The trailing partial sequence is
/// NaN-filled beyond its valid epochs.
pub fn pack_sequences(epochs: ArrayView3<'_, f32>, channels: &[usize], seq_len: usize) -> Blocks {
    let group = epochs.select(Axis(0), channels);
    let group = group.view().permuted_axes([1, 2, 0]); // [E, S, C]
    let (n_epochs, n_samples, n_ch) = group.dim();

    let n_seqs = if seq_len == 0 { 0 } else { n_epochs.div_ceil(seq_len) };
    let mut data = Array4::<f32>::from_elem((n_seqs, seq_len, n_samples, n_ch), f32::NAN);
    let mut starts = Vec::with_capacity(n_seqs);
    let mut valid = Vec::with_capacity(n_seqs);
    for b in 0..n_seqs {
        let start = b * seq_len;
        let stop = (start + seq_len).min(n_epochs);
        data.slice_mut(s![b, ..stop - start, .., ..])
            .assign(&group.slice(s![start..stop, .., ..]));
        starts.push(start);
        valid.push(stop - start);
    }
    Blocks { data, starts, valid }
}
