//! Signal conditioning: clip, resample, filter, scale, epoch.
//!
//! ```text
//! [C, T] @ src_sfreq
//!   ├─ truncate to whole epochs at src_sfreq     (IQR family)
//!   ├─ clip ±20·IQR                              (IQR family)
//!   ├─ polyphase resample → target_sfreq
//!   ├─ zero-phase highpass                       (if configured)
//!   ├─ median/MAD normalise + clip ±20·IQR       (MAD family)
//!   ├─ (x − median) / IQR                        (if configured)
//!   └─ epoch → [C, E, S]
//! ```
use ndarray::{Array2, Array3};
use tracing::debug;

use crate::config::{ClipPolicy, FamilyConfig};
use crate::epoch::{epoch, epoch_count, truncate_to_epochs};
use crate::error::{Error, Result};
use crate::filter::{apply_zero_phase, design_highpass};
use crate::normalize::{clip_iqr_inplace, clip_mad_inplace, per_channel_inplace, robust_scale_inplace};
use crate::resample::resample;

/// Conditioned, epoched signal of the loaded channels.
#[derive(Debug, Clone)]
pub struct Conditioned {
    /// `[C, E, S]` at the family's target rate, channels in load order.
    pub epochs: Array3<f32>,
    /// Whole epochs in the signal as originally loaded.
    pub n_raw_epochs: usize,
}

impl Conditioned {
    pub fn n_epochs(&self) -> usize {
        self.epochs.shape()[1]
    }

    pub fn samples_per_epoch(&self) -> usize {
        self.epochs.shape()[2]
    }
}

/// Condition `data` ([C, T] at `src_sfreq`) for the given model family.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if an epoch is shorter than one sample at either
/// rate; resampler configuration errors are passed through.
pub fn condition(mut data: Array2<f32>, src_sfreq: f32, family: &FamilyConfig) -> Result<Conditioned> {
    let raw_epoch_len = family.epoch_samples_at(src_sfreq);
    let epoch_len = family.epoch_samples();
    if raw_epoch_len == 0 || epoch_len == 0 {
        return Err(Error::ShapeMismatch(format!(
            "{} s epochs hold no samples at {src_sfreq} Hz → {} Hz",
            family.epoch_dur, family.target_sfreq
        )));
    }
    let n_raw_epochs = epoch_count(data.ncols(), raw_epoch_len);

    if family.clip == ClipPolicy::PercentileIqr {
        data = truncate_to_epochs(&data, raw_epoch_len);
        per_channel_inplace(&mut data, |row| {
            clip_iqr_inplace(row);
        });
    }

    if (src_sfreq - family.target_sfreq).abs() > 1e-3 {
        data = resample(&data, src_sfreq, family.target_sfreq)?;
    }

    if let Some(l_freq) = family.highpass_hz {
        let h = design_highpass(l_freq, family.target_sfreq);
        apply_zero_phase(&mut data, &h);
    }

    if family.clip == ClipPolicy::MedianMad {
        per_channel_inplace(&mut data, clip_mad_inplace);
    }

    if family.robust_scale {
        per_channel_inplace(&mut data, robust_scale_inplace);
    }

    let epochs = epoch(data.view(), epoch_len);
    debug!(
        "conditioned {} channel(s) into {} epoch(s) of {} samples ({} raw epochs)",
        epochs.shape()[0],
        epochs.shape()[1],
        epoch_len,
        n_raw_epochs
    );
    Ok(Conditioned { epochs, n_raw_epochs })
}
