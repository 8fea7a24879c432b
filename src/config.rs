//! Pipeline configuration.
//!
//! Two model families share one pipeline.  [`FamilyConfig`] captures every
//! place where they differ (clip statistic, target rate, block policy, class
//! permutation, label remap); [`PipelineConfig`] adds the per-invocation
//! settings that sit on top of a family.
use crate::channels::Role;

/// Robust-spread statistic used by the outlier clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPolicy {
    /// Clip each channel to `±20·IQR` of its raw values.
    PercentileIqr,
    /// Normalise each channel to `(x − median) / MAD`, then clip to `±20·IQR`
    /// of the normalised values.
    MedianMad,
}

/// How conditioned epochs are cut into scorer-sized blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Non-overlapping sequences; the trailing partial sequence is NaN-padded
    /// and scored on its valid prefix only.
    Sequence,
    /// Overlapping windows at stride `L / 2` with a forced final window.
    SlidingWindow,
}

/// Per-model-family settings.
///
/// Construct one with [`FamilyConfig::psg`] or [`FamilyConfig::forehead`] and
/// override fields with struct-update syntax:
///
/// ```
/// use hypnos::FamilyConfig;
///
/// let cfg = FamilyConfig {
///     target_sfreq: 100.0,
///     ..FamilyConfig::psg()
/// };
/// assert_eq!(cfg.epoch_samples(), 3000);
/// ```
#[derive(Debug, Clone)]
pub struct FamilyConfig {
    /// Human-readable family name, used in log lines.
    pub name: &'static str,

    /// Sampling rate every channel is resampled to, in Hz.
    pub target_sfreq: f32,

    /// Epoch duration in seconds.
    ///
    /// Default: `30.0`.
    pub epoch_dur: f32,

    /// Outlier clip statistic.
    ///
    /// [`ClipPolicy::PercentileIqr`] runs at the original rate before
    /// resampling; [`ClipPolicy::MedianMad`] runs after resampling and the
    /// optional highpass.
    pub clip: ClipPolicy,

    /// Zero-phase FIR highpass cutoff applied after resampling, in Hz.
    pub highpass_hz: Option<f32>,

    /// Apply `(x − median) / IQR` scaling after resampling.
    pub robust_scale: bool,

    /// Block packing policy.
    pub block: BlockPolicy,

    /// Column permutation taking raw model output to canonical stage order.
    /// Applied to the probability matrix before arg-max.
    pub class_permutation: Option<Vec<usize>>,

    /// Hypnogram label rewrites `(from, to)`, applied in order.
    pub label_remap: Vec<(u8, u8)>,

    /// Role spec used to build channel groups.  `None` means a single group
    /// containing every scoring channel.
    pub grouping: Option<Vec<Role>>,

    /// Emit a trailing always-zero column in the probability table.
    pub unused_column: bool,
}

impl FamilyConfig {
    /// Ensemble family scoring full PSG recordings:
    /// 128 Hz · IQR clip · robust scaling · sliding windows · EEG×EOG groups.
    pub fn psg() -> Self {
        Self {
            name: "psg",
            target_sfreq: 128.0,
            epoch_dur: 30.0,
            clip: ClipPolicy::PercentileIqr,
            highpass_hz: None,
            robust_scale: true,
            block: BlockPolicy::SlidingWindow,
            class_permutation: None,
            label_remap: vec![(4, 5)],
            grouping: Some(vec![Role::Eeg, Role::Eog]),
            unused_column: true,
        }
    }

    /// Small fixed-length family scoring two-channel forehead EEG:
    /// 64 Hz · 0.5 Hz highpass · MAD clip · 100-epoch sequences.
    pub fn forehead() -> Self {
        Self {
            name: "forehead",
            target_sfreq: 64.0,
            epoch_dur: 30.0,
            clip: ClipPolicy::MedianMad,
            highpass_hz: Some(0.5),
            robust_scale: false,
            block: BlockPolicy::Sequence,
            class_permutation: Some(vec![4, 2, 1, 0, 3, 5]),
            label_remap: vec![(5, 6), (4, 5)],
            grouping: None,
            unused_column: false,
        }
    }

    /// Number of samples per epoch at the target rate.
    pub fn epoch_samples(&self) -> usize {
        (self.epoch_dur * self.target_sfreq) as usize
    }

    /// Number of samples per epoch at an arbitrary source rate.
    pub fn epoch_samples_at(&self, sfreq: f32) -> usize {
        (self.epoch_dur * sfreq) as usize
    }
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self::psg()
    }
}

/// Settings for one scoring invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model family the scorer belongs to.
    pub family: FamilyConfig,

    /// Restrict scoring to these channel names.  Names not present in the
    /// recording are ignored with a warning; if none match, all channels are
    /// considered.
    ///
    /// Default: `None`.
    pub requested_channels: Option<Vec<String>>,

    /// Windows per scorer call in sliding-window mode.  Purely a throughput
    /// knob; it has no numeric effect.
    ///
    /// Default: `64`.
    pub batch_size: usize,

    /// Base model name.  The EEG-only variant appends `_eeg`.
    ///
    /// Default: `"u-sleep-nsrr-2024"`.
    pub model_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            family: FamilyConfig::psg(),
            requested_channels: None,
            batch_size: 64,
            model_name: "u-sleep-nsrr-2024".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Forehead-family configuration with its default model name.
    pub fn forehead() -> Self {
        Self {
            family: FamilyConfig::forehead(),
            model_name: "ez6".to_string(),
            ..Self::default()
        }
    }

    /// Model file to load given whether EOG channels were detected.
    ///
    /// Only grouped families ship an EEG-only variant; the forehead model is
    /// always loaded under its own name.
    pub fn model_file(&self, has_eog: bool) -> String {
        if has_eog || self.family.grouping.is_none() {
            format!("{}.onnx", self.model_name)
        } else {
            format!("{}_eeg.onnx", self.model_name)
        }
    }
}
