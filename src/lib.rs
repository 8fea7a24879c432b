//! # hypnos — sleep-stage scoring pipeline
//!
//! `hypnos` turns a raw multi-channel sleep recording into a per-30-second
//! hypnogram and a per-epoch class-probability matrix.  The neural scoring
//! function is a collaborator behind the [`Scorer`] trait; everything around
//! it lives here: channel grouping, signal conditioning, block packing,
//! coverage-weighted aggregation, ensembling and stage remapping.
//!
//! ## Pipeline overview
//!
//! ```text
//! Recording [C, T] @ sfreq, channel names
//!   │
//!   ├─ channels::plan_channels()    classify → dedup → EOG pick → groups
//!   ├─ condition::condition()       clip → resample → (highpass) → scale → epoch
//!   ├─ packing::pack()              sequences | sliding windows [B, L, S, C]
//!   ├─ Scorer::score()              external model → [B, L, K]
//!   ├─ aggregate::Accumulator       Σ probs / coverage per group
//!   ├─ aggregate::ensemble()        mean over groups
//!   └─ postprocess::postprocess()   truncate → permute → arg-max → remap
//!        │
//!        └─→ Scoring { hypnogram: Vec<u8>, probabilities: [E, K] }
//! ```
//!
//! Two model families share this pipeline; [`FamilyConfig`] captures every
//! difference between them.
//!
//! ## Quick start
//!
//! ```no_run
//! use hypnos::{score, PipelineConfig, Recording, Scorer, BoxError};
//! use ndarray::{Array2, Array3, ArrayView4};
//!
//! struct Uniform;
//!
//! impl Scorer for Uniform {
//!     fn block_len(&self) -> usize { 35 }
//!     fn n_classes(&self) -> usize { 5 }
//!     fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
//!         Ok(Array3::from_elem((batch.shape()[0], batch.shape()[1], 5), 0.2))
//!     }
//! }
//!
//! let names = ["C3-A2", "C4-A1", "EOG-L", "EOG-R"].map(String::from).to_vec();
//! let rec = Recording::new(Array2::zeros((4, 256 * 3600)), 256.0, Some(names)).unwrap();
//! let out = score(&rec, &PipelineConfig::default(), &Uniform).unwrap();
//! assert_eq!(out.hypnogram.len(), 120);
//! ```

pub mod aggregate;
pub mod channels;
pub mod condition;
pub mod config;
pub mod epoch;
pub mod error;
pub mod filter;
pub mod io;
pub mod model;
pub mod normalize;
pub mod packing;
pub mod pipeline;
pub mod postprocess;
pub mod quality;
pub mod recording;
pub mod report;
pub mod resample;
pub mod stats;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use aggregate::{ensemble, Accumulator};
pub use channels::{classify, plan_channels, select_requested, Channel, ChannelGroup, ChannelPlan, Role};
pub use condition::{condition, Conditioned};
pub use config::{BlockPolicy, ClipPolicy, FamilyConfig, PipelineConfig};
pub use error::{BoxError, Error, Result};
pub use model::Scorer;
pub use packing::{pack, window_starts, Blocks};
pub use pipeline::{prepare, score_prepared, score_recording, Prepared};
pub use postprocess::{postprocess, Scoring, STAGE_NAMES};
pub use quality::rank_eeg_channels;
pub use recording::{Recording, RecordingSource};
pub use stats::SleepStats;

/// Score one recording with an already-loaded scorer.
///
/// Equivalent to [`prepare`] followed by [`score_prepared`].  Use
/// [`score_recording`] instead when the model file depends on whether EOG
/// channels were found.
///
/// # Errors
///
/// Any [`Error`]: unusable channels, a recording shorter than one epoch,
/// scorer output of the wrong shape, or a scorer failure (reported with the
/// group and epoch range that failed).
pub fn score<S: Scorer + ?Sized>(recording: &Recording, cfg: &PipelineConfig, scorer: &S) -> Result<Scoring> {
    let prepared = prepare(recording, cfg)?;
    score_prepared(&prepared, scorer, cfg)
}
