//! End-to-end scoring of one recording.
//!
//! ```text
//! Recording
//!   ├─ select_requested / plan_channels   → load list + groups
//!   ├─ pick + condition                    → [C, E, S]
//!   ├─ per group (rayon):  pack → score in batches → Accumulator
//!   ├─ ensemble                            → [E, K]
//!   └─ postprocess                         → Scoring
//! ```
//!
//! Nothing here keeps state between calls; a failed recording leaves no
//! trace for the next one.
use ndarray::{s, Array2, ArrayView4};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::aggregate::{ensemble, Accumulator};
use crate::channels::{plan_channels, select_requested, ChannelGroup, ChannelPlan};
use crate::condition::{condition, Conditioned};
use crate::config::{BlockPolicy, FamilyConfig, PipelineConfig};
use crate::error::{BoxError, Error, Result};
use crate::model::{check_output, Scorer};
use crate::packing::{pack, Blocks};
use crate::postprocess::{postprocess, Scoring};
use crate::recording::Recording;

/// A recording planned and conditioned, ready for packing.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub plan: ChannelPlan,
    pub conditioned: Conditioned,
    /// Model file matching the detected channel set.
    pub model_file: String,
}

/// Plan channels and condition the loaded subset.
///
/// # Errors
///
/// Channel planning and conditioning errors, plus
/// [`Error::ShapeMismatch`] when the recording is shorter than one epoch.
pub fn prepare(recording: &Recording, cfg: &PipelineConfig) -> Result<Prepared> {
    let candidates = select_requested(&recording.ch_names, cfg.requested_channels.as_deref());
    let plan = plan_channels(&candidates, cfg.family.grouping.as_deref())?;
    let data = recording.pick(&plan.load_list)?;
    let conditioned = condition(data, recording.sfreq, &cfg.family)?;
    if conditioned.n_epochs() == 0 || conditioned.n_raw_epochs == 0 {
        return Err(Error::ShapeMismatch(format!(
            "{} samples at {} Hz hold no whole {} s epoch",
            recording.n_samples(),
            recording.sfreq,
            cfg.family.epoch_dur
        )));
    }
    let model_file = cfg.model_file(plan.has_eog);
    info!(
        "{} family: {} epoch(s), model {}",
        cfg.family.name,
        conditioned.n_epochs(),
        model_file
    );
    Ok(Prepared { plan, conditioned, model_file })
}

/// Pack every group of `prepared` into blocks of `block_len` epochs.
pub fn pack_groups(prepared: &Prepared, family: &FamilyConfig, block_len: usize) -> Vec<Blocks> {
    prepared
        .plan
        .groups
        .iter()
        .map(|g| pack(family.block, prepared.conditioned.epochs.view(), &g.indices, block_len))
        .collect()
}

/// Score a prepared recording with `scorer`.
pub fn score_prepared<S>(prepared: &Prepared, scorer: &S, cfg: &PipelineConfig) -> Result<Scoring>
where
    S: Scorer + ?Sized,
{
    let block_len = scorer.block_len();
    if block_len == 0 || scorer.n_classes() == 0 {
        return Err(Error::Configuration(format!(
            "scorer declares block length {block_len} and {} classes",
            scorer.n_classes()
        )));
    }
    let samples = prepared.conditioned.samples_per_epoch();
    if let Some(expected) = scorer.samples_per_epoch() {
        if expected != samples {
            return Err(Error::ShapeMismatch(format!(
                "scorer expects {expected} samples per epoch, conditioned signal has {samples}"
            )));
        }
    }

    let groups = &prepared.plan.groups;
    let n_epochs = prepared.conditioned.n_epochs();
    let per_group: Vec<Array2<f32>> = groups
        .par_iter()
        .enumerate()
        .map(|(g, group)| {
            info!("group {}/{}: {:?}", g + 1, groups.len(), group.names);
            let blocks = pack(cfg.family.block, prepared.conditioned.epochs.view(), &group.indices, block_len);
            let acc = score_blocks(scorer, &blocks, cfg.family.block, cfg.batch_size, n_epochs, g, group)?;
            Ok(acc.finalize())
        })
        .collect::<Result<Vec<_>>>()?;

    let probs = ensemble(&per_group)?;
    postprocess(probs, prepared.conditioned.n_raw_epochs, &cfg.family)
}

/// Score `recording` end to end.
///
/// `load` receives the model file name chosen from the detected channels
/// and returns the scorer to use.
pub fn score_recording<S, L>(recording: &Recording, cfg: &PipelineConfig, load: L) -> Result<Scoring>
where
    S: Scorer,
    L: FnOnce(&str) -> std::result::Result<S, BoxError>,
{
    let prepared = prepare(recording, cfg)?;
    let scorer = load(&prepared.model_file)
        .map_err(|e| Error::Configuration(format!("cannot load model {}: {e}", prepared.model_file)))?;
    score_prepared(&prepared, &scorer, cfg)
}

/// Run `scorer` over every block of one group and accumulate the results.
///
/// Full blocks go to the scorer `batch_size` at a time.  In sequence mode a
/// trailing partial block is scored alone on its valid epochs.
pub fn score_blocks<S>(
    scorer: &S,
    blocks: &Blocks,
    policy: BlockPolicy,
    batch_size: usize,
    n_epochs: usize,
    group_idx: usize,
    group: &ChannelGroup,
) -> Result<Accumulator>
where
    S: Scorer + ?Sized,
{
    let mut acc = Accumulator::new(n_epochs, scorer.n_classes());
    let block_len = blocks.block_len();
    let partial_tail = policy == BlockPolicy::Sequence
        && blocks.valid.last().is_some_and(|&v| v < block_len);
    let n_batched = if partial_tail { blocks.len() - 1 } else { blocks.len() };
    if policy == BlockPolicy::SlidingWindow {
        debug!("{} window(s), starts {:?}", blocks.len(), blocks.starts);
    }

    let batch_size = batch_size.max(1);
    let mut b0 = 0;
    while b0 < n_batched {
        let b1 = (b0 + batch_size).min(n_batched);
        let batch = blocks.data.slice(s![b0..b1, .., .., ..]);
        let out = run(scorer, batch, blocks, b0..b1, group_idx, group)?;
        for (i, b) in (b0..b1).enumerate() {
            acc.add(blocks.starts[b], out.slice(s![i, ..blocks.valid[b], ..]))?;
        }
        b0 = b1;
    }

    if partial_tail {
        let b = blocks.len() - 1;
        let valid = blocks.valid[b];
        let tail = blocks.data.slice(s![b..b + 1, ..valid, .., ..]);
        let out = run(scorer, tail, blocks, b..b + 1, group_idx, group)?;
        acc.add(blocks.starts[b], out.slice(s![0, .., ..]))?;
    }
    Ok(acc)
}

fn run<S>(
    scorer: &S,
    batch: ArrayView4<'_, f32>,
    blocks: &Blocks,
    range: std::ops::Range<usize>,
    group_idx: usize,
    group: &ChannelGroup,
) -> Result<ndarray::Array3<f32>>
where
    S: Scorer + ?Sized,
{
    let first = blocks.epoch_range(range.start).start;
    let last = blocks.epoch_range(range.end - 1).end;
    let out = scorer
        .score(batch.view())
        .map_err(|e| Error::scoring(group_idx, &group.names, first..last, e))?;
    check_output(&batch, &out, scorer.n_classes())
        .map_err(|e| Error::scoring(group_idx, &group.names, first..last, e))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, ArrayView4};

    /// Puts all mass on class `tag % n_classes`, where `tag` is the first
    /// sample of channel 0 of each epoch.
    struct Echo {
        block_len: usize,
        n_classes: usize,
    }

    impl Scorer for Echo {
        fn block_len(&self) -> usize {
            self.block_len
        }

        fn n_classes(&self) -> usize {
            self.n_classes
        }

        fn score(&self, batch: ArrayView4<'_, f32>) -> std::result::Result<Array3<f32>, BoxError> {
            let (b, l, _, _) = batch.dim();
            Ok(Array3::from_shape_fn((b, l, self.n_classes), |(i, e, k)| {
                let tag = batch[[i, e, 0, 0]];
                if !tag.is_nan() && tag as usize % self.n_classes == k { 1.0 } else { 0.0 }
            }))
        }
    }

    fn group() -> ChannelGroup {
        ChannelGroup { names: vec!["C3".into()], indices: vec![0] }
    }

    fn tagged(n_epochs: usize) -> Array3<f32> {
        Array3::from_shape_fn((1, n_epochs, 4), |(_, e, _)| e as f32)
    }

    #[test]
    fn batching_has_no_numeric_effect() {
        let epochs = tagged(90);
        let blocks = pack(BlockPolicy::SlidingWindow, epochs.view(), &[0], 35);
        let scorer = Echo { block_len: 35, n_classes: 5 };
        let one = score_blocks(&scorer, &blocks, BlockPolicy::SlidingWindow, 1, 90, 0, &group()).unwrap();
        let many = score_blocks(&scorer, &blocks, BlockPolicy::SlidingWindow, 64, 90, 0, &group()).unwrap();
        assert_eq!(one, many);
        assert!(one.coverage().iter().all(|&c| c >= 1));
    }

    #[test]
    fn sequence_tail_scored_on_valid_epochs() {
        let epochs = tagged(130);
        let blocks = pack(BlockPolicy::Sequence, epochs.view(), &[0], 100);
        let scorer = Echo { block_len: 100, n_classes: 6 };
        let acc = score_blocks(&scorer, &blocks, BlockPolicy::Sequence, 8, 130, 0, &group()).unwrap();
        assert!(acc.coverage().iter().all(|&c| c == 1));
        let probs = acc.finalize();
        assert_eq!(probs[[129, 129 % 6]], 1.0);
    }

    struct Failing;

    impl Scorer for Failing {
        fn block_len(&self) -> usize {
            35
        }

        fn n_classes(&self) -> usize {
            5
        }

        fn score(&self, _batch: ArrayView4<'_, f32>) -> std::result::Result<Array3<f32>, BoxError> {
            Err("runtime exploded".into())
        }
    }

    #[test]
    fn failure_carries_context() {
        let epochs = tagged(50);
        let blocks = pack(BlockPolicy::SlidingWindow, epochs.view(), &[0], 35);
        let err = score_blocks(&Failing, &blocks, BlockPolicy::SlidingWindow, 64, 50, 3, &group()).unwrap_err();
        match err {
            Error::Scoring { group, channels, epochs, .. } => {
                assert_eq!(group, 3);
                assert_eq!(channels, vec!["C3".to_string()]);
                assert_eq!(epochs, 0..50);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
