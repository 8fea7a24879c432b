/// Shared helpers: synthetic recordings and deterministic mock scorers.
use hypnos::{BoxError, Recording, Scorer};
use ndarray::{Array2, Array3, ArrayView4};
use std::sync::atomic::{AtomicUsize, Ordering};

#[allow(unused)]
pub fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[allow(unused)]
/// `secs` seconds of a per-channel sine mix (tens of µV, in volts).
pub fn synthetic(ch_names: &[&str], sfreq: f32, secs: f32) -> Recording {
    let n_t = (secs * sfreq) as usize;
    let data = Array2::from_shape_fn((ch_names.len(), n_t), |(c, t)| {
        let x = t as f32 / sfreq;
        let alpha = (2.0 * std::f32::consts::PI * (9.0 + c as f32) * x).sin() * 20e-6;
        let delta = (2.0 * std::f32::consts::PI * (1.3 + 0.2 * c as f32) * x).sin() * 40e-6;
        alpha + delta
    });
    Recording::new(data, sfreq, Some(names(ch_names))).unwrap()
}

#[allow(unused)]
/// One-hot on `class` for every epoch; counts calls.
pub struct OneHot {
    pub block_len: usize,
    pub n_classes: usize,
    pub class: usize,
    pub calls: AtomicUsize,
}

#[allow(unused)]
impl OneHot {
    pub fn new(block_len: usize, n_classes: usize, class: usize) -> Self {
        Self { block_len, n_classes, class, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scorer for OneHot {
    fn block_len(&self) -> usize {
        self.block_len
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if batch.iter().any(|v| v.is_nan()) {
            return Err("NaN in scorer input".into());
        }
        let (b, l, _, _) = batch.dim();
        Ok(Array3::from_shape_fn((b, l, self.n_classes), |(_, _, k)| {
            if k == self.class { 1.0 } else { 0.0 }
        }))
    }
}

#[allow(unused)]
/// Returns the wrong number of classes.
pub struct Malformed;

impl Scorer for Malformed {
    fn block_len(&self) -> usize {
        35
    }

    fn n_classes(&self) -> usize {
        5
    }

    fn score(&self, batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
        Ok(Array3::zeros((batch.shape()[0], batch.shape()[1], 3)))
    }
}

#[allow(unused)]
/// Always fails.
pub struct Broken;

impl Scorer for Broken {
    fn block_len(&self) -> usize {
        35
    }

    fn n_classes(&self) -> usize {
        5
    }

    fn score(&self, _batch: ArrayView4<'_, f32>) -> Result<Array3<f32>, BoxError> {
        Err("inference session closed".into())
    }
}
