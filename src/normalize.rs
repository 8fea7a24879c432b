//! Robust per-channel statistics, outlier clipping and scaling.
//!
//! `percentile`: linear interpolation between closest ranks
//!                         (NumPy's default method)
//! `clip_iqr_inplace`: x = clip(x, −20·IQR, +20·IQR)
//! `clip_mad_inplace`: x = (x − median) / MAD, then clip to ±20·IQR(x)
//! `robust_scale_inplace`: x = (x − median) / IQR
//!
//! A degenerate spread (IQR or MAD of zero) is replaced by `1`.  An all-NaN
//! channel is left untouched by the clips.
use ndarray::{Array2, ArrayViewMut1, Axis};
use rayon::prelude::*;

/// Multiple of the spread beyond which samples are clipped.
pub const CLIP_FACTOR: f64 = 20.0;

/// `q`-th percentile (0–100) of `x`, linear interpolation.  NaNs are ignored;
/// an all-NaN or empty input yields NaN.
pub fn percentile(x: &[f32], q: f64) -> f64 {
    let mut v: Vec<f64> = x.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).collect();
    percentile_sorted(sort(&mut v), q)
}

pub fn median(x: &[f32]) -> f64 {
    percentile(x, 50.0)
}

/// `(p25, p75)` from a single sort.
pub fn quartiles(x: &[f32]) -> (f64, f64) {
    let mut v: Vec<f64> = x.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).collect();
    let v = sort(&mut v);
    (percentile_sorted(v, 25.0), percentile_sorted(v, 75.0))
}

/// Interquartile range with the zero guard applied.
pub fn iqr(x: &[f32]) -> f64 {
    let (q25, q75) = quartiles(x);
    guard(q75 - q25)
}

/// Median absolute deviation with the zero guard applied.
pub fn mad(x: &[f32]) -> f64 {
    let m = median(x);
    let dev: Vec<f32> = x.iter().map(|&v| (v as f64 - m).abs() as f32).collect();
    guard(median(&dev))
}

fn sort(v: &mut Vec<f64>) -> &[f64] {
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

fn percentile_sorted(v: &[f64], q: f64) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    let rank = q / 100.0 * (v.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    v[lo] + (v[hi] - v[lo]) * (rank - lo as f64)
}

fn guard(spread: f64) -> f64 {
    if spread == 0.0 { 1.0 } else { spread }
}

/// Clip one channel to `±20·IQR` of its own values.
/// Returns the threshold used.
pub fn clip_iqr_inplace(mut x: ArrayViewMut1<'_, f32>) -> f64 {
    let values = x.to_vec();
    let thr = (CLIP_FACTOR * iqr(&values)) as f32;
    if !thr.is_nan() {
        x.mapv_inplace(|v| v.clamp(-thr, thr));
    }
    thr as f64
}

/// Normalise one channel by median/MAD, then clip to `±20·IQR` of the
/// normalised values.
pub fn clip_mad_inplace(mut x: ArrayViewMut1<'_, f32>) {
    let values = x.to_vec();
    let m = median(&values);
    let spread = mad(&values);
    x.mapv_inplace(|v| ((v as f64 - m) / spread) as f32);

    let normalised = x.to_vec();
    let thr = (CLIP_FACTOR * iqr(&normalised)) as f32;
    if !thr.is_nan() {
        x.mapv_inplace(|v| v.clamp(-thr, thr));
    }
}

/// `(x − median) / IQR` for one channel.
pub fn robust_scale_inplace(mut x: ArrayViewMut1<'_, f32>) {
    let values = x.to_vec();
    let m = median(&values);
    let spread = iqr(&values);
    x.mapv_inplace(|v| ((v as f64 - m) / spread) as f32);
}

/// Apply `f` to every row of `data` ([C, T]), channels in parallel.
pub fn per_channel_inplace<F>(data: &mut Array2<f32>, f: F)
where
    F: Fn(ArrayViewMut1<'_, f32>) + Sync,
{
    let mut rows: Vec<ArrayViewMut1<'_, f32>> = data.axis_iter_mut(Axis(0)).collect();
    rows.par_iter_mut().for_each(|row| f(row.view_mut()));
}
