//! Polyphase rational resampler matching `scipy.signal.resample_poly`.
//!
//! Algorithm:
//!   1. Reduce `dst / src` to `up / down` by GCD.
//!   2. Design a Kaiser (β = 5) lowpass with cutoff `1 / max(up, down)` of
//!      Nyquist and `2 · 10 · max(up, down) + 1` taps, scaled by `up`.
//!   3. Pad the kernel in front so its group delay lands on an output sample,
//!      and behind so enough output is produced.
//!   4. Upsample by `up` (zero insertion), convolve, keep every `down`-th
//!      sample (`upfirdn`), evaluated directly on the polyphase branches.
//!   5. Drop the delay and keep `ceil(n · up / down)` samples.
//!
//! Samples outside the signal are treated as zero.
use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::filter::design::{firwin, Window};

/// Kaiser β of the anti-alias filter.
pub const KAISER_BETA: f64 = 5.0;
/// Filter half-length in units of `max(up, down)`.
pub const HALF_LEN_FACTOR: usize = 10;

/// Resample every channel of `data` ([C, T]) from `src_sfreq` to `dst_sfreq`.
///
/// Rates are reduced to an integer ratio; the source rate is truncated to a
/// whole number of Hz first.
pub fn resample(data: &Array2<f32>, src_sfreq: f32, dst_sfreq: f32) -> Result<Array2<f32>> {
    let (up, down) = rational_approx(dst_sfreq, src_sfreq.trunc())?;
    resample_poly(data, up, down)
}

/// Resample by the rational factor `up / down` along the time axis.
pub fn resample_poly(data: &Array2<f32>, up: usize, down: usize) -> Result<Array2<f32>> {
    if up == 0 || down == 0 {
        return Err(Error::Configuration(format!("invalid resampling ratio {up}/{down}")));
    }
    let g = gcd(up, down);
    let (up, down) = (up / g, down / g);
    if up == 1 && down == 1 {
        return Ok(data.clone());
    }

    let n_in = data.ncols();
    let n_out = final_length(n_in, up, down);
    let kernel = PolyphaseKernel::new(up, down, n_in);

    let channels: Vec<ArrayView1<'_, f32>> = data.axis_iter(Axis(0)).collect();
    let rows: Vec<Vec<f32>> = channels
        .par_iter()
        .map(|row| kernel.apply(*row, n_out))
        .collect();

    let mut out = Array2::<f32>::zeros((data.nrows(), n_out));
    for (mut dst, src) in out.rows_mut().into_iter().zip(rows) {
        dst.assign(&ArrayView1::from(&src));
    }
    Ok(out)
}

struct PolyphaseKernel {
    h: Vec<f64>,
    up: usize,
    down: usize,
    skip: usize,
}

impl PolyphaseKernel {
    fn new(up: usize, down: usize, n_in: usize) -> Self {
        let max_rate = up.max(down);
        let half_len = HALF_LEN_FACTOR * max_rate;
        let mut taps = firwin(2 * half_len + 1, 1.0 / max_rate as f64, Window::Kaiser { beta: KAISER_BETA });
        taps.iter_mut().for_each(|v| *v *= up as f64);

        let n_pre_pad = down - half_len % down;
        let skip = (half_len + n_pre_pad) / down;
        let n_out = final_length(n_in, up, down);

        let mut n_post_pad = 0;
        while upfirdn_len(taps.len() + n_pre_pad + n_post_pad, n_in, up, down) < n_out + skip {
            n_post_pad += 1;
        }

        let mut h = vec![0.0; n_pre_pad];
        h.extend_from_slice(&taps);
        h.extend(std::iter::repeat(0.0).take(n_post_pad));
        Self { h, up, down, skip }
    }

    /// Output samples `skip .. skip + n_out` of `upfirdn(h, x, up, down)`.
    fn apply(&self, x: ArrayView1<'_, f32>, n_out: usize) -> Vec<f32> {
        let n_in = x.len();
        let n_h = self.h.len();
        (self.skip..self.skip + n_out)
            .map(|k| {
                // y[k] = Σ_i h[t − i·up] · x[i]  with  t = k · down
                let t = k * self.down;
                let i_max = (t / self.up).min(n_in.saturating_sub(1));
                let i_min = if t + 1 > n_h { (t + 1 - n_h).div_ceil(self.up) } else { 0 };
                if n_in == 0 || i_min > i_max {
                    return 0.0;
                }
                (i_min..=i_max)
                    .map(|i| self.h[t - i * self.up] * x[i] as f64)
                    .sum::<f64>() as f32
            })
            .collect()
    }
}

/// Length of `upfirdn` output for a kernel of `n_h` taps.
fn upfirdn_len(n_h: usize, n_in: usize, up: usize, down: usize) -> usize {
    let padded_in = n_in + n_h.div_ceil(up) - 1;
    (padded_in * up).div_ceil(down)
}

/// Reduce `dst / src` to a coprime integer pair `(up, down)`.
///
/// Rates are taken to millihertz precision.
pub fn rational_approx(dst: f32, src: f32) -> Result<(usize, usize)> {
    if !(dst > 0.0 && src > 0.0) {
        return Err(Error::Configuration(format!("cannot resample {src} Hz to {dst} Hz")));
    }
    let up0 = (dst as f64 * 1000.0).round() as usize;
    let down0 = (src as f64 * 1000.0).round() as usize;
    let g = gcd(up0, down0);
    Ok((up0 / g, down0 / g))
}

/// Output length: `ceil(n · up / down)`.
pub fn final_length(n: usize, up: usize, down: usize) -> usize {
    (n * up).div_ceil(down)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_passthrough() {
        let data = Array2::from_shape_fn((2, 512), |(_, t)| t as f32);
        let out = resample(&data, 128.0, 128.0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn lengths_round_up() {
        assert_eq!(final_length(1000, 1, 2), 500);
        assert_eq!(final_length(1001, 1, 2), 501);
        assert_eq!(final_length(3000, 16, 25), 1920);
        let out = resample(&Array2::zeros((1, 1001)), 256.0, 128.0).unwrap();
        assert_eq!(out.ncols(), 501);
    }

    #[test]
    fn rational_ratios() {
        assert_eq!(rational_approx(128.0, 256.0).unwrap(), (1, 2));
        assert_eq!(rational_approx(128.0, 200.0).unwrap(), (16, 25));
        assert_eq!(rational_approx(64.0, 256.0).unwrap(), (1, 4));
        assert!(rational_approx(128.0, 0.0).is_err());
    }

    #[test]
    fn dc_preserved_in_interior() {
        let data = Array2::from_elem((1, 4000), 2.5_f32);
        let out = resample(&data, 200.0, 128.0).unwrap();
        assert_eq!(out.ncols(), 2560);
        // Edges see zero padding; the interior must be flat.
        for &v in out.slice(ndarray::s![0, 200..2360]).iter() {
            approx::assert_abs_diff_eq!(v, 2.5, epsilon = 2e-2);
        }
    }

    #[test]
    fn upsampling_tracks_slow_sine() {
        let n = 2000;
        let data = Array2::from_shape_fn((1, n), |(_, t)| (t as f32 * 0.01).sin());
        let out = resample(&data, 64.0, 128.0).unwrap();
        assert_eq!(out.ncols(), 2 * n);
        for k in (400..3600).step_by(37) {
            let expected = (k as f32 * 0.005).sin();
            approx::assert_abs_diff_eq!(out[[0, k]], expected, epsilon = 1e-2);
        }
    }

    #[test]
    fn downsampling_keeps_aligned_samples() {
        // Slow cosine at 256 Hz, halved: output k ≈ input 2k.
        let n = 4096;
        let data = Array2::from_shape_fn((1, n), |(_, t)| (t as f32 * 0.02).cos());
        let out = resample(&data, 256.0, 128.0).unwrap();
        for k in (200..1800).step_by(53) {
            approx::assert_abs_diff_eq!(out[[0, k]], data[[0, 2 * k]], epsilon = 1e-2);
        }
    }
}
