//! Zero-phase FIR application by FFT overlap-add.
//!
//! The signal is extended by `N − 1` reflect-limited samples on each side,
//! convolved block-wise in the frequency domain, and the output is read back
//! with a `(N − 1) / 2` sample advance so the odd-length linear-phase filter
//! introduces no delay.
use ndarray::{Array2, ArrayViewMut1};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Filter every channel of `data` ([C, T]) in place with the odd-length
/// kernel `h`.
pub fn apply_zero_phase(data: &mut Array2<f32>, h: &[f64]) {
    for row in data.rows_mut() {
        filter_zero_phase(row, h);
    }
}

/// Filter one channel in place.
pub fn filter_zero_phase(mut x: ArrayViewMut1<'_, f32>, h: &[f64]) {
    let n_x = x.len();
    let n_h = h.len();
    if n_x == 0 || n_h == 0 {
        return;
    }

    let edge = n_h - 1;
    let delay = edge / 2;
    let signal: Vec<f64> = x.iter().map(|&v| v as f64).collect();
    let ext = reflect_limited_pad(&signal, edge);
    let n_ext = ext.len();

    let n_fft = fft_len(n_h, n_ext);
    let step = n_fft - n_h + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fwd = planner.plan_fft_forward(n_fft);
    let inv = planner.plan_fft_inverse(n_fft);

    let mut kernel = zero_padded(h, n_fft);
    fwd.process(&mut kernel);

    let mut out = vec![0.0_f64; n_ext];
    let scale = 1.0 / n_fft as f64;
    let mut start = 0;
    while start < n_ext {
        let stop = (start + step).min(n_ext);
        let mut block = zero_padded(&ext[start..stop], n_fft);
        fwd.process(&mut block);
        block.iter_mut().zip(&kernel).for_each(|(b, k)| *b *= k);
        inv.process(&mut block);

        // block[p] is the full convolution at position start + p; the
        // zero-phase output sits `delay` samples earlier.
        for (p, v) in block.iter().enumerate() {
            let Some(pos) = (start + p).checked_sub(delay) else { continue };
            if pos >= n_ext {
                break;
            }
            out[pos] += v.re * scale;
        }
        start = stop;
    }

    for (dst, src) in x.iter_mut().zip(&out[edge..edge + n_x]) {
        *dst = *src as f32;
    }
}

/// Odd reflection about each end point, `n` samples per side.  Requests
/// longer than the signal are filled with zeros beyond the reflection.
fn reflect_limited_pad(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let reach = n.min(len - 1);
    let first = x[0];
    let last = x[len - 1];

    let mut out = Vec::with_capacity(len + 2 * n);
    out.extend(std::iter::repeat(0.0).take(n - reach));
    out.extend((1..=reach).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=reach).map(|i| 2.0 * last - x[len - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n - reach));
    out
}

/// Power-of-two FFT size minimising the overlap-add cost
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn fft_len(n_h: usize, n_x: usize) -> usize {
    let min_len = 2 * n_h - 1;
    let lo = (min_len as f64).log2().ceil() as u32;
    let hi = ((n_x as f64).log2().ceil() as u32 + 1).max(lo);

    (lo..=hi)
        .map(|p| 1usize << p)
        .filter(|&n| n >= min_len)
        .map(|n| {
            let blocks = (n_x as f64 / (n - n_h + 1) as f64).ceil();
            let cost = blocks * n as f64 * ((n as f64).log2() + 1.0) + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n)
        .unwrap_or(1 << hi)
}

fn zero_padded(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    let mut buf = vec![Complex::default(); n];
    for (b, &v) in buf.iter_mut().zip(x) {
        b.re = v;
    }
    buf
}
