//! Windowed-sinc FIR design.
//!
//! Highpass (MNE `raw.filter(l_freq, None)` defaults):
//!   • transition bandwidth = min(max(0.25 · l_freq, 2.0), l_freq)
//!   • length               = ceil(3.3 / trans_bw · sfreq), rounded up to odd
//!   • Hamming window, cutoff at the middle of the transition band,
//!     spectral inversion of the lowpass prototype
//!
//! Lowpass (anti-alias filter of the polyphase resampler):
//!   • Kaiser window, β = 5.0, unit DC gain
use std::f64::consts::PI;

/// Taper applied to the ideal sinc response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    Hamming,
    Kaiser { beta: f64 },
}

impl Window {
    /// Window coefficients of length `n`.
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        if n == 1 {
            return vec![1.0];
        }
        let span = (n - 1) as f64;
        match self {
            Window::Hamming => (0..n)
                .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / span).cos())
                .collect(),
            Window::Kaiser { beta } => {
                let denom = bessel_i0(beta);
                (0..n)
                    .map(|i| {
                        let r = 2.0 * i as f64 / span - 1.0;
                        bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / denom
                    })
                    .collect()
            }
        }
    }
}

/// Modified Bessel function of the first kind, order 0 (power series).
pub fn bessel_i0(x: f64) -> f64 {
    let q = x * x / 4.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..500 {
        term *= q / (k as f64 * k as f64);
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
    }
    sum
}

/// Lowpass FIR of `n` taps with `cutoff` as a fraction of Nyquist, scaled to
/// unit DC gain.
///
/// `n` must be odd so the filter is linear-phase with an integer delay.
pub fn firwin(n: usize, cutoff: f64, window: Window) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin expects an odd tap count");
    let alpha = (n - 1) as f64 / 2.0;
    let win = window.coefficients(n);

    let mut h: Vec<f64> = win
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { cutoff } else { (PI * cutoff * x).sin() / (PI * x) };
            sinc * w
        })
        .collect();

    let dc: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= dc);
    h
}

/// Number of taps of the default highpass at `l_freq` for rate `sfreq`.
pub fn highpass_length(l_freq: f32, sfreq: f32) -> usize {
    let trans_bw = (0.25 * l_freq).max(2.0).min(l_freq);
    let n = (3.3 / trans_bw as f64 * sfreq as f64).ceil() as usize;
    n | 1
}

/// Zero-phase highpass FIR at `l_freq` Hz.
pub fn design_highpass(l_freq: f32, sfreq: f32) -> Vec<f64> {
    let trans_bw = (0.25 * l_freq).max(2.0).min(l_freq) as f64;
    let n = highpass_length(l_freq, sfreq);
    let cutoff_hz = l_freq as f64 - trans_bw / 2.0;
    let nyq = sfreq as f64 / 2.0;

    let mut h = firwin(n, cutoff_hz / nyq, Window::Hamming);
    h.iter_mut().for_each(|v| *v = -*v);
    h[n / 2] += 1.0;
    h
}
