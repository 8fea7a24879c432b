//! Signal-quality ranking of EEG channels.
//!
//! Metrics are taken on a decimated copy of the recording (in µV):
//!
//! - amplitude exceedance: share of samples in the last 30 s above
//!   `min(500 µV, 10 × mean |x| of the other channels)`
//! - variance: share of 1 s windows in the last 30 s that are flat
//!   (std < 0.5 µV) or wild (std > 250 µV)
//! - 1/f slope: negative log-log slope of the periodogram over 1–30 Hz
//!
//! Channels failing the amplitude or variance persistence test, holding
//! non-finite samples, or matching no EEG/EOG/EMG name pattern are
//! excluded; exclusion relaxes through several tiers before giving up.
//! Survivors are scored by how far each metric sits from the mean of the
//! other survivors, and EEG channels are returned best first.
use ndarray::{s, Array2, ArrayView2, Axis};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use tracing::debug;

use crate::channels::EEG_LABELS;

const VOLTS_TO_UV: f64 = 1e6;
const MAX_ABS_UV: f64 = 500.0;
const RELATIVE_AMP_FACTOR: f64 = 10.0;
const MIN_STD_UV: f64 = 0.5;
const MAX_STD_UV: f64 = 250.0;
const ONE_OVER_F_RANGE: (f64, f64) = (1.0, 30.0);
const PERSIST_FRAC: f64 = 0.01;
const WEIGHT_AMP: f64 = 2.0;
const WEIGHT_STD: f64 = 4.0;
const WEIGHT_1F: f64 = 1.0;
const ANALYSIS_SECS: f64 = 30.0;
const CRITICAL_FRAC: f64 = 0.95;
const EPS: f64 = 1e-10;

/// Per-channel quality measurements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelQuality {
    pub amp_frac: f64,
    pub std_frac: f64,
    pub alpha: f64,
    pub amp_bad: bool,
    pub std_bad: bool,
    pub non_finite: bool,
}

impl ChannelQuality {
    pub fn noisy(&self) -> bool {
        self.amp_bad || self.std_bad || self.non_finite
    }
}

/// Rank EEG channels of `data` ([C, T], volts) by signal quality.
///
/// Returns row indices of usable EEG channels, best first.  If `names` does
/// not match the row count the channels are called `Ch0`, `Ch1`, …
pub fn rank_eeg_channels(data: &Array2<f32>, sfreq: f32, names: &[String]) -> Vec<usize> {
    let (n_ch, n_t) = data.dim();
    if n_ch == 0 || n_t == 0 || !(sfreq > 0.0) {
        return Vec::new();
    }
    let names: Vec<String> = if names.len() == n_ch {
        names.to_vec()
    } else {
        (0..n_ch).map(|i| format!("Ch{i}")).collect()
    };

    let quality = measure(data, sfreq as f64);
    let classes: Vec<NameClass> = names.iter().map(|n| NameClass::of(n)).collect();

    let Some(excluded) = exclusion_mask(&quality, &classes) else {
        debug!("every channel excluded from quality ranking");
        return Vec::new();
    };

    let scores = scores(&quality, &excluded);
    let mut eeg: Vec<usize> = (0..n_ch).filter(|&i| classes[i].eeg && !excluded[i]).collect();
    eeg.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    debug!("channel quality ranking: {:?}", eeg.iter().map(|&i| &names[i]).collect::<Vec<_>>());
    eeg
}

/// Quality metrics for every channel of `data` ([C, T], volts).
pub fn measure(data: &Array2<f32>, sfreq: f64) -> Vec<ChannelQuality> {
    let n_ch = data.nrows();
    let target_ds = (sfreq / (2.0 * ONE_OVER_F_RANGE.1.max(50.0))).min(100.0);
    let decim = ((sfreq / target_ds) as usize).max(1);
    let sr_ds = sfreq / decim as f64;
    let ds: Array2<f64> = data.slice(s![.., ..;decim]).mapv(|v| v as f64 * VOLTS_TO_UV);
    let n_ds = ds.ncols();

    let mut out = vec![ChannelQuality::default(); n_ch];
    if n_ds == 0 {
        return out;
    }
    let n_win = n_ds.min((sr_ds * ANALYSIS_SECS) as usize);
    let window = ds.slice(s![.., n_ds - n_win..]);

    amplitude(window, &mut out);
    variance(window, sr_ds, &mut out);
    for (q, row) in out.iter_mut().zip(window.rows()) {
        q.non_finite = row.iter().any(|v| !v.is_finite());
    }
    for (q, alpha) in out.iter_mut().zip(spectral_slopes(ds.view(), sr_ds)) {
        q.alpha = alpha;
    }
    out
}

fn amplitude(window: ArrayView2<'_, f64>, out: &mut [ChannelQuality]) {
    let n_ch = window.nrows();
    let n = window.ncols();
    if n == 0 {
        return;
    }
    let mean_abs: Vec<f64> = window
        .rows()
        .into_iter()
        .map(|r| r.iter().map(|v| v.abs()).sum::<f64>() / n as f64)
        .collect();
    let total: f64 = mean_abs.iter().sum();
    for (c, row) in window.rows().into_iter().enumerate() {
        let reference = if n_ch > 1 { (total - mean_abs[c]) / (n_ch - 1) as f64 } else { mean_abs[c] };
        let thr = MAX_ABS_UV.min(RELATIVE_AMP_FACTOR * reference);
        let exceed = row.iter().filter(|v| v.abs() > thr).count();
        out[c].amp_frac = exceed as f64 / n as f64;
        out[c].amp_bad = out[c].amp_frac > PERSIST_FRAC;
    }
}

fn variance(window: ArrayView2<'_, f64>, sr_ds: f64, out: &mut [ChannelQuality]) {
    let win = sr_ds as usize;
    if win == 0 {
        return;
    }
    let n_win = window.ncols() / win;
    if n_win == 0 {
        return;
    }
    for (c, row) in window.rows().into_iter().enumerate() {
        let (mut flat, mut high) = (0usize, 0usize);
        for k in 0..n_win {
            let seg = row.slice(s![k * win..(k + 1) * win]);
            let std = seg.std(0.0);
            if std < MIN_STD_UV {
                flat += 1;
            }
            if std > MAX_STD_UV {
                high += 1;
            }
        }
        let n = n_win as f64;
        out[c].std_frac = (flat + high) as f64 / n;
        out[c].std_bad = flat as f64 / n > PERSIST_FRAC || high as f64 / n > PERSIST_FRAC;
    }
}

/// Negative slope of log power against log frequency over the 1/f range,
/// one value per channel.  Zero when the range holds fewer than two bins.
fn spectral_slopes(ds: ArrayView2<'_, f64>, sr_ds: f64) -> Vec<f64> {
    let (n_ch, n) = ds.dim();
    let freqs: Vec<f64> = (0..n / 2 + 1).map(|k| k as f64 * sr_ds / n as f64).collect();
    let bins: Vec<usize> = (0..freqs.len())
        .filter(|&k| freqs[k] >= ONE_OVER_F_RANGE.0 && freqs[k] <= ONE_OVER_F_RANGE.1)
        .collect();
    if bins.len() < 2 {
        return vec![0.0; n_ch];
    }
    let xf: Vec<f64> = bins.iter().map(|&k| freqs[k].ln()).collect();
    let xm = xf.iter().sum::<f64>() / xf.len() as f64;
    let denom: f64 = xf.iter().map(|x| (x - xm).powi(2)).sum();
    if denom <= EPS {
        return vec![0.0; n_ch];
    }

    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    let last = n / 2;
    ds.axis_iter(Axis(0))
        .map(|row| {
            let mut buf: Vec<Complex<f64>> = row.iter().map(|&v| Complex::new(v, 0.0)).collect();
            fft.process(&mut buf);
            let log_psd: Vec<f64> = bins
                .iter()
                .map(|&k| {
                    let mut p = buf[k].norm_sqr() / (sr_ds * n as f64);
                    if k != 0 && k != last {
                        p *= 2.0;
                    }
                    (p + 1e-20).ln()
                })
                .collect();
            let ym = log_psd.iter().sum::<f64>() / log_psd.len() as f64;
            let numer: f64 = xf.iter().zip(&log_psd).map(|(x, y)| (x - xm) * (y - ym)).sum();
            -numer / denom
        })
        .collect()
}

/// Name-pattern classes, matched on whole word tokens.
#[derive(Debug, Clone, Copy, Default)]
struct NameClass {
    eeg: bool,
    eog: bool,
    emg: bool,
}

impl NameClass {
    fn of(name: &str) -> Self {
        let tokens: Vec<String> = name
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_uppercase())
            .collect();
        let any = |pred: &dyn Fn(&str) -> bool| tokens.iter().any(|t| pred(t.as_str()));

        let eeg = any(&|t: &str| t == "EEG" || EEG_LABELS.contains(&t));
        let eog = !eeg
            && any(&|t: &str| {
                matches!(t, "EOG" | "LOC" | "ROC")
                    || (t.len() > 1 && t.starts_with('E') && t[1..].bytes().all(|b| b.is_ascii_digit()))
            });
        let emg = any(&|t: &str| matches!(t, "EMG" | "CHIN" | "SUBMENTAL" | "MENT"));
        Self { eeg, eog, emg }
    }

    fn any(&self) -> bool {
        self.eeg || self.eog || self.emg
    }
}

/// Exclusion mask after relaxing through the fallback tiers; `None` when
/// even the last tier excludes everything.
fn exclusion_mask(quality: &[ChannelQuality], classes: &[NameClass]) -> Option<Vec<bool>> {
    let tiers: [&dyn Fn(usize) -> bool; 4] = [
        &|i| quality[i].noisy() || !classes[i].any(),
        &|i| quality[i].noisy(),
        &|i| {
            quality[i].non_finite
                || quality[i].amp_frac >= CRITICAL_FRAC
                || quality[i].std_frac >= CRITICAL_FRAC
        },
        &|i| quality[i].non_finite,
    ];
    tiers.iter().find_map(|tier| {
        let mask: Vec<bool> = (0..quality.len()).map(|i| tier(i)).collect();
        (!mask.iter().all(|&m| m)).then_some(mask)
    })
}

/// Weighted deviation of each metric from the mean of the other surviving
/// channels.  Excluded channels score infinity.
fn scores(quality: &[ChannelQuality], excluded: &[bool]) -> Vec<f64> {
    let kept: Vec<usize> = (0..quality.len()).filter(|&i| !excluded[i]).collect();
    let mut scores = vec![f64::INFINITY; quality.len()];
    let n = kept.len();
    if n == 0 {
        return scores;
    }
    if n == 1 {
        scores[kept[0]] = 0.0;
        return scores;
    }

    let sum = |f: fn(&ChannelQuality) -> f64| kept.iter().map(|&i| f(&quality[i])).sum::<f64>();
    let (amp_sum, std_sum, alpha_sum) = (sum(|q| q.amp_frac), sum(|q| q.std_frac), sum(|q| q.alpha));
    let others = (n - 1) as f64;
    for &i in &kept {
        let q = &quality[i];
        let ref_amp = (amp_sum - q.amp_frac) / others;
        let ref_std = (std_sum - q.std_frac) / others;
        let ref_alpha = (alpha_sum - q.alpha) / others;
        let amp_score = (q.amp_frac / (ref_amp + EPS) - 1.0).abs();
        let std_score = (q.std_frac / (ref_std + EPS) - 1.0).abs();
        let one_f_score = if ref_alpha.abs() > EPS { (q.alpha / ref_alpha - 1.0).abs() } else { 0.0 };
        scores[i] = WEIGHT_AMP * amp_score + WEIGHT_STD * std_score + WEIGHT_1F * one_f_score;
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// 60 s at 1 kHz of a 20 µV sine per channel, in volts.
    fn clean(n_ch: usize) -> Array2<f32> {
        Array2::from_shape_fn((n_ch, 60_000), |(c, t)| {
            ((t as f32 * 0.013 + c as f32).sin() * 20e-6) as f32
        })
    }

    #[test]
    fn name_patterns_use_whole_tokens() {
        assert!(NameClass::of("EEG C3-A2").eeg);
        assert!(NameClass::of("c4").eeg);
        assert!(!NameClass::of("EEG_C3").eog);
        assert!(NameClass::of("E12").eog);
        assert!(NameClass::of("ROC-A1").eeg, "mastoid token makes it EEG");
        assert!(NameClass::of("Chin EMG").emg);
        assert!(!NameClass::of("Pleth").any());
    }

    #[test]
    fn flat_channel_ranked_out() {
        let mut data = clean(3);
        data.row_mut(1).fill(0.0);
        let ranked = rank_eeg_channels(&data, 1000.0, &names(&["C3", "C4", "O1"]));
        assert!(!ranked.contains(&1));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn non_eeg_names_not_returned() {
        let data = clean(3);
        let ranked = rank_eeg_channels(&data, 1000.0, &names(&["C3", "EOG L", "Chin"]));
        assert_eq!(ranked, vec![0]);
    }

    #[test]
    fn nan_channel_excluded() {
        let mut data = clean(2);
        data[[0, 59_900]] = f32::NAN;
        let ranked = rank_eeg_channels(&data, 1000.0, &names(&["C3", "C4"]));
        assert_eq!(ranked, vec![1]);
    }

    #[test]
    fn empty_input() {
        assert!(rank_eeg_channels(&Array2::zeros((0, 10)), 100.0, &[]).is_empty());
    }
}
