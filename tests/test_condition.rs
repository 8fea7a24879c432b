use hypnos::{condition, postprocess, FamilyConfig};
use ndarray::{Array1, Array2};

fn mix(n_ch: usize, sfreq: f32, secs: f32) -> Array2<f32> {
    let n_t = (secs * sfreq) as usize;
    Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let x = t as f32 / sfreq;
        (x * 2.0 * std::f32::consts::PI * (4.0 + c as f32)).sin() * 25e-6
            + (x * 2.0 * std::f32::consts::PI * 0.8).cos() * 10e-6
    })
}

#[test]
fn psg_resamples_200_hz_to_128() {
    // 40 epochs and 12 s of remainder at 200 Hz.
    let out = condition(mix(3, 200.0, 40.0 * 30.0 + 12.0), 200.0, &FamilyConfig::psg()).unwrap();
    assert_eq!(out.epochs.shape(), &[3, 40, 3840]);
    assert_eq!(out.n_raw_epochs, 40);
    assert!(out.epochs.iter().all(|v| v.is_finite()));
}

#[test]
fn forehead_resamples_250_hz_to_64() {
    let out = condition(mix(2, 250.0, 12.0 * 30.0), 250.0, &FamilyConfig::forehead()).unwrap();
    assert_eq!(out.epochs.shape(), &[2, 12, 1920]);
    assert_eq!(out.n_raw_epochs, 12);
}

#[test]
fn flat_channel_stays_finite() {
    let mut data = mix(2, 128.0, 4.0 * 30.0);
    data.row_mut(1).fill(0.0);
    for family in [FamilyConfig::psg(), FamilyConfig::forehead()] {
        let out = condition(data.clone(), 128.0, &family).unwrap();
        assert!(out.epochs.iter().all(|v| v.is_finite()), "{}", family.name);
    }
}

#[test]
fn truncation_to_raw_epochs_is_idempotent() {
    // Model output covering more epochs than the raw recording held.
    let probs = Array2::from_shape_fn((12, 5), |(e, k)| if (e + k) % 5 == 0 { 0.9 } else { 0.025 });
    let family = FamilyConfig::psg();
    let once = postprocess(probs, 10, &family).unwrap();
    let twice = postprocess(once.probabilities.clone(), 10, &family).unwrap();
    assert_eq!(once.n_epochs(), 10);
    assert_eq!(once.hypnogram, twice.hypnogram);
    assert_eq!(once.probabilities, twice.probabilities);
}

#[test]
fn psg_labels_skip_four() {
    let probs = Array2::from_shape_fn((5, 5), |(e, k)| if e == k { 1.0 } else { 0.0 });
    let out = postprocess(probs, 5, &FamilyConfig::psg()).unwrap();
    assert_eq!(out.hypnogram, vec![0, 1, 2, 3, 5]);
    let counts = out.hypnogram.iter().fold(Array1::<u32>::zeros(7), |mut acc, &s| {
        acc[s as usize] += 1;
        acc
    });
    assert_eq!(counts[4], 0);
}
