use hypnos::{pack, window_starts, Accumulator, BlockPolicy};
use ndarray::{Array3, Axis};

/// Coverage after sliding-window packing of `n` epochs into windows of `l`.
fn coverage(n: usize, l: usize) -> Vec<u32> {
    let epochs = Array3::<f32>::zeros((1, n, 2));
    let blocks = pack(BlockPolicy::SlidingWindow, epochs.view(), &[0], l);
    let probs = Array3::from_elem((blocks.len(), l, 3), 1.0 / 3.0);
    let mut acc = Accumulator::new(n, 3);
    acc.add_blocks(&blocks.starts, &blocks.valid, probs.view()).unwrap();
    acc.coverage().to_vec()
}

#[test]
fn every_epoch_is_covered() {
    for l in [1, 2, 3, 7, 35, 100] {
        for n in 1..=150 {
            let cov = coverage(n, l);
            assert!(cov.iter().all(|&c| c >= 1), "N={n} L={l}: {cov:?}");
        }
    }
}

#[test]
fn fifty_epochs_window_thirty_five() {
    assert_eq!(window_starts(50, 35), vec![0, 15]);
    let cov = coverage(50, 35);
    assert_eq!(cov[0], 1);
    assert_eq!(cov[20], 2);
    assert_eq!(cov[40], 1);
}

#[test]
fn final_window_always_ends_at_last_epoch() {
    for n in 36..200 {
        let starts = window_starts(n, 35);
        assert_eq!(*starts.last().unwrap() + 35, n, "N={n}");
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn sequence_blocks_tile_without_overlap() {
    let epochs = Array3::<f32>::ones((2, 257, 4));
    let blocks = pack(BlockPolicy::Sequence, epochs.view(), &[1, 0], 100);
    assert_eq!(blocks.data.len_of(Axis(0)), 3);
    assert_eq!(blocks.valid.iter().sum::<usize>(), 257);
    assert_eq!(blocks.epoch_range(2), 200..257);
    assert_eq!(blocks.data.shape(), &[3, 100, 4, 2]);
}
