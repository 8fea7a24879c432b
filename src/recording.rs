//! Continuous recordings handed to the pipeline.
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};

use crate::error::{Error, Result};

/// A continuous multi-channel recording.
///
/// `data` is channel-major `[C, T]` in original units.
#[derive(Debug, Clone)]
pub struct Recording {
    pub data: Array2<f32>,
    pub sfreq: f32,
    pub ch_names: Vec<String>,
}

impl Recording {
    /// Wrap an in-memory sample matrix.
    ///
    /// Channels without names are called `Ch01`, `Ch02`, …
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRecording`] when the rate is not positive or the name
    /// count does not match the row count.
    pub fn new(data: Array2<f32>, sfreq: f32, ch_names: Option<Vec<String>>) -> Result<Self> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(Error::InvalidRecording(format!("sample rate must be positive, got {sfreq}")));
        }
        let n_ch = data.nrows();
        let ch_names = ch_names.unwrap_or_else(|| (1..=n_ch).map(|i| format!("Ch{i:02}")).collect());
        if ch_names.len() != n_ch {
            return Err(Error::InvalidRecording(format!(
                "{} channel names for {n_ch} rows",
                ch_names.len()
            )));
        }
        Ok(Self { data, sfreq, ch_names })
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Copy the named channels, in the given order, into a new `[C, T]` matrix.
    ///
    /// Names are matched after trimming surrounding whitespace.
    pub fn pick(&self, names: &[String]) -> Result<Array2<f32>> {
        let rows = names
            .iter()
            .map(|want| {
                self.ch_names
                    .iter()
                    .position(|have| have.trim() == want.trim())
                    .ok_or_else(|| Error::InvalidRecording(format!("channel '{want}' not in recording")))
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(self.data.select(Axis(0), &rows))
    }
}

/// Where a recording comes from.
///
/// File-backed sources are resolved once, by a caller-supplied reader,
/// before any conditioning runs.
#[derive(Debug, Clone)]
pub enum RecordingSource {
    InMemory(Recording),
    FileBacked(PathBuf),
}

impl RecordingSource {
    pub fn resolve<F, E>(self, read: F) -> std::result::Result<Recording, E>
    where
        F: FnOnce(&Path) -> std::result::Result<Recording, E>,
    {
        match self {
            RecordingSource::InMemory(rec) => Ok(rec),
            RecordingSource::FileBacked(path) => read(&path),
        }
    }
}
