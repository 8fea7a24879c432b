//! Text tables handed to the persistence layer.
//!
//! Hypnogram:
//! ```text
//! sleep_stage
//! 0
//! 2
//! ```
//! Probabilities (6-decimal fixed point, optional trailing zero column):
//! ```text
//! Epoch,Wake,N1,N2,N3,REM,Art
//! 0,0.910000,0.020000,0.050000,0.010000,0.010000,0.000000
//! ```
use std::io::Write;

use ndarray::Array2;

use crate::postprocess::STAGE_NAMES;
use crate::stats::SleepStats;

/// One integer stage code per line under a `sleep_stage` header.
pub fn write_hypnogram<W: Write>(mut w: W, hypnogram: &[u8]) -> std::io::Result<()> {
    writeln!(w, "sleep_stage")?;
    for stage in hypnogram {
        writeln!(w, "{stage}")?;
    }
    Ok(())
}

/// Epoch index followed by every probability column.  With `unused_column`
/// each row gets an extra `0.000000`.
pub fn write_probabilities<W: Write>(
    mut w: W,
    probabilities: &Array2<f32>,
    unused_column: bool,
) -> std::io::Result<()> {
    writeln!(w, "Epoch,{}", STAGE_NAMES.join(","))?;
    for (e, row) in probabilities.rows().into_iter().enumerate() {
        write!(w, "{e}")?;
        for p in row.iter() {
            write!(w, ",{p:.6}")?;
        }
        if unused_column {
            write!(w, ",{:.6}", 0.0)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// `Metric,Value` table with two decimals.
pub fn write_stats<W: Write>(mut w: W, stats: &SleepStats) -> std::io::Result<()> {
    writeln!(w, "Metric,Value")?;
    for (label, value) in stats.entries() {
        writeln!(w, "{label},{value:.2}")?;
    }
    Ok(())
}
