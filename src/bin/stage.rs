/// stage: combine an inference runtime's block predictions into the final
/// hypnogram, probability table and sleep statistics.
///
/// Reads the metadata keys written by `preproc` and, from the predictions
/// file, one `group{g}_probs` tensor `[B, rows, K]` per group (rows ≥ the
/// block's valid epochs; padded rows are ignored).
///
/// Writes `<name>_hypnogram.csv`, `<name>_probabilities.csv` and, with
/// `--stats`, `<name>_sleep_statistics.csv` into `--out-dir`.
use anyhow::{bail, Context, Result};
use clap::Parser;
use ndarray::Ix3;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hypnos::{
    ensemble,
    io::StFile,
    postprocess,
    report::{write_hypnogram, write_probabilities, write_stats},
    Accumulator, FamilyConfig, SleepStats,
};

#[derive(Parser, Debug)]
#[command(name = "stage", about = "Block predictions → hypnogram")]
struct Args {
    /// blocks.safetensors written by `preproc`.
    #[arg(long)]
    blocks: PathBuf,

    /// Predictions safetensors with `group{g}_probs` tensors.
    #[arg(long)]
    predictions: PathBuf,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Base file name for the outputs.
    #[arg(long, default_value = "recording")]
    name: String,

    /// Also write sleep statistics.
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let meta = StFile::open(&args.blocks)?;
    let preds = StFile::open(&args.predictions)?;

    let family = match meta.strings("family")?.first().map(String::as_str) {
        Some("psg") => FamilyConfig::psg(),
        Some("forehead") => FamilyConfig::forehead(),
        other => bail!("unknown model family {other:?}"),
    };
    let n_groups = meta.count("n_groups")?;
    let n_epochs = meta.count("n_epochs")?;
    let n_raw_epochs = meta.count("n_raw_epochs")?;

    let mut per_group = Vec::with_capacity(n_groups);
    for g in 0..n_groups {
        let starts = meta.indices(&format!("group{g}_starts"))?;
        let valid = meta.indices(&format!("group{g}_valid"))?;
        let probs = preds.f32_nd::<Ix3>(&format!("group{g}_probs"))?;
        let mut acc = Accumulator::new(n_epochs, probs.shape()[2]);
        acc.add_blocks(&starts, &valid, probs.view())
            .with_context(|| format!("group {g} ({:?})", meta.strings(&format!("group{g}_channels"))))?;
        per_group.push(acc.finalize());
    }

    let scoring = postprocess(ensemble(&per_group)?, n_raw_epochs, &family)?;
    info!("{} epoch(s) staged from {n_groups} group(s)", scoring.n_epochs());

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let out = |suffix: &str| args.out_dir.join(format!("{}_{suffix}.csv", args.name));

    let path = out("hypnogram");
    write_hypnogram(BufWriter::new(File::create(&path)?), &scoring.hypnogram)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("hypnogram saved to {}", path.display());

    let path = out("probabilities");
    write_probabilities(BufWriter::new(File::create(&path)?), &scoring.probabilities, family.unused_column)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("probabilities saved to {}", path.display());

    if args.stats {
        match SleepStats::compute(&scoring.hypnogram, family.epoch_dur) {
            Some(stats) => {
                let path = out("sleep_statistics");
                write_stats(BufWriter::new(File::create(&path)?), &stats)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("sleep statistics: {}", stats.to_json());
            }
            None => info!("empty hypnogram, no statistics"),
        }
    }

    Ok(())
}
