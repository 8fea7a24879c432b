/// preproc: plan channels, condition a recording and write model-ready blocks
/// for an external inference runtime.
///
/// Output keys:
///   family               U8   family name
///   model_file           U8   model file matching the detected channels
///   n_groups             [1]  i32
///   n_epochs             [1]  i32  conditioned epochs
///   n_raw_epochs         [1]  i32  whole epochs in the raw recording
///   has_eog              [1]  i32  0 / 1
///   block_len            [1]  i32
///   group{g}_channels    U8   newline-separated member names
///   group{g}_blocks      [B, L, S, C]  f32
///   group{g}_starts      [B]  i32  first epoch of each block
///   group{g}_valid       [B]  i32  real epochs at the front of each block
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hypnos::{
    io::{load_recording, StWriter},
    pipeline::{pack_groups, prepare},
    quality::rank_eeg_channels,
    PipelineConfig,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Family {
    /// Full PSG, EEG×EOG ensemble, sliding windows.
    Psg,
    /// Two-channel forehead EEG, 100-epoch sequences.
    Forehead,
}

#[derive(Parser, Debug)]
#[command(name = "preproc", about = "Sleep recording → model-ready blocks")]
struct Args {
    /// Recording safetensors (`data`, `sfreq`, optional `ch_names`).
    #[arg(long)]
    input: PathBuf,

    /// blocks.safetensors output path.
    #[arg(long)]
    output: PathBuf,

    /// Model family.
    #[arg(long, value_enum, default_value_t = Family::Psg)]
    family: Family,

    /// Epochs per block; defaults to 35 (psg) or 100 (forehead).
    #[arg(long)]
    block_len: Option<usize>,

    /// Only consider these channels (comma-separated).
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<String>>,

    /// Base model name (default depends on family).
    #[arg(long)]
    model_name: Option<String>,

    /// Log a signal-quality ranking of the EEG channels.
    #[arg(long)]
    rank_channels: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let (mut cfg, default_block_len) = match args.family {
        Family::Psg => (PipelineConfig::default(), 35),
        Family::Forehead => (PipelineConfig::forehead(), 100),
    };
    cfg.requested_channels = args.channels;
    if let Some(name) = args.model_name {
        cfg.model_name = name;
    }
    let block_len = args.block_len.unwrap_or(default_block_len);

    let rec = load_recording(&args.input)?;
    info!(
        "loaded {} ch × {} samples @ {} Hz",
        rec.data.nrows(),
        rec.data.ncols(),
        rec.sfreq
    );

    if args.rank_channels {
        let ranked = rank_eeg_channels(&rec.data, rec.sfreq, &rec.ch_names);
        let names: Vec<&str> = ranked.iter().map(|&i| rec.ch_names[i].as_str()).collect();
        info!("EEG channels by quality, best first: {names:?}");
    }

    let prepared = prepare(&rec, &cfg)?;
    let groups = pack_groups(&prepared, &cfg.family, block_len);

    let mut w = StWriter::new();
    w.add_strings("family", &[cfg.family.name.to_string()]);
    w.add_strings("model_file", &[prepared.model_file.clone()]);
    w.add_indices("n_groups", &[groups.len()])?;
    w.add_indices("n_epochs", &[prepared.conditioned.n_epochs()])?;
    w.add_indices("n_raw_epochs", &[prepared.conditioned.n_raw_epochs])?;
    w.add_scalar("has_eog", prepared.plan.has_eog as i32);
    w.add_indices("block_len", &[block_len])?;
    for (g, (group, blocks)) in prepared.plan.groups.iter().zip(&groups).enumerate() {
        w.add_strings(&format!("group{g}_channels"), &group.names);
        w.add_f32_array(&format!("group{g}_blocks"), &blocks.data);
        w.add_indices(&format!("group{g}_starts"), &blocks.starts)?;
        w.add_indices(&format!("group{g}_valid"), &blocks.valid)?;
        info!("group {g}: {:?}, {} block(s)", group.names, blocks.len());
    }
    w.write(&args.output)
        .with_context(|| format!("writing blocks for {}", args.input.display()))?;
    info!("written → {}", args.output.display());

    Ok(())
}
