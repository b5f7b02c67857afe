// # redo-tail
//
// Command-line entry point: points the pipeline at a directory of redo
// files, drives it to completion (or, for an online log, until caught
// up), and writes one JSON object per logical operation to stdout.

use std::path::PathBuf;

use clap::Parser;
use redo_tail::checkpoint::CheckpointState;
use redo_tail::config::EngineConfig;
use redo_tail::dictionary::StaticDictionary;
use redo_tail::emit::JsonLineEmitter;
use redo_tail::metrics::EngineMetrics;
use redo_tail::pipeline::Pipeline;
use redo_tail::redo::format::OracleVersion;
use redo_tail::redo::reader::detect_block_size;
use redo_tail::{Result, VERSION};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "redo-tail", version = VERSION, about = "Tails Oracle redo logs and emits logical row changes as JSON lines")]
struct Args {
    /// Directory holding the redo log files to read, in sequence order.
    #[arg(long)]
    redo_dir: Option<PathBuf>,

    /// Path to a TOML config file (defaults applied for anything absent).
    #[arg(long, default_value = "rustydb.toml")]
    config: PathBuf,

    /// Path to the persisted checkpoint-state document.
    #[arg(long)]
    checkpoint_file: Option<PathBuf>,

    /// Override the redo block size instead of auto-detecting it.
    #[arg(long)]
    block_size: Option<u16>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let args = Args::parse();
    let mut config = EngineConfig::load(&args.config)?;
    if let Some(dir) = args.redo_dir {
        config.redo_dir = dir;
    }
    if let Some(checkpoint) = args.checkpoint_file {
        config.checkpoint_file = checkpoint;
    }

    info!(version = VERSION, redo_dir = %config.redo_dir.display(), "starting redo-tail");

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&config.redo_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let dictionary = StaticDictionary::new(178);
    let metrics = EngineMetrics::new();
    let stdout = std::io::stdout();
    let mut emitter = JsonLineEmitter::new(stdout.lock(), config.max_message_mb);

    let checkpoint = CheckpointState::load(&config.checkpoint_file)?;

    for path in entries {
        let block_size = match args.block_size {
            Some(b) => b,
            None => detect_block_size(&path)?,
        };
        info!(path = %path.display(), block_size, "opening redo file");

        let mut pipeline = Pipeline::new(
            &path,
            block_size as usize,
            checkpoint.sequence,
            checkpoint.block_number,
            OracleVersion::V12_1,
            &metrics,
            &config,
            &dictionary,
            &mut emitter,
        )?;
        pipeline.run()?;
    }

    let stats = metrics.snapshot();
    info!(?stats, "redo-tail finished");
    Ok(())
}
