use anyhow::{Context, Result};
use clap::Parser;
use corpnum_linker::{Linker, LinkerConfig, OutputPaths, ScorerKind};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corpnum-linker")]
#[command(about = "Attach corporate numbers from the national registry to company rows")]
struct Args {
    /// Workbook directory (one CSV per sheet)
    #[arg(short, long)]
    workbook: PathBuf,

    /// Registry feed: a CSV file or a directory containing one
    #[arg(short, long)]
    feed: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output workbook directory (default: <workbook>_法人番号付与)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Unmatched-row report path (default: <workbook>_未マッチ一覧.csv)
    #[arg(long)]
    unmatched: Option<PathBuf>,

    /// Insert a new identifier column instead of overwriting the target column
    #[arg(long)]
    insert: bool,

    /// Minimum address score for picking among several candidates
    #[arg(long)]
    threshold: Option<u8>,

    /// Address scorer: token_set, char_overlap, char_overlap_symmetric, jaro_winkler
    #[arg(long)]
    scorer: Option<ScorerKind>,

    /// CSV file to use inside a feed directory
    #[arg(long)]
    feed_file: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LinkerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LinkerConfig::default(),
    };
    if args.insert {
        config.sheet.overwrite = false;
    }
    if let Some(threshold) = args.threshold {
        config.policy.address_threshold = threshold;
    }
    if let Some(scorer) = args.scorer {
        config.scorer = scorer;
    }
    if let Some(name) = args.feed_file {
        config.feed.file_name = Some(name);
    }

    let mut outputs = OutputPaths::beside(&args.workbook);
    if let Some(dir) = args.output {
        outputs.workbook_dir = dir;
    }
    if let Some(path) = args.unmatched {
        outputs.unmatched_report = path;
    }

    info!("corpnum-linker starting...");
    info!("Workbook: {}", args.workbook.display());
    info!("Feed: {}", args.feed.display());

    let linker = Linker::new(config).context("Invalid configuration")?;
    let summary = linker
        .run(&args.workbook, &args.feed, &outputs)
        .context("Linking run failed")?;

    println!("\n{}", summary);

    Ok(())
}
