use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use pdf_outline::{run_batch, BatchConfig, ExtractConfig};

#[derive(Parser)]
#[command(name = "pdf-outline", version)]
#[command(about = "Extract a title and heading outline from every PDF in a directory", long_about = None)]
struct Args {
    /// Directory scanned for *.pdf files
    #[arg(short, long, default_value = "/app/input")]
    input: PathBuf,

    /// Directory receiving one JSON outline per PDF
    #[arg(short, long, default_value = "/app/output")]
    output: PathBuf,

    /// Only keep lines that match a numbered/lettered heading pattern
    #[arg(long)]
    strict_patterns: bool,

    /// Deepest level taken from an embedded table of contents
    #[arg(long, default_value_t = 6)]
    max_toc_depth: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let extract = ExtractConfig::default()
        .with_max_toc_depth(args.max_toc_depth)
        .with_require_pattern_match(args.strict_patterns);
    let config = BatchConfig::new(args.input.clone(), args.output.clone()).with_extract_config(extract);

    let report = run_batch(&config)
        .with_context(|| format!("Failed to process {}", args.input.display()))?;

    if !report.is_success() {
        for failure in &report.failures {
            error!("{}: {}", failure.input.display(), failure.error);
        }
        anyhow::bail!("{} of {} file(s) failed", report.failures.len(), report.total());
    }
    Ok(())
}
