use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use tradecache::cli::CommonArgs;
use tradecache::config::expand_config_args;
use tradecache::split::split;

#[derive(Parser)]
#[command(name = "tradecache-split", args_override_self = true)]
#[command(about = "Split a trade file into fixed-size windows")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Trade file to split
    #[arg(long)]
    cache_path: PathBuf,

    /// Directory for the split files (default: next to the input)
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// Number of trades per file
    #[arg(short = 'w', long)]
    trade_window: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(expand_config_args(std::env::args_os())?);
    cli.common.init_logging();
    let recorder = cli.common.recorder("split")?;

    let outputs = split(
        &cli.cache_path,
        cli.output_path.as_deref(),
        cli.trade_window,
        &recorder,
    )
    .with_context(|| format!("failed to split {}", cli.cache_path.display()))?;

    println!("wrote {} files", outputs.len());
    Ok(())
}
