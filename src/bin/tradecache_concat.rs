use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use tradecache::cli::CommonArgs;
use tradecache::concat::concat;
use tradecache::config::expand_config_args;

#[derive(Parser)]
#[command(name = "tradecache-concat", args_override_self = true)]
#[command(about = "Merge trade files matching a glob into one file")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Glob pattern of trade files to merge (e.g. "trades.*.csv")
    #[arg(long)]
    cache_path: String,

    /// Merged file name
    #[arg(long)]
    output_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(expand_config_args(std::env::args_os())?);
    cli.common.init_logging();
    let recorder = cli.common.recorder("concat")?;

    let stats = concat(&cli.cache_path, &cli.output_path, &recorder)
        .with_context(|| format!("failed to concat {}", cli.cache_path))?;

    println!(
        "merged files={} trades={} into {}",
        stats.inputs.len(),
        stats.records,
        cli.output_path.display()
    );
    Ok(())
}
