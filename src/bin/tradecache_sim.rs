use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use tradecache::cli::{CacheArgs, CommonArgs};
use tradecache::config::expand_config_args;
use tradecache::runner::{resolve_range, results_path, Runner, SyntheticCompute};
use tradecache::{connect, AccessMode, StoreConfig};

#[derive(Parser)]
#[command(name = "tradecache-sim", args_override_self = true)]
#[command(about = "Compute a result for each cached trade and store the results")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    cache: CacheArgs,

    /// Directory for the results file (filesystem cache only)
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// First trade number to process (default: first trade in the file)
    #[arg(short = 's', long)]
    start_trade: Option<i64>,

    /// Number of trades to process (default: all trades in the file)
    #[arg(short = 'w', long)]
    trade_window: Option<usize>,

    /// Startup delay per trade in seconds
    #[arg(long, default_value_t = 0)]
    delay_start: u64,

    /// Memory touched per trade in MB
    #[arg(long, default_value_t = 16)]
    mem_usage: usize,

    /// Busy time per trade in milliseconds
    #[arg(long, default_value_t = 20)]
    task_duration: u64,

    /// Probability of an injected failure per trade
    #[arg(long, default_value_t = 0.0)]
    failure: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(expand_config_args(std::env::args_os())?);
    cli.common.init_logging();
    let recorder = cli.common.recorder("sim")?;
    info!("{:16}: sim starting", "BEGIN");

    let config = cli.cache.options().resolve()?;
    let (input, output) = match config.file_path() {
        Some(path) => {
            let output_dir = match &cli.output_path {
                Some(dir) => dir.clone(),
                None => path.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
            };
            let results = results_path(path, &output_dir);
            info!("{:16}: {}", "RESULTS", results.display());
            let input = connect(&config, AccessMode::Read).context("failed to open input")?;
            let output = connect(&StoreConfig::file(results), AccessMode::Write)
                .context("failed to open results")?;
            (input, Some(output))
        }
        None => (
            connect(&config, AccessMode::ReadWrite).context("failed to open cache")?,
            None,
        ),
    };
    let output = output.as_ref().unwrap_or(&input);

    let (start, window) = resolve_range(&input, cli.start_trade, cli.trade_window)?;
    let compute = SyntheticCompute {
        delay_start: Duration::from_secs(cli.delay_start),
        task_duration: Duration::from_millis(cli.task_duration),
        mem_usage_mb: cli.mem_usage,
        failure: cli.failure,
    };
    let mut rng = rand::thread_rng();

    let stats = Runner::new(&input, output, &recorder)
        .run(start, window, |trade| compute.compute(&mut rng, trade))?;

    info!(
        "{:16}: processed={} batches={} compute={:.6}s",
        "END",
        stats.processed,
        stats.batches_written,
        stats.compute_time.as_secs_f64()
    );
    Ok(())
}
