use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use tradecache::cli::{default_parallelism, CacheArgs, CommonArgs};
use tradecache::config::expand_config_args;
use tradecache::generator::{generate, GeneratorConfig};
use tradecache::synth::generate_trades;
use tradecache::{connect, AccessMode, BackendKind, TradeStore};

#[derive(Parser)]
#[command(name = "tradecache-generator", args_override_self = true)]
#[command(about = "Load the trade cache with randomly generated trades")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    cache: CacheArgs,

    /// First trade number to generate
    #[arg(short = 's', long, default_value_t = 0)]
    start_trade: i64,

    /// Number of trades to generate
    #[arg(short = 'w', long)]
    trade_window: usize,

    /// Worker threads (default: logical cores for redis, 1 for files)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(expand_config_args(std::env::args_os())?);
    cli.common.init_logging();
    let recorder = cli.common.recorder("generator")?;

    info!("{:10}: generator starting", "BEGIN");
    info!("{:10}: logical={}", "CORES", default_parallelism());

    let config = cli.cache.options().resolve()?;
    let store = connect(&config, AccessMode::Write).context("failed to open cache")?;
    info!("{:10}: connected", "CACHE");

    let threads = match (cli.threads, store.kind()) {
        (Some(threads), _) => threads,
        (None, BackendKind::File) => 1,
        (None, BackendKind::Remote) => default_parallelism(),
    };
    if store.kind() == BackendKind::File && cli.start_trade != 0 {
        warn!("{:10}: file output starting at trade {}", "CONFIG", cli.start_trade);
    }

    let generator = GeneratorConfig::new(cli.start_trade, cli.trade_window, threads);
    let stats = generate(&store, &generator, generate_trades, &recorder)?;

    info!(
        "{:10}: generator complete ({} trades in {} chunks)",
        "END", stats.records, stats.chunks
    );
    Ok(())
}
