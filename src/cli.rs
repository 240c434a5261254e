//! Argument groups shared by the binaries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::config::{self, CacheOptions, CacheType, DEFAULT_REMOTE_PORT};
use crate::metrics::StatsRecorder;
use crate::store::remote::DEFAULT_KEY_TEMPLATE;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheTypeArg {
    Redis,
    Filesystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum YesNo {
    Yes,
    No,
}

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Read extra arguments from a JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Generate verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Do not colorize output
    #[arg(long)]
    pub no_color: bool,

    /// Tags to add to metrics, as comma-separated key=value pairs
    #[arg(short = 't', long)]
    pub tags: Option<String>,
}

impl CommonArgs {
    pub fn init_logging(&self) {
        crate::logging::init(self.verbose, self.no_color);
    }

    pub fn recorder(&self, app: &str) -> Result<StatsRecorder> {
        let tags = match &self.tags {
            Some(raw) => config::parse_tags(raw)?,
            None => BTreeMap::new(),
        };
        Ok(StatsRecorder::for_app(app, tags))
    }
}

#[derive(Debug, Clone, Args)]
pub struct CacheArgs {
    /// Cache type (default: auto-detected)
    #[arg(long, value_enum)]
    pub cache_type: Option<CacheTypeArg>,

    /// Redis hostname or address
    #[arg(long)]
    pub cache_name: Option<String>,

    /// Redis port number
    #[arg(long, default_value_t = DEFAULT_REMOTE_PORT)]
    pub cache_port: u16,

    /// Cache access key
    #[arg(long)]
    pub cache_key: Option<String>,

    /// Use TLS for redis cache access
    #[arg(long, value_enum, default_value = "yes")]
    pub cache_ssl: YesNo,

    /// Key template for reading trades; `{}` is replaced by the trade id
    #[arg(long, default_value = DEFAULT_KEY_TEMPLATE)]
    pub read_key: String,

    /// Key template for writing trades
    #[arg(long, default_value = DEFAULT_KEY_TEMPLATE)]
    pub write_key: String,

    /// Filesystem path for the cache
    #[arg(long)]
    pub cache_path: Option<PathBuf>,
}

impl CacheArgs {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            cache_type: self.cache_type.map(|t| match t {
                CacheTypeArg::Redis => CacheType::Redis,
                CacheTypeArg::Filesystem => CacheType::Filesystem,
            }),
            host: self.cache_name.clone(),
            port: self.cache_port,
            password: self.cache_key.clone(),
            tls: self.cache_ssl == YesNo::Yes,
            path: self.cache_path.clone(),
            read_key: self.read_key.clone(),
            write_key: self.write_key.clone(),
        }
    }
}

/// Logical CPUs, falling back to 1.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
