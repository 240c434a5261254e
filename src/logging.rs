//! Logger bootstrap for the command-line tools.

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

/// Install the global logger: `info` by default, `debug` when verbose.
/// `RUST_LOG` still takes precedence.
pub fn init(verbose: bool, no_color: bool) {
    let mut builder = Builder::new();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    builder.parse_default_env();
    if no_color {
        builder.write_style(WriteStyle::Never);
    }
    let _ = builder.try_init();
}
