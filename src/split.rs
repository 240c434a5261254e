//! Partition one file table into fixed-size windows.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::metrics::{Measure, MetricsRecorder, EXECUTION_TIME};
use crate::store::{AccessMode, FileStore, TradeStore};
use crate::{Error, Result};

/// Output path for window `index`: `<dir>/<stem>.<index><ext>`.
pub fn window_path(input: &Path, output_dir: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}.{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{index}"),
    };
    output_dir.join(name)
}

/// Split `input` into files of at most `window` rows, in file order.
///
/// Outputs go to `output_dir`, or next to the input when absent. Returns
/// the written paths in window order.
pub fn split(
    input: &Path,
    output_dir: Option<&Path>,
    window: usize,
    metrics: &dyn MetricsRecorder,
) -> Result<Vec<PathBuf>> {
    if window == 0 {
        return Err(Error::Configuration(
            "trade window must be a positive integer".into(),
        ));
    }
    metrics.define(EXECUTION_TIME, Measure::execution_time())?;
    log::info!("{:10}: split start", "BEGIN");

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let dir = input.parent().map(Path::to_path_buf).unwrap_or_default();
            log::info!("{:10}: --output-path={}", "AUTO_ARG", dir.display());
            dir
        }
    };

    log::info!("{:10}: connecting to {}", "IN_CACHE", input.display());
    let source = FileStore::open(input, AccessMode::Read)?;
    let trades = source.get_all()?;
    if let (Some(first), Some(last)) = (trades.first(), trades.last()) {
        log::info!(
            "{:10}: all trades {}-{}",
            "TRADES",
            first.tradenum().unwrap_or_default(),
            last.tradenum().unwrap_or_default()
        );
    }

    let started = Instant::now();
    let mut outputs = Vec::new();
    for (index, rows) in trades.records().chunks(window).enumerate() {
        let path = window_path(input, &output_dir, index);
        log::info!("{:10}: creating {}", "OUT_CACHE", path.display());
        let output = FileStore::open(&path, AccessMode::Write)?;
        log::info!(
            "{:10}: trades {}-{} (count={})",
            "SAVE",
            rows[0].tradenum().unwrap_or_default(),
            rows[rows.len() - 1].tradenum().unwrap_or_default(),
            rows.len()
        );
        output.put_batch(rows)?;
        outputs.push(path);
    }

    metrics.put(EXECUTION_TIME, started.elapsed().as_secs_f64())?;
    metrics.record()?;
    log::info!("{:10}: split complete", "END");
    Ok(outputs)
}
