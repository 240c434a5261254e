//! Read trades one by one, compute a result per trade, write results back.
//!
//! The compute step is an opaque callback; this module only owns the
//! read/compute/flush loop and its accounting.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::metrics::{Aggregation, Measure, MetricsRecorder, COMPUTE_TIME, EXECUTION_TIME, FAILED};
use crate::record::{Record, Table};
use crate::store::{BackendKind, Store, TradeStore};
use crate::{Error, Result};

/// Results buffered before one `put_batch`.
pub const OUT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub processed: usize,
    pub batches_written: usize,
    pub compute_time: Duration,
    pub duration: Duration,
}

/// Results file for a file-backed run: `<output_dir>/<stem>.results<ext>`.
pub fn results_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}.results.{}", ext.to_string_lossy()),
        None => format!("{stem}.results"),
    };
    output_dir.join(name)
}

/// Fill in a missing start id or window from the input table.
///
/// The remote backend starts at id 0 by default and needs an explicit window.
pub fn resolve_range(input: &Store, start: Option<i64>, window: Option<usize>) -> Result<(i64, usize)> {
    let start = match start {
        Some(start) => start,
        None if input.kind() == BackendKind::Remote => {
            log::info!("{:16}: --start-trade=0", "AUTO_ARG");
            0
        }
        None => {
            let first = input.get_first()?;
            let start = first.tradenum().ok_or_else(|| {
                Error::MissingKeyColumn(crate::record::KEY_COLUMN.to_string())
            })?;
            log::info!("{:16}: --start-trade={start}", "AUTO_ARG");
            start
        }
    };
    let window = match window {
        Some(window) => window,
        None => {
            let window = input.get_count()?;
            log::info!("{:16}: --trade-window={window}", "AUTO_ARG");
            window
        }
    };
    if window == 0 {
        return Err(Error::Configuration("no trades to process".into()));
    }
    Ok((start, window))
}

pub struct Runner<'a> {
    input: &'a dyn TradeStore,
    output: &'a dyn TradeStore,
    metrics: &'a dyn MetricsRecorder,
    out_batch_size: usize,
}

impl<'a> Runner<'a> {
    pub fn new(
        input: &'a dyn TradeStore,
        output: &'a dyn TradeStore,
        metrics: &'a dyn MetricsRecorder,
    ) -> Self {
        Self {
            input,
            output,
            metrics,
            out_batch_size: OUT_BATCH_SIZE,
        }
    }

    pub fn out_batch_size(mut self, size: usize) -> Self {
        self.out_batch_size = size.max(1);
        self
    }

    /// Process ids `start .. start + window` in order.
    ///
    /// A compute failure records `failed = 1` and aborts the run; results
    /// buffered but not yet flushed are dropped.
    pub fn run<F>(&self, start: i64, window: usize, mut compute: F) -> Result<RunStats>
    where
        F: FnMut(&Record) -> Result<Record>,
    {
        self.metrics.define(EXECUTION_TIME, Measure::execution_time())?;
        self.metrics.define(
            COMPUTE_TIME,
            Measure::float(
                "time to compute one trade result",
                "s",
                Aggregation::Sum,
            ),
        )?;
        self.metrics
            .define(FAILED, Measure::int("calculation failed", "count", Aggregation::LastValue))?;
        self.metrics.put(FAILED, 0.0)?;

        log::info!("{:16}: START={start}, COUNT={window}", "TRADE");
        let started = Instant::now();
        let stop = start + window as i64;
        let mut stats = RunStats::default();
        let mut results = Table::new();

        for tradenum in start..stop {
            let trade = self.input.get_one(tradenum)?;
            log::debug!("TRADE {tradenum:>10}: READ {trade:?}");

            let compute_started = Instant::now();
            let result = match compute(&trade) {
                Ok(result) => result,
                Err(err) => {
                    log::error!("TRADE {tradenum:>10}: FAILED {err}");
                    self.metrics.put(FAILED, 1.0)?;
                    self.metrics.record()?;
                    return Err(err);
                }
            };
            let elapsed = compute_started.elapsed();
            log::info!("TRADE {tradenum:>10}: COMPUTE {:.12}", elapsed.as_secs_f64());
            self.metrics.put(COMPUTE_TIME, elapsed.as_secs_f64())?;
            stats.compute_time += elapsed;
            stats.processed += 1;
            results.push(result);

            if results.len() >= self.out_batch_size {
                self.flush(&mut results, &mut stats)?;
                log::info!("TRADE {tradenum:>10}: WRITE");
            }
        }
        if !results.is_empty() {
            self.flush(&mut results, &mut stats)?;
            log::info!("TRADE {:>10}: WRITE", stop - 1);
        }

        stats.duration = started.elapsed();
        log::info!("{:16}: {:.12}", "TASKTIME", stats.duration.as_secs_f64());
        self.metrics.put(EXECUTION_TIME, stats.duration.as_secs_f64())?;
        self.metrics.record()?;
        Ok(stats)
    }

    fn flush(&self, results: &mut Table, stats: &mut RunStats) -> Result<()> {
        self.output.put_batch(results.records())?;
        results.clear();
        stats.batches_written += 1;
        Ok(())
    }
}

/// Benchmark workload: burns CPU for a while and returns a random result.
#[derive(Debug, Clone)]
pub struct SyntheticCompute {
    pub delay_start: Duration,
    pub task_duration: Duration,
    pub mem_usage_mb: usize,
    /// Probability in `[0, 1]` of failing a trade on purpose.
    pub failure: f64,
}

impl Default for SyntheticCompute {
    fn default() -> Self {
        Self {
            delay_start: Duration::ZERO,
            task_duration: Duration::from_millis(20),
            mem_usage_mb: 16,
            failure: 0.0,
        }
    }
}

impl SyntheticCompute {
    pub fn compute<R: Rng>(&self, rng: &mut R, trade: &Record) -> Result<Record> {
        let tradenum = trade
            .tradenum()
            .ok_or_else(|| Error::MissingKeyColumn(crate::record::KEY_COLUMN.to_string()))?;
        if self.failure > 0.0 && rng.gen::<f64>() < self.failure {
            return Err(Error::Compute(format!("injected failure for trade {tradenum}")));
        }
        if !self.task_duration.is_zero() {
            self.burn();
        }
        let mut result = Record::with_tradenum(tradenum);
        result.set("random", rng.gen::<f64>());
        Ok(result)
    }

    fn burn(&self) {
        let mut data = vec![1.0f64; self.mem_usage_mb * 131_072];
        std::thread::sleep(self.delay_start);
        let deadline = Instant::now() + self.task_duration;
        while Instant::now() < deadline {
            for cell in data.iter_mut() {
                *cell *= 12345.67890;
                *cell = 1.0;
            }
        }
    }
}
