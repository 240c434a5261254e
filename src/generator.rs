//! Concurrent batch generation of trade ranges into a store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::metrics::{Measure, MetricsRecorder, EXECUTION_TIME};
use crate::record::Table;
use crate::store::{BackendKind, TradeStore};
use crate::{Error, Result};

/// Upper bound on records per `put_batch` call.
pub const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// First trade id.
    pub start: i64,
    /// Number of trades to generate.
    pub window: usize,
    /// Worker count.
    pub parallelism: usize,
    /// Cap on the per-chunk batch size.
    pub max_batch: usize,
}

impl GeneratorConfig {
    pub fn new(start: i64, window: usize, parallelism: usize) -> Self {
        Self {
            start,
            window,
            parallelism,
            max_batch: MAX_BATCH_SIZE,
        }
    }

    /// `min(max_batch, ceil(window / parallelism))`, never below 1.
    pub fn batch_size(&self) -> usize {
        let per_worker = self.window.div_ceil(self.parallelism.max(1));
        per_worker.max(1).min(self.max_batch.max(1))
    }

    /// One past the last id.
    pub fn end(&self) -> i64 {
        self.start + self.window as i64
    }

    pub fn chunk_starts(&self) -> Vec<i64> {
        let batch = self.batch_size();
        (0..self.window)
            .step_by(batch)
            .map(|offset| self.start + offset as i64)
            .collect()
    }

    fn validate(&self, backend: BackendKind) -> Result<()> {
        if self.parallelism == 0 {
            return Err(Error::Configuration("parallelism must be at least 1".into()));
        }
        // File appends are order-sensitive; concurrent chunks would interleave.
        if backend == BackendKind::File && self.parallelism > 1 {
            return Err(Error::Configuration(format!(
                "file backend requires parallelism 1, got {}",
                self.parallelism
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateStats {
    pub chunks: usize,
    pub records: usize,
    pub duration: Duration,
}

/// Generate `config.window` trades into `store`.
///
/// Chunks run on a bounded pool of worker threads. The first failing chunk
/// stops the pool from taking new chunks; chunks already running finish,
/// then that first error is returned.
pub fn generate<S, F>(
    store: &S,
    config: &GeneratorConfig,
    synth: F,
    metrics: &dyn MetricsRecorder,
) -> Result<GenerateStats>
where
    S: TradeStore + ?Sized,
    F: Fn(i64, usize) -> Table + Sync,
{
    config.validate(store.kind())?;
    metrics.define(EXECUTION_TIME, Measure::execution_time())?;

    let batch = config.batch_size();
    let end = config.end();
    let chunks = config.chunk_starts();
    log::info!(
        "{:10}: threads={}, batch_size={}, start_trade={}, stop_trade={}",
        "CONFIG",
        config.parallelism,
        batch,
        config.start,
        end
    );

    let (tx, rx) = mpsc::channel::<i64>();
    for chunk_start in &chunks {
        tx.send(*chunk_start)
            .map_err(|_| Error::Configuration("chunk queue closed".into()))?;
    }
    drop(tx);

    let queue = Mutex::new(rx);
    let abort = AtomicBool::new(false);
    let first_error: Mutex<Option<Error>> = Mutex::new(None);
    let written = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let workers = config.parallelism.min(chunks.len());

    let started = Instant::now();
    thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let handle = thread::Builder::new()
                .name(format!("generator-worker-{worker_id}"))
                .spawn_scoped(scope, || loop {
                    if abort.load(Ordering::Acquire) {
                        break;
                    }
                    let next = match queue.lock() {
                        Ok(rx) => rx.recv().ok(),
                        Err(_) => None,
                    };
                    let Some(chunk_start) = next else {
                        break;
                    };
                    match create_trade_range(store, &synth, chunk_start, batch, end) {
                        Ok(count) => {
                            written.fetch_add(count, Ordering::Relaxed);
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            log::error!("{:10}: chunk at {chunk_start} failed: {err}", "BATCH");
                            abort.store(true, Ordering::Release);
                            if let Ok(mut slot) = first_error.lock() {
                                slot.get_or_insert(err);
                            }
                            break;
                        }
                    }
                })?;
            handles.push(handle);
        }
        for handle in handles {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
        Ok(())
    })?;
    let duration = started.elapsed();

    if let Some(err) = first_error
        .into_inner()
        .map_err(|_| Error::Corrupt("generator error slot poisoned"))?
    {
        return Err(err);
    }

    log::info!("{:10}: {:.5}s", "TIME", duration.as_secs_f64());
    metrics.put(EXECUTION_TIME, duration.as_secs_f64())?;
    metrics.record()?;

    Ok(GenerateStats {
        chunks: completed.into_inner(),
        records: written.into_inner(),
        duration,
    })
}

fn create_trade_range<S, F>(
    store: &S,
    synth: &F,
    chunk_start: i64,
    batch: usize,
    end: i64,
) -> Result<usize>
where
    S: TradeStore + ?Sized,
    F: Fn(i64, usize) -> Table,
{
    let stop = end.min(chunk_start + batch as i64);
    log::info!("{:10}: generating {}-{}", "BATCH", chunk_start, stop - 1);
    let table = synth(chunk_start, (stop - chunk_start) as usize);
    log::info!("{:10}: storing {}-{}", "BATCH", chunk_start, stop - 1);
    store.put_batch(table.records())?;
    Ok(table.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_is_capped_and_positive() {
        assert_eq!(GeneratorConfig::new(0, 100, 4).batch_size(), 25);
        assert_eq!(GeneratorConfig::new(0, 101, 4).batch_size(), 26);
        assert_eq!(GeneratorConfig::new(0, 1_000_000, 2).batch_size(), MAX_BATCH_SIZE);
        assert_eq!(GeneratorConfig::new(0, 0, 8).batch_size(), 1);
    }

    #[test]
    fn chunk_starts_cover_window() {
        let mut config = GeneratorConfig::new(1000, 5, 1);
        config.max_batch = 2;
        assert_eq!(config.chunk_starts(), vec![1000, 1002, 1004]);
        assert_eq!(config.end(), 1005);
        assert!(GeneratorConfig::new(3, 0, 1).chunk_starts().is_empty());
    }
}
