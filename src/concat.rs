//! Join many file tables into one, in natural filename order.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::metrics::{Measure, MetricsRecorder, EXECUTION_TIME};
use crate::store::{AccessMode, FileStore, TradeStore};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcatStats {
    pub inputs: Vec<PathBuf>,
    pub records: usize,
}

/// Files matching `pattern`, ordered so `f2` sorts before `f10`.
pub fn resolve_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|err| Error::Configuration(format!("invalid pattern {pattern:?}: {err}")))?;
    let mut inputs = Vec::new();
    for entry in paths {
        inputs.push(entry.map_err(|err| Error::Io(err.into()))?);
    }
    inputs.sort_by(|a, b| natord::compare(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(inputs)
}

/// Append every table matching `pattern` to `output`.
///
/// Rows keep their per-file order; files are taken in natural name order.
/// The output itself is skipped if the pattern matches it.
pub fn concat(pattern: &str, output: &Path, metrics: &dyn MetricsRecorder) -> Result<ConcatStats> {
    metrics.define(EXECUTION_TIME, Measure::execution_time())?;
    log::info!("{:10}: concat start", "BEGIN");

    let inputs: Vec<PathBuf> = resolve_inputs(pattern)?
        .into_iter()
        .filter(|path| !same_file(path, output))
        .collect();
    if inputs.is_empty() {
        log::warn!("{:10}: no files match {pattern}", "IN_CACHE");
    }

    log::info!("{:10}: creating {}", "OUT_CACHE", output.display());
    let sink = FileStore::open(output, AccessMode::Write)?;

    let started = Instant::now();
    let mut records = 0;
    for path in &inputs {
        log::info!("{:10}: reading {}", "IN_CACHE", path.display());
        let source = FileStore::open(path, AccessMode::Read)?;
        let table = source.get_all()?;
        sink.put_batch(table.records())?;
        records += table.len();
    }

    metrics.put(EXECUTION_TIME, started.elapsed().as_secs_f64())?;
    metrics.record()?;
    log::info!("{:10}: concat complete ({records} trades)", "END");
    Ok(ConcatStats { inputs, records })
}

/// Whether `a` and `b` name the same file, however each is spelled.
///
/// Parents are canonicalized; the file itself may not exist yet.
fn same_file(a: &Path, b: &Path) -> bool {
    if a.file_name() != b.file_name() {
        return false;
    }
    let parent = |path: &Path| {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        dir.canonicalize().unwrap_or(dir)
    };
    parent(a) == parent(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn inputs_sort_numerically() {
        let dir = tempdir().expect("tempdir");
        for name in ["t.10.csv", "t.2.csv", "t.1.csv", "t.0.csv", "s.5.csv"] {
            std::fs::write(dir.path().join(name), "tradenum\n").expect("write");
        }
        let pattern = dir.path().join("*.csv");
        let names: Vec<_> = resolve_inputs(&pattern.to_string_lossy())
            .expect("inputs")
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["s.5.csv", "t.0.csv", "t.1.csv", "t.2.csv", "t.10.csv"]);
    }

    #[test]
    fn same_file_ignores_spelling() {
        let dir = tempdir().expect("tempdir");
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).expect("mkdir");
        let plain = dir.path().join("m.csv");
        assert!(same_file(&plain, &sub.join("..").join("m.csv")));
        assert!(same_file(&plain, &dir.path().join(".").join("m.csv")));
        assert!(!same_file(&plain, &sub.join("m.csv")));
        assert!(!same_file(&plain, &dir.path().join("n.csv")));
    }

    #[test]
    fn bad_pattern_is_configuration_error() {
        assert!(matches!(resolve_inputs("[unclosed"), Err(Error::Configuration(_))));
    }
}
