use std::collections::BTreeSet;
use std::path::Path;

use tempfile::tempdir;

use tradecache::concat::concat;
use tradecache::metrics::NoopRecorder;
use tradecache::split::split;
use tradecache::synth::generate_trades;
use tradecache::{AccessMode, Error, FileStore, Record, TradeStore};

fn write_table(path: &Path, start: i64, count: usize) {
    let writer = FileStore::open(path, AccessMode::Write).expect("writer");
    writer
        .put_batch(generate_trades(start, count).records())
        .expect("batch");
}

fn ids(path: &Path) -> Vec<i64> {
    let reader = FileStore::open(path, AccessMode::Read).expect("reader");
    reader
        .get_all()
        .expect("all")
        .iter()
        .filter_map(Record::tradenum)
        .collect()
}

#[test]
fn split_produces_ceil_windows_without_loss() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    write_table(&input, 100, 23);
    let out_dir = dir.path().join("parts");
    std::fs::create_dir(&out_dir).expect("mkdir");

    let outputs = split(&input, Some(&out_dir), 5, &NoopRecorder).expect("split");
    assert_eq!(outputs.len(), 5);
    assert_eq!(outputs[0], out_dir.join("trades.0.csv"));
    assert_eq!(outputs[4], out_dir.join("trades.4.csv"));

    let mut seen = BTreeSet::new();
    let mut total = 0;
    for (index, path) in outputs.iter().enumerate() {
        let part = ids(path);
        assert!(part.len() <= 5);
        if index < 4 {
            assert_eq!(part.len(), 5);
        }
        total += part.len();
        seen.extend(part);
    }
    assert_eq!(total, 23);
    assert_eq!(seen, (100..123).collect::<BTreeSet<_>>());
}

#[test]
fn split_defaults_to_input_directory() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    write_table(&input, 0, 4);

    let outputs = split(&input, None, 10, &NoopRecorder).expect("split");
    assert_eq!(outputs, vec![dir.path().join("trades.0.csv")]);
    assert_eq!(ids(&outputs[0]), vec![0, 1, 2, 3]);
}

#[test]
fn split_rejects_zero_window() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    write_table(&input, 0, 4);
    assert!(matches!(
        split(&input, None, 0, &NoopRecorder),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn concat_follows_natural_file_order() {
    let dir = tempdir().expect("tempdir");
    // Lexical order would put f10 before f2.
    for k in 1..=10i64 {
        write_table(&dir.path().join(format!("f{k}.csv")), k * 100, 3);
    }
    let output = dir.path().join("merged.out");
    let pattern = dir.path().join("f*.csv");

    let stats = concat(pattern.to_str().expect("utf8"), &output, &NoopRecorder).expect("concat");
    assert_eq!(stats.inputs.len(), 10);
    assert_eq!(stats.records, 30);

    let expected: Vec<i64> = (1..=10i64)
        .flat_map(|k| (k * 100)..(k * 100 + 3))
        .collect();
    assert_eq!(ids(&output), expected);
}

#[test]
fn concat_skips_its_own_output_under_another_spelling() {
    let dir = tempdir().expect("tempdir");
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub).expect("mkdir");
    write_table(&dir.path().join("f1.csv"), 100, 2);
    write_table(&dir.path().join("f2.csv"), 200, 2);
    // Left behind by an earlier run.
    write_table(&dir.path().join("m.csv"), 900, 5);

    let output = sub.join("..").join("m.csv");
    let pattern = dir.path().join("*.csv");
    let stats = concat(pattern.to_str().expect("utf8"), &output, &NoopRecorder).expect("concat");
    assert_eq!(stats.inputs.len(), 2);
    assert_eq!(stats.records, 4);
    assert_eq!(ids(&dir.path().join("m.csv")), vec![100, 101, 200, 201]);
}

#[test]
fn split_then_concat_restores_table() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    write_table(&input, 0, 12);
    let parts = dir.path().join("parts");
    std::fs::create_dir(&parts).expect("mkdir");
    split(&input, Some(&parts), 1, &NoopRecorder).expect("split");

    let merged = dir.path().join("merged.csv");
    let pattern = parts.join("trades.*.csv");
    concat(pattern.to_str().expect("utf8"), &merged, &NoopRecorder).expect("concat");

    let original = FileStore::open(&input, AccessMode::Read).expect("reader");
    let restored = FileStore::open(&merged, AccessMode::Read).expect("reader");
    assert_eq!(restored.get_all().expect("all"), original.get_all().expect("all"));
}
