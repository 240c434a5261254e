use tempfile::tempdir;

use tradecache::synth::generate_trades;
use tradecache::{AccessMode, Error, FileStore, Record, TradeStore, Value};

#[test]
fn generated_table_round_trips_through_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("trades.csv");
    let table = generate_trades(40, 25);

    let writer = FileStore::open(&path, AccessMode::Write).expect("writer");
    writer.put_batch(&table.records()[..10]).expect("first batch");
    writer.put_batch(&table.records()[10..]).expect("second batch");
    drop(writer);

    let reader = FileStore::open(&path, AccessMode::Read).expect("reader");
    assert_eq!(reader.get_count().expect("count"), 25);
    let loaded = reader.get_all().expect("all");
    assert_eq!(loaded, &table);

    let mut ids: Vec<i64> = loaded.iter().filter_map(Record::tradenum).collect();
    ids.dedup();
    assert_eq!(ids, (40..65).collect::<Vec<_>>());
    assert_eq!(reader.get_first().expect("first").tradenum(), Some(40));
    assert_eq!(reader.get_one(52).expect("one"), table.records()[12]);
}

#[test]
fn count_matches_total_of_many_batches() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("trades.csv");
    let writer = FileStore::open(&path, AccessMode::Write).expect("writer");
    let mut total = 0;
    for (start, count) in [(0, 3), (3, 0), (3, 7), (10, 1)] {
        writer
            .put_batch(generate_trades(start, count).records())
            .expect("batch");
        total += count;
    }

    let reader = FileStore::open(&path, AccessMode::Read).expect("reader");
    assert_eq!(reader.get_count().expect("count"), total);
}

#[test]
fn absent_id_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("trades.csv");
    let writer = FileStore::open(&path, AccessMode::Write).expect("writer");
    writer.put_batch(generate_trades(0, 3).records()).expect("batch");

    let reader = FileStore::open(&path, AccessMode::Read).expect("reader");
    assert!(matches!(reader.get_one(3), Err(Error::NotFound(3))));
    assert!(matches!(reader.get_one(-1), Err(Error::NotFound(-1))));
}

#[test]
fn empty_file_has_no_first_trade() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("trades.csv");
    std::fs::write(&path, "tradenum,fx1\n").expect("write");

    let reader = FileStore::open(&path, AccessMode::Read).expect("reader");
    assert_eq!(reader.get_count().expect("count"), 0);
    assert!(matches!(reader.get_first(), Err(Error::EmptyTable)));
}

#[test]
fn hand_written_file_is_typed_per_cell() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("trades.csv");
    std::fs::write(
        &path,
        "tradenum,strike,start_date,trials\n7, 0.75 ,2017-12-29,10000\n",
    )
    .expect("write");

    let reader = FileStore::open(&path, AccessMode::Read).expect("reader");
    let trade = reader.get_one(7).expect("trade");
    assert_eq!(trade.get("strike"), Some(&Value::Float(0.75)));
    assert_eq!(trade.get("trials"), Some(&Value::Int(10_000)));
    assert!(matches!(trade.get("start_date"), Some(Value::Date(_))));
}
