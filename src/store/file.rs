use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::codec::{decode_row, encode_row};
use crate::record::{Record, Table, KEY_COLUMN};
use crate::store::{check_key_column, AccessMode, BackendKind, TradeStore};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug)]
struct FileState {
    load: LoadState,
    add_header: bool,
    columns: Option<Vec<String>>,
}

#[derive(Debug)]
struct LoadedTable {
    table: Table,
    index: HashMap<i64, usize>,
}

/// Store over one delimited text file.
///
/// A read handle loads the whole file once, on first access, and serves all
/// later reads from that snapshot without locking. A write handle truncates
/// the file and writes the header on its first non-empty batch, then appends.
/// The mutex guards both the load transition and every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    mode: AccessMode,
    state: Mutex<FileState>,
    loaded: OnceLock<LoadedTable>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        if mode == AccessMode::ReadWrite {
            return Err(Error::InvalidMode {
                backend: BackendKind::File,
                mode,
            });
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            mode,
            state: Mutex::new(FileState {
                load: LoadState::Unloaded,
                add_header: true,
                columns: None,
            }),
            loaded: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole table in file order.
    pub fn get_all(&self) -> Result<&Table> {
        Ok(&self.load()?.table)
    }

    pub fn get_first(&self) -> Result<&Record> {
        self.load()?.table.first().ok_or(Error::EmptyTable)
    }

    fn assert_readable(&self) {
        assert!(
            self.mode.can_read(),
            "read on write-only file store {}",
            self.path.display()
        );
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileState>> {
        self.state
            .lock()
            .map_err(|_| Error::Corrupt("file store lock poisoned"))
    }

    fn load(&self) -> Result<&LoadedTable> {
        self.assert_readable();
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let mut state = self.lock()?;
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }
        debug_assert_eq!(state.load, LoadState::Unloaded);
        state.load = LoadState::Loading;
        log::debug!("loading trades from {}", self.path.display());
        let loaded = match read_table(&self.path) {
            Ok(loaded) => loaded,
            Err(err) => {
                state.load = LoadState::Unloaded;
                return Err(err);
            }
        };
        log::info!(
            "{:10}: loaded {} trades from {}",
            "IN_CACHE",
            loaded.table.len(),
            self.path.display()
        );
        let _ = self.loaded.set(loaded);
        state.load = LoadState::Loaded;
        self.loaded
            .get()
            .ok_or(Error::Corrupt("file store load did not complete"))
    }
}

impl TradeStore for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn mode(&self) -> AccessMode {
        self.mode
    }

    fn get_one(&self, tradenum: i64) -> Result<Record> {
        let loaded = self.load()?;
        loaded
            .index
            .get(&tradenum)
            .map(|&row| loaded.table.records()[row].clone())
            .ok_or(Error::NotFound(tradenum))
    }

    fn get_count(&self) -> Result<usize> {
        Ok(self.load()?.table.len())
    }

    fn put_batch(&self, records: &[Record]) -> Result<()> {
        assert!(
            self.mode.can_write(),
            "write on read-only file store {}",
            self.path.display()
        );
        check_key_column(records)?;
        let Some(first) = records.first() else {
            return Ok(());
        };

        let mut state = self.lock()?;
        let columns = match &state.columns {
            Some(columns) => columns.clone(),
            None => first.names().map(str::to_string).collect::<Vec<_>>(),
        };
        for record in records {
            if record.len() != columns.len() || columns.iter().any(|c| record.get(c).is_none()) {
                return Err(Error::SchemaMismatch(format!(
                    "trade {} does not match columns {}",
                    record.tradenum().unwrap_or_default(),
                    columns.join(",")
                )));
            }
        }

        let file = if state.add_header {
            File::create(&self.path)?
        } else {
            OpenOptions::new().append(true).open(&self.path)?
        };
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if state.add_header {
            writer.write_record(&columns)?;
        }
        for record in records {
            writer.write_record(encode_row(record, &columns)?)?;
        }
        writer.flush()?;

        state.add_header = false;
        state.columns = Some(columns);
        log::debug!("appended {} trades to {}", records.len(), self.path.display());
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<LoadedTable> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == KEY_COLUMN) {
        return Err(Error::MissingKeyColumn(KEY_COLUMN.to_string()));
    }

    let mut table = Table::new();
    let mut index = HashMap::new();
    for row in reader.records() {
        let record = decode_row(&headers, &row?)?;
        let tradenum = record
            .tradenum()
            .ok_or_else(|| Error::MissingKeyColumn(KEY_COLUMN.to_string()))?;
        index.entry(tradenum).or_insert(table.len());
        table.push(record);
    }
    Ok(LoadedTable { table, index })
}
