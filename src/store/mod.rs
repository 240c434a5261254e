//! Trade persistence over interchangeable backends.
//!
//! Every handle owns one backend connection and one [`AccessMode`] fixed at
//! construction. Calling a read on a write-only handle (or the reverse) is a
//! programming error and panics; backend/mode combinations that can never
//! work are rejected at construction with [`Error::InvalidMode`].

pub mod file;
pub mod remote;

use std::fmt;
use std::str::FromStr;

use crate::config::{Backend, StoreConfig};
use crate::record::{Record, Table, KEY_COLUMN};
use crate::{Error, Result};

pub use file::FileStore;
pub use remote::{KeyTemplate, KvConnection, MemoryConnection, RemoteStore};
#[cfg(feature = "redis")]
pub use remote::RedisConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn can_read(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
            AccessMode::ReadWrite => "rw",
        })
    }
}

impl FromStr for AccessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(AccessMode::Read),
            "w" => Ok(AccessMode::Write),
            "rw" => Ok(AccessMode::ReadWrite),
            other => Err(Error::Configuration(format!("invalid mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Remote,
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Remote => "remote",
            BackendKind::File => "file",
        })
    }
}

/// Operations common to every backend.
pub trait TradeStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn mode(&self) -> AccessMode;

    /// Fetch the record for `tradenum`, or [`Error::NotFound`].
    fn get_one(&self, tradenum: i64) -> Result<Record>;

    /// Number of stored records. Backends that cannot count return 0.
    fn get_count(&self) -> Result<usize>;

    /// Write every record or fail as a whole.
    fn put_batch(&self, records: &[Record]) -> Result<()>;
}

/// Reject a batch before any I/O if a record has no integer `tradenum`.
pub(crate) fn check_key_column(records: &[Record]) -> Result<()> {
    if records.iter().any(|r| r.tradenum().is_none()) {
        return Err(Error::MissingKeyColumn(KEY_COLUMN.to_string()));
    }
    Ok(())
}

/// A store handle selected by backend kind at construction.
pub enum Store {
    Remote(RemoteStore),
    File(FileStore),
}

impl Store {
    /// File-only capabilities (`get_all`, `get_first`).
    pub fn as_file(&self) -> Option<&FileStore> {
        match self {
            Store::File(store) => Some(store),
            Store::Remote(_) => None,
        }
    }

    /// All records, for backends that can enumerate them.
    pub fn get_all(&self) -> Result<&Table> {
        match self {
            Store::File(store) => store.get_all(),
            Store::Remote(_) => Err(Error::Configuration(
                "remote backend does not support table scans".into(),
            )),
        }
    }

    pub fn get_first(&self) -> Result<&Record> {
        match self {
            Store::File(store) => store.get_first(),
            Store::Remote(_) => Err(Error::Configuration(
                "remote backend does not support table scans".into(),
            )),
        }
    }
}

impl TradeStore for Store {
    fn kind(&self) -> BackendKind {
        match self {
            Store::Remote(s) => s.kind(),
            Store::File(s) => s.kind(),
        }
    }

    fn mode(&self) -> AccessMode {
        match self {
            Store::Remote(s) => s.mode(),
            Store::File(s) => s.mode(),
        }
    }

    fn get_one(&self, tradenum: i64) -> Result<Record> {
        match self {
            Store::Remote(s) => s.get_one(tradenum),
            Store::File(s) => s.get_one(tradenum),
        }
    }

    fn get_count(&self) -> Result<usize> {
        match self {
            Store::Remote(s) => s.get_count(),
            Store::File(s) => s.get_count(),
        }
    }

    fn put_batch(&self, records: &[Record]) -> Result<()> {
        match self {
            Store::Remote(s) => s.put_batch(records),
            Store::File(s) => s.put_batch(records),
        }
    }
}

/// Open a store for `config` in `mode`.
pub fn connect(config: &StoreConfig, mode: AccessMode) -> Result<Store> {
    match &config.backend {
        Backend::File { path } => {
            log::info!("{:10}: opening file {} ({mode})", "CACHE", path.display());
            Ok(Store::File(FileStore::open(path, mode)?))
        }
        Backend::Remote(remote) => {
            log::info!("{:10}: connecting to {}:{} ({mode})", "CACHE", remote.host, remote.port);
            connect_remote(remote, mode)
        }
    }
}

#[cfg(feature = "redis")]
fn connect_remote(remote: &crate::config::RemoteConfig, mode: AccessMode) -> Result<Store> {
    let connection = RedisConnection::open(remote)?;
    let store = RemoteStore::new(
        Box::new(connection),
        mode,
        KeyTemplate::parse(&remote.read_key)?,
        KeyTemplate::parse(&remote.write_key)?,
    )?;
    Ok(Store::Remote(store))
}

#[cfg(not(feature = "redis"))]
fn connect_remote(_remote: &crate::config::RemoteConfig, _mode: AccessMode) -> Result<Store> {
    Err(Error::Configuration(
        "remote backend requires the `redis` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_short_names() {
        assert_eq!("r".parse::<AccessMode>().expect("r"), AccessMode::Read);
        assert_eq!("rw".parse::<AccessMode>().expect("rw"), AccessMode::ReadWrite);
        assert!("x".parse::<AccessMode>().is_err());
        assert!(AccessMode::ReadWrite.can_read() && AccessMode::ReadWrite.can_write());
        assert!(!AccessMode::Write.can_read());
    }

    #[test]
    fn batch_without_key_is_rejected() {
        let mut record = Record::new();
        record.set("fx1", 1.0);
        assert!(matches!(
            check_key_column(&[Record::with_tradenum(1), record]),
            Err(Error::MissingKeyColumn(_))
        ));
        assert!(check_key_column(&[]).is_ok());
    }
}
