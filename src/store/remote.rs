use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::{decode_record, encode_record};
use crate::record::Record;
use crate::store::{check_key_column, AccessMode, BackendKind, TradeStore};
use crate::{Error, Result};

pub const DEFAULT_KEY_TEMPLATE: &str = "ey{}.json";

const PLACEHOLDER: &str = "{}";

/// Minimal key-value surface the remote store needs.
///
/// Implementations must be safe to call from many workers at once.
pub trait KvConnection: Send + Sync {
    fn ping(&self) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set every entry in one round trip. Any failure fails the whole call.
    fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()>;
}

impl<T: KvConnection + ?Sized> KvConnection for Arc<T> {
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        (**self).set_many(entries)
    }
}

/// Key pattern with a single `{}` slot for the trade id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    prefix: String,
    suffix: String,
}

impl KeyTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        if template.matches(PLACEHOLDER).count() != 1 {
            return Err(Error::Configuration(format!(
                "key template must contain exactly one {PLACEHOLDER}: {template:?}"
            )));
        }
        let (prefix, suffix) = template
            .split_once(PLACEHOLDER)
            .ok_or_else(|| Error::Configuration(format!("bad key template: {template:?}")))?;
        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn render(&self, tradenum: i64) -> String {
        format!("{}{}{}", self.prefix, tradenum, self.suffix)
    }
}

impl Default for KeyTemplate {
    fn default() -> Self {
        Self {
            prefix: "ey".to_string(),
            suffix: ".json".to_string(),
        }
    }
}

/// Store over a key-value connection, one key per trade.
///
/// No local cache: every read is a round trip. Each call is self-contained,
/// so a shared handle can be used by many writers at once.
pub struct RemoteStore {
    connection: Box<dyn KvConnection>,
    mode: AccessMode,
    read_key: KeyTemplate,
    write_key: KeyTemplate,
}

impl RemoteStore {
    /// Ping the connection and fail with [`Error::ConnectionUnavailable`]
    /// if it does not answer.
    pub fn new(
        connection: Box<dyn KvConnection>,
        mode: AccessMode,
        read_key: KeyTemplate,
        write_key: KeyTemplate,
    ) -> Result<Self> {
        connection.ping().map_err(|err| match err {
            Error::ConnectionUnavailable(msg) => Error::ConnectionUnavailable(msg),
            other => Error::ConnectionUnavailable(other.to_string()),
        })?;
        Ok(Self {
            connection,
            mode,
            read_key,
            write_key,
        })
    }
}

impl TradeStore for RemoteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn mode(&self) -> AccessMode {
        self.mode
    }

    fn get_one(&self, tradenum: i64) -> Result<Record> {
        assert!(self.mode.can_read(), "read on write-only remote store");
        let key = self.read_key.render(tradenum);
        match self.connection.get(&key)? {
            Some(bytes) => decode_record(&bytes),
            None => Err(Error::NotFound(tradenum)),
        }
    }

    /// Keys cannot be counted cheaply, so this is always 0.
    fn get_count(&self) -> Result<usize> {
        assert!(self.mode.can_read(), "read on write-only remote store");
        Ok(0)
    }

    fn put_batch(&self, records: &[Record]) -> Result<()> {
        assert!(self.mode.can_write(), "write on read-only remote store");
        check_key_column(records)?;
        if records.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let tradenum = record.tradenum().unwrap_or_default();
            entries.push((self.write_key.render(tradenum), encode_record(record)?));
        }
        self.connection
            .set_many(&entries)
            .map_err(|err| Error::AggregateWriteFailure {
                records: records.len(),
                reason: err.to_string(),
            })
    }
}

/// In-process key-value map with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_ping: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::Release);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Corrupt("memory connection lock poisoned"))
    }
}

impl KvConnection for MemoryConnection {
    fn ping(&self) -> Result<()> {
        if self.fail_ping.load(Ordering::Acquire) {
            return Err(Error::ConnectionUnavailable("ping refused".into()));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(Error::Backend("write refused".into()));
        }
        let mut map = self.lock()?;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_backend::RedisConnection;

#[cfg(feature = "redis")]
mod redis_backend {
    use std::sync::Mutex;

    use crate::config::RemoteConfig;
    use crate::store::remote::KvConnection;
    use crate::{Error, Result};

    /// Blocking redis client with a small pool of idle connections.
    ///
    /// Workers check a connection out per call and return it afterwards;
    /// connections that saw an I/O error are dropped instead.
    pub struct RedisConnection {
        client: redis::Client,
        idle: Mutex<Vec<redis::Connection>>,
    }

    impl RedisConnection {
        pub fn open(config: &RemoteConfig) -> Result<Self> {
            let url = connection_url(config)?;
            let client = redis::Client::open(url.as_str())
                .map_err(|err| Error::ConnectionUnavailable(err.to_string()))?;
            Ok(Self {
                client,
                idle: Mutex::new(Vec::new()),
            })
        }

        fn with_connection<T>(
            &self,
            op: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
        ) -> Result<T> {
            let pooled = self
                .idle
                .lock()
                .map_err(|_| Error::Corrupt("redis pool lock poisoned"))?
                .pop();
            let mut connection = match pooled {
                Some(connection) => connection,
                None => self
                    .client
                    .get_connection()
                    .map_err(|err| Error::ConnectionUnavailable(err.to_string()))?,
            };

            match op(&mut connection) {
                Ok(value) => {
                    if let Ok(mut idle) = self.idle.lock() {
                        idle.push(connection);
                    }
                    Ok(value)
                }
                Err(err) if err.is_io_error() || err.is_connection_dropped() => {
                    Err(Error::ConnectionUnavailable(err.to_string()))
                }
                Err(err) => {
                    if let Ok(mut idle) = self.idle.lock() {
                        idle.push(connection);
                    }
                    Err(Error::Backend(err.to_string()))
                }
            }
        }
    }

    impl KvConnection for RedisConnection {
        fn ping(&self) -> Result<()> {
            let reply: String = self.with_connection(|con| redis::cmd("PING").query(con))?;
            log::debug!("remote ping: {reply}");
            Ok(())
        }

        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.with_connection(|con| redis::cmd("GET").arg(key).query(con))
        }

        fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
            let mut pipe = redis::pipe();
            for (key, value) in entries {
                pipe.cmd("SET").arg(key).arg(value.as_slice()).ignore();
            }
            self.with_connection(|con| pipe.query::<()>(con))
        }
    }

    /// `redis[s]://:password@host:port/`, skipping certificate checks on TLS.
    fn connection_url(config: &RemoteConfig) -> Result<url::Url> {
        let scheme = if config.tls { "rediss" } else { "redis" };
        let mut url = url::Url::parse(&format!("{scheme}://{}:{}/", config.host, config.port))
            .map_err(|err| Error::Configuration(format!("invalid host {}: {err}", config.host)))?;
        if let Some(password) = &config.password {
            url.set_password(Some(password))
                .map_err(|_| Error::Configuration("cannot set password on remote url".into()))?;
        }
        if config.tls {
            url.set_fragment(Some("insecure"));
        }
        Ok(url)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(conn: &Arc<MemoryConnection>, mode: AccessMode) -> RemoteStore {
        RemoteStore::new(
            Box::new(Arc::clone(conn)),
            mode,
            KeyTemplate::default(),
            KeyTemplate::default(),
        )
        .expect("remote store")
    }

    #[test]
    fn template_needs_exactly_one_slot() {
        assert_eq!(KeyTemplate::parse("ey{}.json").expect("ok").render(12), "ey12.json");
        assert_eq!(KeyTemplate::parse("{}").expect("ok").render(-3), "-3");
        assert!(KeyTemplate::parse("trade").is_err());
        assert!(KeyTemplate::parse("{}{}").is_err());
    }

    #[test]
    fn failed_ping_rejects_construction() {
        let conn = Arc::new(MemoryConnection::new());
        conn.set_fail_ping(true);
        let err = RemoteStore::new(
            Box::new(conn),
            AccessMode::Read,
            KeyTemplate::default(),
            KeyTemplate::default(),
        )
        .err()
        .expect("ping must fail");
        assert!(matches!(err, Error::ConnectionUnavailable(_)));
    }

    #[test]
    fn write_then_read_by_key() {
        let conn = Arc::new(MemoryConnection::new());
        let store = store(&conn, AccessMode::ReadWrite);
        let mut record = Record::with_tradenum(5);
        record.set("fx1", 0.9);
        store.put_batch(&[record.clone()]).expect("put");
        assert!(conn.contains_key("ey5.json"));
        assert_eq!(store.get_one(5).expect("get"), record);
        assert!(matches!(store.get_one(6), Err(Error::NotFound(6))));
        assert_eq!(store.get_count().expect("count"), 0);
    }

    #[test]
    fn asymmetric_templates() {
        let conn = Arc::new(MemoryConnection::new());
        let store = RemoteStore::new(
            Box::new(Arc::clone(&conn)),
            AccessMode::ReadWrite,
            KeyTemplate::parse("trade:{}").expect("read"),
            KeyTemplate::parse("result:{}").expect("write"),
        )
        .expect("store");
        store.put_batch(&[Record::with_tradenum(1)]).expect("put");
        assert!(conn.contains_key("result:1"));
        assert!(matches!(store.get_one(1), Err(Error::NotFound(1))));
    }

    #[test]
    fn pipeline_failure_is_aggregate() {
        let conn = Arc::new(MemoryConnection::new());
        let store = store(&conn, AccessMode::Write);
        conn.set_fail_writes(true);
        let err = store
            .put_batch(&[Record::with_tradenum(1), Record::with_tradenum(2)])
            .expect_err("write fails");
        assert!(matches!(err, Error::AggregateWriteFailure { records: 2, .. }));
        assert!(conn.is_empty());
    }

    #[test]
    #[should_panic(expected = "read on write-only")]
    fn count_on_write_handle_panics() {
        let conn = Arc::new(MemoryConnection::new());
        let store = store(&conn, AccessMode::Write);
        let _ = store.get_count();
    }

    #[test]
    #[should_panic(expected = "write on read-only")]
    fn write_on_read_handle_panics() {
        let conn = Arc::new(MemoryConnection::new());
        let store = store(&conn, AccessMode::Read);
        let _ = store.put_batch(&[]);
    }
}
