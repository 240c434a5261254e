//! Trade record cache.
//!
//! Numbered trade records persist through a [`store::TradeStore`] backed by
//! either a remote key-value server or a local delimited file. On top of the
//! store sit a concurrent batch [`generator`], the [`split`] and [`concat`]
//! file tools, and a [`runner`] that turns each trade into a result record.

pub mod codec;
pub mod concat;
pub mod config;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod record;
pub mod runner;
pub mod split;
pub mod store;
pub mod synth;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod logging;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use record::{Record, Table, Value, KEY_COLUMN};
pub use store::{connect, AccessMode, BackendKind, FileStore, RemoteStore, Store, TradeStore};
