//! Store construction parameters and command-line helpers.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::remote::DEFAULT_KEY_TEMPLATE;
use crate::{Error, Result};

pub const DEFAULT_REMOTE_PORT: u16 = 6380;

/// Prefix accepted (and stripped) on keys of a JSON config file.
pub const CONFIG_KEY_PREFIX: &str = "tradecache-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: Backend,
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File { path: path.into() },
        }
    }

    pub fn remote(remote: RemoteConfig) -> Self {
        Self {
            backend: Backend::Remote(remote),
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File { path } => Some(path),
            Backend::Remote(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backend {
    Remote(RemoteConfig),
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_tls")]
    pub tls: bool,
    #[serde(default = "default_key_template")]
    pub read_key: String,
    #[serde(default = "default_key_template")]
    pub write_key: String,
}

impl RemoteConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_REMOTE_PORT,
            password: None,
            tls: true,
            read_key: DEFAULT_KEY_TEMPLATE.to_string(),
            write_key: DEFAULT_KEY_TEMPLATE.to_string(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_REMOTE_PORT
}

fn default_tls() -> bool {
    true
}

fn default_key_template() -> String {
    DEFAULT_KEY_TEMPLATE.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
    Redis,
    Filesystem,
}

/// Loose cache options as collected from flags, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    pub cache_type: Option<CacheType>,
    pub host: Option<String>,
    pub port: u16,
    pub password: Option<String>,
    pub tls: bool,
    pub path: Option<PathBuf>,
    pub read_key: String,
    pub write_key: String,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_type: None,
            host: None,
            port: DEFAULT_REMOTE_PORT,
            password: None,
            tls: true,
            path: None,
            read_key: DEFAULT_KEY_TEMPLATE.to_string(),
            write_key: DEFAULT_KEY_TEMPLATE.to_string(),
        }
    }
}

impl CacheOptions {
    /// Pick the backend and check its required parameters.
    ///
    /// Without an explicit type, a path alone means the file backend and a
    /// host alone means the remote backend.
    pub fn resolve(&self) -> Result<StoreConfig> {
        let cache_type = match (self.cache_type, &self.path, &self.host) {
            (Some(cache_type), _, _) => cache_type,
            (None, Some(_), None) => {
                log::info!("{:10}: --cache-type=filesystem", "AUTO_ARG");
                CacheType::Filesystem
            }
            (None, None, Some(_)) => {
                log::info!("{:10}: --cache-type=redis", "AUTO_ARG");
                CacheType::Redis
            }
            _ => {
                return Err(Error::Configuration(
                    "cannot infer cache type; pass --cache-type".into(),
                ))
            }
        };

        match cache_type {
            CacheType::Filesystem => {
                let path = self.path.clone().ok_or_else(|| {
                    Error::Configuration("cache path must be specified for filesystem cache".into())
                })?;
                Ok(StoreConfig::file(path))
            }
            CacheType::Redis => {
                let host = self.host.clone().ok_or_else(|| {
                    Error::Configuration("cache name must be specified for redis cache".into())
                })?;
                let password = self.password.clone().ok_or_else(|| {
                    Error::Configuration("cache key must be specified for redis cache".into())
                })?;
                Ok(StoreConfig::remote(RemoteConfig {
                    host,
                    port: self.port,
                    password: Some(password),
                    tls: self.tls,
                    read_key: self.read_key.clone(),
                    write_key: self.write_key.clone(),
                }))
            }
        }
    }
}

/// Parse `k=v,k2=v2` metric tags.
pub fn parse_tags(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut tags = BTreeMap::new();
    for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::Configuration(format!("tag must be key=value: {pair:?}")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Configuration(format!("empty tag key in {pair:?}")));
        }
        tags.insert(key.to_string(), value.trim().to_string());
    }
    Ok(tags)
}

/// Turn a JSON object into `--flag value` arguments.
///
/// Keys are lower-cased; a [`CONFIG_KEY_PREFIX`] is stripped and keys
/// without a leading `-` get `--`. `true` becomes a bare flag, `false` and
/// `null` are dropped.
pub fn config_file_args(path: &Path) -> Result<Vec<OsString>> {
    let data = std::fs::read(path)?;
    let values: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&data)?;

    let mut args = Vec::new();
    for (key, value) in values {
        let key = key.to_lowercase();
        let flag = if let Some(rest) = key.strip_prefix(CONFIG_KEY_PREFIX) {
            format!("--{rest}")
        } else if key.starts_with('-') {
            key
        } else {
            format!("--{key}")
        };
        match value {
            serde_json::Value::Null | serde_json::Value::Bool(false) => {}
            serde_json::Value::Bool(true) => args.push(OsString::from(flag)),
            serde_json::Value::String(s) => {
                args.push(OsString::from(flag));
                args.push(OsString::from(s));
            }
            serde_json::Value::Number(n) => {
                args.push(OsString::from(flag));
                args.push(OsString::from(n.to_string()));
            }
            other => {
                return Err(Error::Configuration(format!(
                    "unsupported value for {flag}: {other}"
                )))
            }
        }
    }
    Ok(args)
}

/// Expand `--config <file>` into the file's arguments, placed ahead of the
/// remaining command line so explicit flags win.
pub fn expand_config_args<I>(args: I) -> Result<Vec<OsString>>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let mut out: Vec<OsString> = iter.next().into_iter().collect();
    let mut from_file = Vec::new();
    let mut rest = Vec::new();

    while let Some(arg) = iter.next() {
        let text = arg.to_string_lossy().into_owned();
        if text == "--config" {
            let path = iter
                .next()
                .ok_or_else(|| Error::Configuration("--config requires a path".into()))?;
            from_file.extend(config_file_args(Path::new(&path))?);
        } else if let Some(path) = text.strip_prefix("--config=") {
            from_file.extend(config_file_args(Path::new(path))?);
        } else {
            rest.push(arg);
        }
    }

    out.extend(from_file);
    out.extend(rest);
    Ok(out)
}
