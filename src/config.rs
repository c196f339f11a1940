//! Configuration Module
//!
//! Reads provider settings from the host application's configuration tree.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{CacheError, Result};

/// The only provider role this crate serves
pub const PROVIDER_ROLE: &str = "redis";

/// Address used when none is configured; an empty host means localhost
pub const DEFAULT_ADDRESS: &str = ":6379";

const DEFAULT_HOST: &str = "127.0.0.1";

/// Connection timeouts passed through to the pool and command layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on establishing a new connection
    pub connect: Duration,
    /// Bound on reading a reply
    pub read: Duration,
    /// Bound on sending a command
    pub write: Duration,
    /// Bound on waiting for a free pooled connection
    pub pool: Duration,
    /// Pooled connections unused this long are closed; zero disables reaping
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(3),
            write: Duration::from_secs(3),
            pool: Duration::from_secs(3),
            idle: Duration::from_secs(5 * 60),
        }
    }
}

/// Exponential backoff bounds between retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBackoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(8),
            max: Duration::from_millis(512),
        }
    }
}

/// Provider connection parameters.
///
/// Read from `cache.<name>.*` in the host's configuration tree.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Provider role; must be "redis" (case-insensitive)
    pub provider: String,
    /// "tcp" or "unix"
    pub network: String,
    /// `host:port` for tcp, socket path for unix
    pub address: String,
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Maximum pooled connections
    pub pool_size: usize,
    pub timeout: Timeouts,
    /// How often idle connections are reaped
    pub idle_check_interval: Duration,
    pub retry_backoff: RetryBackoff,
    /// Retries for transport faults; zero sends each command once
    pub max_retries: u32,
}

impl ProviderConfig {
    /// Creates a ProviderConfig from the `cache.<name>` section of `tree`.
    ///
    /// Missing values take their defaults. Durations use human readable
    /// strings ("5s", "512ms", "5m"); an unparsable value logs a warning and
    /// falls back to the default.
    ///
    /// # Keys
    /// - `provider` - Provider role, must be "redis"
    /// - `network` - "tcp" or "unix" (default: tcp)
    /// - `address` - Server address (default: ":6379")
    /// - `password` - Server password (default: none)
    /// - `db` - Logical database index (default: 0)
    /// - `pool_size` - Max pooled connections (default: 10 x CPU count)
    /// - `timeout.connect|read|write|pool|idle` - (default: 5s, 3s, 3s, 3s, 5m)
    /// - `idle_check_interval` - (default: 1m)
    /// - `retry_backoff.min|max` - (default: 8ms, 512ms)
    /// - `max_retries` - (default: 0)
    pub fn from_tree(name: &str, tree: &Value) -> Self {
        let empty = Value::Null;
        let section = tree
            .get("cache")
            .and_then(|cache| cache.get(name))
            .unwrap_or(&empty);
        let defaults = Self::default();
        let timeouts = defaults.timeout;
        let backoff = defaults.retry_backoff;

        let password = string_or(section, "password", "");

        Self {
            provider: string_or(section, "provider", ""),
            network: string_or(section, "network", &defaults.network),
            address: string_or(section, "address", &defaults.address),
            password: (!password.is_empty()).then_some(password),
            db: parse_or(section, "db", defaults.db),
            pool_size: parse_or(section, "pool_size", defaults.pool_size),
            timeout: Timeouts {
                connect: duration_or(section, "timeout.connect", timeouts.connect),
                read: duration_or(section, "timeout.read", timeouts.read),
                write: duration_or(section, "timeout.write", timeouts.write),
                pool: duration_or(section, "timeout.pool", timeouts.pool),
                idle: duration_or(section, "timeout.idle", timeouts.idle),
            },
            idle_check_interval: duration_or(
                section,
                "idle_check_interval",
                defaults.idle_check_interval,
            ),
            retry_backoff: RetryBackoff {
                min: duration_or(section, "retry_backoff.min", backoff.min),
                max: duration_or(section, "retry_backoff.max", backoff.max),
            },
            max_retries: parse_or(section, "max_retries", defaults.max_retries),
        }
    }

    // == Validate ==
    /// Checks the role and connection parameters before anything connects.
    pub fn validate(&self) -> Result<()> {
        if !self.provider.eq_ignore_ascii_case(PROVIDER_ROLE) {
            return Err(CacheError::Configuration(format!(
                "not a valid provider name '{}', expected '{}'",
                self.provider, PROVIDER_ROLE
            )));
        }

        match self.network.as_str() {
            "tcp" => {
                parse_tcp_address(&self.address)?;
            }
            "unix" => {
                if self.address.is_empty() {
                    return Err(CacheError::Configuration(
                        "unix network requires a socket path".to_string(),
                    ));
                }
            }
            other => {
                return Err(CacheError::Configuration(format!(
                    "unsupported network '{}', expected 'tcp' or 'unix'",
                    other
                )));
            }
        }

        if self.pool_size == 0 {
            return Err(CacheError::Configuration(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        if self.db < 0 {
            return Err(CacheError::Configuration(format!(
                "db index must not be negative, got {}",
                self.db
            )));
        }
        if self.retry_backoff.min > self.retry_backoff.max {
            return Err(CacheError::Configuration(format!(
                "retry_backoff.min ({:?}) exceeds retry_backoff.max ({:?})",
                self.retry_backoff.min, self.retry_backoff.max
            )));
        }
        Ok(())
    }

    // == Connection URL ==
    /// Renders the connection URL understood by the redis client.
    pub fn connection_url(&self) -> Result<String> {
        let password = self.password.as_deref().map(urlencoding::encode);

        match self.network.as_str() {
            "unix" => {
                let mut url = format!("redis+unix://{}?db={}", self.address, self.db);
                if let Some(password) = password {
                    url.push_str("&pass=");
                    url.push_str(&password);
                }
                Ok(url)
            }
            _ => {
                let (host, port) = parse_tcp_address(&self.address)?;
                let auth = password
                    .map(|password| format!(":{}@", password))
                    .unwrap_or_default();
                Ok(format!("redis://{}{}:{}/{}", auth, host, port, self.db))
            }
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: PROVIDER_ROLE.to_string(),
            network: "tcp".to_string(),
            address: DEFAULT_ADDRESS.to_string(),
            password: None,
            db: 0,
            pool_size: 10 * num_cpus::get(),
            timeout: Timeouts::default(),
            idle_check_interval: Duration::from_secs(60),
            retry_backoff: RetryBackoff::default(),
            max_retries: 0,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("network", &self.network)
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .field("pool_size", &self.pool_size)
            .field("timeout", &self.timeout)
            .field("idle_check_interval", &self.idle_check_interval)
            .field("retry_backoff", &self.retry_backoff)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Splits `host:port`, defaulting an empty host to localhost.
fn parse_tcp_address(address: &str) -> Result<(&str, u16)> {
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        CacheError::Configuration(format!("address '{}' is missing a port", address))
    })?;
    let port = port.parse::<u16>().map_err(|_| {
        CacheError::Configuration(format!("address '{}': invalid port '{}'", address, port))
    })?;
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    Ok((host, port))
}

// == Tree Lookups ==
/// Finds `path` in `section`, either as a literal dotted key or by walking
/// nested objects.
fn lookup<'a>(section: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = section.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(section, |node, part| node.get(part))
        .filter(|value| !value.is_null())
}

fn string_or(section: &Value, path: &str, default: &str) -> String {
    match lookup(section, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

fn parse_or<T>(section: &Value, path: &str, default: T) -> T
where
    T: FromStr + fmt::Debug,
{
    let raw = match lookup(section, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) | None => return default,
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(key = path, value = %raw, "invalid number in cache config, using {:?}", default);
        default
    })
}

fn duration_or(section: &Value, path: &str, default: Duration) -> Duration {
    match lookup(section, path) {
        Some(Value::String(s)) => parse_duration(s, default),
        Some(other) => {
            warn!(key = path, value = %other, "duration must be a string, using {:?}", default);
            default
        }
        None => default,
    }
}

/// Parses a human readable duration, falling back to `default`.
pub fn parse_duration(value: &str, default: Duration) -> Duration {
    humantime::parse_duration(value.trim()).unwrap_or_else(|_| {
        if !value.is_empty() {
            warn!(value, "invalid duration in cache config, using {:?}", default);
        }
        default
    })
}

// == Cache Config ==
/// How a cache instance treats entry lifetimes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum EvictionMode {
    /// TTL is set once at write time
    #[default]
    Fixed,
    /// TTL is renewed on every successful read
    Sliding,
}

impl FromStr for EvictionMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" | "ttl" => Ok(EvictionMode::Fixed),
            "sliding" | "slide" => Ok(EvictionMode::Sliding),
            other => Err(CacheError::Configuration(format!(
                "unknown eviction mode '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for EvictionMode {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Settings for one named cache instance.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    #[serde(default)]
    pub eviction_mode: EvictionMode,
}

impl CacheConfig {
    pub fn new(name: impl Into<String>, eviction_mode: EvictionMode) -> Self {
        Self {
            name: name.into(),
            eviction_mode,
        }
    }
}
