use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use visits_core::error::{Result, VisitsError};
use visits_core::{CounterName, RetryPolicy};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisitsConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub counter: CounterSection,

    #[serde(default)]
    pub store: StoreSection,
}

impl VisitsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VisitsError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.counter.validate()?;
        self.store.validate()?;

        // A blocked SQLite call must give up before the request does, or it
        // can commit after the caller has already been told it failed.
        if self.store.backend == StoreBackend::Sqlite
            && self.store.busy_timeout_ms >= self.counter.op_timeout_ms
        {
            return Err(VisitsError::BadRequest(
                "store.busy_timeout_ms must be less than counter.op_timeout_ms".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_route")]
    pub route: String,

    #[serde(default)]
    pub cors_allow_origin: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            route: default_route(),
            cors_allow_origin: None,
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !self.route.starts_with('/') || self.route.len() < 2 {
            return Err(VisitsError::BadRequest(
                "server.route must start with '/' and name a path".into(),
            ));
        }
        if ["/healthz", "/readyz", "/metrics"].contains(&self.route.as_str()) {
            return Err(VisitsError::BadRequest(format!(
                "server.route {} collides with an ops endpoint",
                self.route
            )));
        }
        if let Some(origin) = &self.cors_allow_origin {
            if origin.is_empty() || origin.chars().any(|c| c.is_control()) {
                return Err(VisitsError::BadRequest(
                    "server.cors_allow_origin must be a non-empty header value".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            VisitsError::BadRequest(format!(
                "server.listen must be a valid SocketAddr, got {:?}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_route() -> String {
    "/visits".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterSection {
    #[serde(default = "default_counter_name")]
    pub name: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for CounterSection {
    fn default() -> Self {
        Self {
            name: default_counter_name(),
            max_attempts: default_max_attempts(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl CounterSection {
    pub fn validate(&self) -> Result<()> {
        self.counter_name()?;
        if !(1..=1000).contains(&self.max_attempts) {
            return Err(VisitsError::BadRequest(
                "counter.max_attempts must be between 1 and 1000".into(),
            ));
        }
        if !(1..=60000).contains(&self.op_timeout_ms) {
            return Err(VisitsError::BadRequest(
                "counter.op_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn counter_name(&self) -> Result<CounterName> {
        CounterName::new(self.name.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            op_timeout: Duration::from_millis(self.op_timeout_ms),
        }
    }
}

fn default_counter_name() -> String {
    "visitors".into()
}
fn default_max_attempts() -> u32 {
    16
}
fn default_op_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file; unused by the memory backend.
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreSection {
    pub fn validate(&self) -> Result<()> {
        if self.backend == StoreBackend::Sqlite && self.path.trim().is_empty() {
            return Err(VisitsError::BadRequest(
                "store.path must not be empty for the sqlite backend".into(),
            ));
        }
        if self.busy_timeout_ms > 60000 {
            return Err(VisitsError::BadRequest(
                "store.busy_timeout_ms must be at most 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_store_path() -> String {
    "visits.db".into()
}
fn default_busy_timeout_ms() -> u64 {
    1000
}
