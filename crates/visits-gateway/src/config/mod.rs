//! Service config loader (strict parsing).

pub mod schema;

use std::fs;

use visits_core::error::{Result, VisitsError};

pub use schema::{CounterSection, ServerSection, StoreBackend, StoreSection, VisitsConfig};

/// Env var naming the config file; falls back to `visits.yaml`.
pub const CONFIG_PATH_ENV: &str = "VISITS_CONFIG";

pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "visits.yaml".into())
}

pub fn load_from_file(path: &str) -> Result<VisitsConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| VisitsError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<VisitsConfig> {
    let cfg: VisitsConfig = serde_yaml::from_str(s)
        .map_err(|e| VisitsError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
