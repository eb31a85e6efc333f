//! Shared application state for the visits service.
//!
//! Built once at startup from config plus an opened backend; cloned cheaply
//! into every request.

use std::sync::Arc;

use axum::http::HeaderValue;
use visits_core::error::{Result, VisitsError};
use visits_core::{CounterBackend, CounterName, CounterStore};

use crate::config::VisitsConfig;
use crate::obs::metrics::VisitsMetrics;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    store: CounterStore,
    metrics: Arc<VisitsMetrics>,
}

struct AppStateInner {
    cfg: VisitsConfig,
    counter: CounterName,
    cors_allow_origin: Option<HeaderValue>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: VisitsConfig, backend: Arc<dyn CounterBackend>) -> Result<Self> {
        let counter = cfg.counter.counter_name()?;
        let store = CounterStore::new(backend, cfg.counter.retry_policy());

        let cors_allow_origin = cfg
            .server
            .cors_allow_origin
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| {
                VisitsError::BadRequest(format!(
                    "server.cors_allow_origin is not a valid header value: {e}"
                ))
            })?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                counter,
                cors_allow_origin,
            }),
            store,
            metrics: Arc::new(VisitsMetrics::default()),
        })
    }

    pub fn cfg(&self) -> &VisitsConfig {
        &self.inner.cfg
    }

    /// The one counter this service increments.
    pub fn counter(&self) -> &CounterName {
        &self.inner.counter
    }

    pub fn store(&self) -> &CounterStore {
        &self.store
    }

    pub fn cors_allow_origin(&self) -> Option<&HeaderValue> {
        self.inner.cors_allow_origin.as_ref()
    }

    pub fn metrics(&self) -> Arc<VisitsMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn is_draining(&self) -> bool {
        self.metrics.is_draining()
    }

    pub fn set_draining(&self) {
        self.metrics.set_draining();
    }
}
