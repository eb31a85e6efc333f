//! Counter request handler.
//!
//! Each request performs exactly one `increment_and_get` on the configured
//! counter and renders the new value as a decimal `text/plain` body. Store
//! failures become 5xx plain-text responses; no count is ever fabricated.
//! A client retry after a failure is a new increment, not a reread.

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use visits_core::error::VisitsError;

use crate::app_state::AppState;
use crate::obs::metrics::VisitsMetrics;

/// Retry-After hint sent with `StoreConflict`.
const CONFLICT_RETRY_AFTER_SECS: u64 = 1;

/// Keeps `requests_in_flight` balanced even if the request future is dropped.
struct InFlight<'a>(&'a VisitsMetrics);

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a VisitsMetrics) -> Self {
        metrics.requests_in_flight.inc();
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.requests_in_flight.dec();
    }
}

pub async fn record_visit(State(app): State<AppState>) -> Response {
    let metrics = app.metrics();
    let _in_flight = InFlight::enter(&metrics);

    let store = app.store();
    let backend = store.backend_kind();
    let started = Instant::now();
    let result = store.increment(app.counter()).await;
    metrics
        .increment_duration
        .observe(&[("backend", backend)], started.elapsed());

    match result {
        Ok(inc) => {
            metrics.store_attempts.add(&[("backend", backend)], u64::from(inc.attempts));
            metrics
                .store_conflicts
                .add(&[("backend", backend)], u64::from(inc.attempts.saturating_sub(1)));
            metrics.requests.inc(&[("outcome", "ok")]);
            tracing::debug!(
                counter = %app.counter(),
                count = inc.count,
                attempts = inc.attempts,
                "visit recorded"
            );

            (StatusCode::OK, inc.count.to_string()).into_response()
        }
        Err(e) => {
            if let VisitsError::StoreConflict { attempts } = &e {
                let attempts = u64::from(*attempts);
                metrics.store_attempts.add(&[("backend", backend)], attempts);
                metrics.store_conflicts.add(&[("backend", backend)], attempts);
            }
            metrics.requests.inc(&[("outcome", outcome_label(&e))]);
            tracing::warn!(
                counter = %app.counter(),
                backend,
                error = %e,
                "visit not recorded"
            );

            error_response(&e)
        }
    }
}

fn outcome_label(e: &VisitsError) -> &'static str {
    match e {
        VisitsError::StoreUnavailable(_) => "store_unavailable",
        VisitsError::StoreConflict { .. } => "store_conflict",
        _ => "internal",
    }
}

/// Map a store failure to a plain-text 5xx response.
pub fn error_response(e: &VisitsError) -> Response {
    let status = match e {
        VisitsError::StoreUnavailable(_) | VisitsError::StoreConflict { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = format!("{}: {}", e.client_code().as_str(), e);

    let mut resp = (status, body).into_response();
    if matches!(e, VisitsError::StoreConflict { .. }) {
        resp.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(CONFLICT_RETRY_AFTER_SECS),
        );
    }
    resp
}
