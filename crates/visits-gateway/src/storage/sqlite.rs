//! SQLite-backed counter records.
//!
//! One row per counter in `counters(name, count)`. Visits go through a single
//! upsert-returning statement, so SQLite serializes concurrent increments
//! itself and several processes may share one database file. The conditional
//! `write_if` (insert-if-absent, update-if-unchanged) is kept for callers that
//! drive the optimistic loop directly.
//!
//! Statements run on the blocking pool and cannot be cancelled once started.
//! Each call therefore carries the caller's budget: a statement that could no
//! longer finish inside it is never started, and SQLite's busy wait is clamped
//! to what is left.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use visits_core::error::{Result, VisitsError};
use visits_core::{CounterBackend, CounterName, WriteOutcome};

const INCREMENT_SQL: &str = "insert into counters (name, count) values (?1, 1) \
     on conflict(name) do update set count = count + 1 \
     where count >= 0 and count < 9223372036854775807 \
     returning count";

#[derive(Clone)]
pub struct SqliteBackend {
    connection: Arc<Mutex<Connection>>,
    busy_timeout: Duration,
    call_budget: Duration,
}

impl SqliteBackend {
    /// `call_budget` is how long a caller waits for one call; it must exceed
    /// `busy_timeout`.
    pub fn open(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
        call_budget: Duration,
    ) -> Result<Self> {
        if busy_timeout >= call_budget {
            return Err(VisitsError::BadRequest(format!(
                "sqlite busy timeout ({}ms) must be shorter than the call budget ({}ms)",
                busy_timeout.as_millis(),
                call_budget.as_millis()
            )));
        }

        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|e| {
            VisitsError::StoreUnavailable(format!("failed to open {}: {e}", path.display()))
        })?;
        connection
            .busy_timeout(busy_timeout)
            .map_err(unavailable("set busy timeout"))?;
        connection
            .execute(
                "create table if not exists counters \
                 (name text primary key, count integer not null)",
                (),
            )
            .map_err(unavailable("init schema"))?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            busy_timeout,
            call_budget,
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        let queued = Instant::now();
        // Slack keeps the statement ahead of the caller's timer.
        let deadline = self.call_budget - self.call_budget / 10;
        let busy_timeout = self.busy_timeout;

        tokio::task::spawn_blocking(move || {
            let guard = connection.lock().map_err(|e| {
                VisitsError::StoreUnavailable(format!("sqlite connection poisoned: {e}"))
            })?;

            let remaining = deadline.saturating_sub(queued.elapsed());
            if remaining.is_zero() {
                return Err(VisitsError::StoreUnavailable(format!(
                    "sqlite connection busy for {}ms, statement not started",
                    queued.elapsed().as_millis()
                )));
            }
            guard
                .busy_timeout(busy_timeout.min(remaining))
                .map_err(unavailable("set busy timeout"))?;
            f(&guard)
        })
        .await
        .map_err(|e| VisitsError::Internal(format!("sqlite task failed: {e}")))?
    }
}

fn unavailable(what: &'static str) -> impl Fn(rusqlite::Error) -> VisitsError {
    move |e| VisitsError::StoreUnavailable(format!("sqlite {what} failed: {e}"))
}

fn from_sql_count(name: &CounterName, v: i64) -> Result<u64> {
    u64::try_from(v)
        .map_err(|_| VisitsError::Internal(format!("counter {name} holds negative value {v}")))
}

fn to_sql_count(count: u64) -> Result<i64> {
    i64::try_from(count)
        .map_err(|_| VisitsError::Internal(format!("count {count} exceeds sqlite integer range")))
}

#[async_trait]
impl CounterBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn read(&self, name: &CounterName) -> Result<Option<u64>> {
        let key = name.as_str().to_string();
        let stored: Option<i64> = self
            .with_connection(move |conn| {
                conn.query_row(
                    "select count from counters where name = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(unavailable("read"))
            })
            .await?;

        stored.map(|v| from_sql_count(name, v)).transpose()
    }

    async fn increment_native(&self, name: &CounterName) -> Result<Option<u64>> {
        let key = name.as_str().to_string();
        let count: Option<i64> = self
            .with_connection(move |conn| {
                conn.query_row(INCREMENT_SQL, params![key], |row| row.get(0))
                    .optional()
                    .map_err(unavailable("increment"))
            })
            .await?;

        // The upsert's guard skips negative or saturated rows and returns nothing.
        let count = count.ok_or_else(|| {
            VisitsError::Internal(format!(
                "counter {name} holds a value that cannot be incremented"
            ))
        })?;
        from_sql_count(name, count).map(Some)
    }

    async fn write_if(
        &self,
        name: &CounterName,
        expected: Option<u64>,
        new: u64,
    ) -> Result<WriteOutcome> {
        let key = name.as_str().to_string();
        let new = to_sql_count(new)?;
        let expected = expected.map(to_sql_count).transpose()?;

        let changed = self
            .with_connection(move |conn| {
                let res = match expected {
                    None => conn.execute(
                        "insert into counters (name, count) values (?1, ?2) \
                         on conflict(name) do nothing",
                        params![key, new],
                    ),
                    Some(current) => conn.execute(
                        "update counters set count = ?2 where name = ?1 and count = ?3",
                        params![key, new, current],
                    ),
                };
                res.map_err(unavailable("write"))
            })
            .await?;

        Ok(if changed == 1 {
            WriteOutcome::Committed
        } else {
            WriteOutcome::Conflict
        })
    }
}
