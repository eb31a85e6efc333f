#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use visits_core::{
    CounterBackend, CounterName, CounterStore, MemoryBackend, Result, RetryPolicy, VisitsError,
    WriteOutcome,
};

fn visitors() -> CounterName {
    CounterName::new("visitors").unwrap()
}

fn store_over(backend: Arc<dyn CounterBackend>) -> CounterStore {
    CounterStore::new(backend, RetryPolicy::default())
}

/// Backend whose every call fails as if the network were down.
#[derive(Default)]
struct Unreachable {
    calls: AtomicU32,
}

#[async_trait]
impl CounterBackend for Unreachable {
    fn kind(&self) -> &'static str {
        "unreachable"
    }

    async fn read(&self, _name: &CounterName) -> Result<Option<u64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VisitsError::StoreUnavailable("connection refused".into()))
    }

    async fn write_if(&self, _: &CounterName, _: Option<u64>, _: u64) -> Result<WriteOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VisitsError::StoreUnavailable("connection refused".into()))
    }
}

/// Backend that always loses the conditional write.
#[derive(Default)]
struct AlwaysContended {
    writes: AtomicU32,
}

#[async_trait]
impl CounterBackend for AlwaysContended {
    fn kind(&self) -> &'static str {
        "contended"
    }

    async fn read(&self, _name: &CounterName) -> Result<Option<u64>> {
        Ok(Some(7))
    }

    async fn write_if(&self, _: &CounterName, _: Option<u64>, _: u64) -> Result<WriteOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Conflict)
    }
}

/// Backend whose writes never answer.
struct Hanging {
    inner: MemoryBackend,
}

#[async_trait]
impl CounterBackend for Hanging {
    fn kind(&self) -> &'static str {
        "hanging"
    }

    async fn read(&self, name: &CounterName) -> Result<Option<u64>> {
        self.inner.read(name).await
    }

    async fn write_if(&self, _: &CounterName, _: Option<u64>, _: u64) -> Result<WriteOutcome> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(WriteOutcome::Committed)
    }
}

#[tokio::test]
async fn first_use_returns_one() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store_over(backend.clone());

    assert_eq!(store.increment_and_get(&visitors()).await.unwrap(), 1);
    assert_eq!(backend.peek(&visitors()), Some(1));
}

#[tokio::test]
async fn increments_existing_value() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert(&visitors(), 41);
    let store = store_over(backend.clone());

    assert_eq!(store.increment_and_get(&visitors()).await.unwrap(), 42);
    assert_eq!(backend.peek(&visitors()), Some(42));
}

#[tokio::test]
async fn sequential_calls_step_by_one() {
    let store = store_over(Arc::new(MemoryBackend::new()));
    let name = visitors();

    let mut seen = Vec::new();
    for _ in 0..10 {
        seen.push(store.increment_and_get(&name).await.unwrap());
    }
    assert_eq!(seen, (1..=10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn counters_are_independent_per_name() {
    let store = store_over(Arc::new(MemoryBackend::new()));
    let a = CounterName::new("a").unwrap();
    let b = CounterName::new("b").unwrap();

    store.increment_and_get(&a).await.unwrap();
    store.increment_and_get(&a).await.unwrap();
    assert_eq!(store.increment_and_get(&b).await.unwrap(), 1);
    assert_eq!(store.increment_and_get(&a).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_concurrent_calls_from_nine() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert(&visitors(), 9);
    let store = CounterStore::new(
        backend.clone(),
        RetryPolicy {
            max_attempts: 64,
            ..RetryPolicy::default()
        },
    );

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment_and_get(&visitors()).await })
        })
        .collect();

    let mut got = Vec::new();
    for h in handles {
        got.push(h.await.unwrap().unwrap());
    }
    got.sort_unstable();

    assert_eq!(got, vec![10, 11, 12, 13, 14]);
    assert_eq!(backend.peek(&visitors()), Some(14));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn many_concurrent_calls_have_no_gaps_or_duplicates() {
    const N: u64 = 200;
    let backend = Arc::new(MemoryBackend::new());
    // Every caller commits within N attempts: each round at least one wins.
    let store = CounterStore::new(
        backend.clone(),
        RetryPolicy {
            max_attempts: N as u32,
            ..RetryPolicy::default()
        },
    );

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment_and_get(&visitors()).await })
        })
        .collect();

    let mut got = BTreeSet::new();
    for h in handles {
        assert!(got.insert(h.await.unwrap().unwrap()), "duplicate count returned");
    }

    assert_eq!(got, (1..=N).collect::<BTreeSet<u64>>());
    assert_eq!(backend.peek(&visitors()), Some(N));
}

#[tokio::test]
async fn value_survives_a_fresh_store() {
    let backend = Arc::new(MemoryBackend::new());

    let k = store_over(backend.clone())
        .increment_and_get(&visitors())
        .await
        .unwrap();
    let next = store_over(backend)
        .increment_and_get(&visitors())
        .await
        .unwrap();

    assert_eq!(next, k + 1);
}

#[tokio::test]
async fn unreachable_store_is_surfaced_without_retry() {
    let backend = Arc::new(Unreachable::default());
    let store = store_over(backend.clone());

    let err = store.increment_and_get(&visitors()).await.unwrap_err();
    assert!(matches!(err, VisitsError::StoreUnavailable(_)));
    assert!(err.is_transient());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn contention_exhausts_bounded_budget() {
    let backend = Arc::new(AlwaysContended::default());
    let store = CounterStore::new(
        backend.clone(),
        RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        },
    );

    let err = store.increment_and_get(&visitors()).await.unwrap_err();
    assert!(matches!(err, VisitsError::StoreConflict { attempts: 3 }));
    assert_eq!(err.client_code().as_str(), "STORE_CONFLICT");
    assert_eq!(backend.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn hung_write_times_out_as_unavailable() {
    let store = CounterStore::new(
        Arc::new(Hanging {
            inner: MemoryBackend::new(),
        }),
        RetryPolicy {
            max_attempts: 4,
            op_timeout: Duration::from_millis(20),
        },
    );

    let err = store.increment_and_get(&visitors()).await.unwrap_err();
    assert!(matches!(err, VisitsError::StoreUnavailable(_)));
}

#[tokio::test]
async fn reports_attempts_on_commit() {
    let store = store_over(Arc::new(MemoryBackend::new()));
    let inc = store.increment(&visitors()).await.unwrap();
    assert_eq!(inc.count, 1);
    assert_eq!(inc.attempts, 1);
}

#[tokio::test]
async fn overflow_is_an_error_not_a_wrap() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert(&visitors(), u64::MAX);
    let store = store_over(backend.clone());

    let err = store.increment_and_get(&visitors()).await.unwrap_err();
    assert!(matches!(err, VisitsError::Internal(_)));
    assert_eq!(backend.peek(&visitors()), Some(u64::MAX));
}

#[test]
fn counter_names_are_validated() {
    assert!(CounterName::new("visitors").is_ok());
    assert!(CounterName::new("site-a.home_page").is_ok());

    for bad in ["", "has space", "slash/name", "ünicode"] {
        let err = CounterName::new(bad).unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST", "{bad:?}");
    }
    assert!(CounterName::new("x".repeat(129)).is_err());
}

#[tokio::test]
async fn zero_attempt_budget_still_tries_once() {
    let store = CounterStore::new(
        Arc::new(MemoryBackend::new()),
        RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        },
    );
    assert_eq!(store.policy().max_attempts, 1);
    assert_eq!(store.backend_kind(), "memory");
    assert_eq!(store.increment_and_get(&visitors()).await.unwrap(), 1);
}

/// Backend with a native increment; its conditional-write path must stay idle.
#[derive(Default)]
struct Native {
    count: std::sync::atomic::AtomicU64,
    cas_calls: AtomicU32,
}

#[async_trait]
impl CounterBackend for Native {
    fn kind(&self) -> &'static str {
        "native"
    }

    async fn read(&self, _name: &CounterName) -> Result<Option<u64>> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn write_if(&self, _: &CounterName, _: Option<u64>, _: u64) -> Result<WriteOutcome> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Conflict)
    }

    async fn increment_native(&self, _name: &CounterName) -> Result<Option<u64>> {
        Ok(Some(self.count.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn native_increment_bypasses_the_retry_loop() {
    let backend = Arc::new(Native::default());
    let store = CounterStore::new(
        backend.clone(),
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
    );

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment(&visitors()).await })
        })
        .collect();

    let mut got = BTreeSet::new();
    for h in handles {
        let inc = h.await.unwrap().unwrap();
        assert_eq!(inc.attempts, 1);
        got.insert(inc.count);
    }

    assert_eq!(got, (1..=50).collect::<BTreeSet<u64>>());
    assert_eq!(backend.cas_calls.load(Ordering::SeqCst), 0);
}
