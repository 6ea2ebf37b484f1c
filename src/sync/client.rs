//! The query client: one explicit cache context shared by the store, the
//! fetcher, the poll scheduler and the mutation executor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use super::entry::CacheEntry;
use super::fetcher::QueryDef;
use super::key::QueryKey;

/// Tuning for the cache.
#[derive(Debug, Clone)]
pub struct SyncOptions {
  /// Delay between polls while a value is still pending
  pub poll_interval: Duration,
  /// How long a successful value is served to a new subscriber without refetching
  pub stale_time: Duration,
  /// Stop polling a key after this many consecutive polls
  pub max_polls: Option<u32>,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_millis(5000),
      stale_time: Duration::ZERO,
      max_polls: None,
    }
  }
}

pub(crate) struct State {
  pub entries: HashMap<QueryKey, CacheEntry>,
}

impl State {
  pub fn entry(&mut self, key: &QueryKey) -> &mut CacheEntry {
    self
      .entries
      .entry(key.clone())
      .or_insert_with(|| CacheEntry::new(key.clone()))
  }
}

struct Inner {
  state: Mutex<State>,
  queries: RwLock<HashMap<String, QueryDef>>,
  ids: AtomicU64,
  options: SyncOptions,
}

/// Keyed cache of server-derived values.
///
/// Cheap to clone; clones share the same cache. Each `QueryClient::new`
/// creates an independent cache. Must be used inside a tokio runtime, which
/// drives fetches and poll timers.
///
/// The state lock is only held for synchronous steps. It is never held
/// across an `.await` or while observers run.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Inner>,
}

impl QueryClient {
  pub fn new(options: SyncOptions) -> Self {
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(State {
          entries: HashMap::new(),
        }),
        queries: RwLock::new(HashMap::new()),
        ids: AtomicU64::new(0),
        options,
      }),
    }
  }

  pub fn options(&self) -> &SyncOptions {
    &self.inner.options
  }

  /// Register the fetcher (and poll predicate) for a query name.
  /// Replaces any earlier registration for the same name.
  pub fn register(&self, query: QueryDef) {
    let mut queries = self
      .inner
      .queries
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    queries.insert(query.name().to_string(), query);
  }

  pub(crate) fn query_def(&self, name: &str) -> Option<QueryDef> {
    let queries = self
      .inner
      .queries
      .read()
      .unwrap_or_else(PoisonError::into_inner);
    queries.get(name).cloned()
  }

  /// Monotonic id for observers, fetches and poll timers.
  pub(crate) fn next_id(&self) -> u64 {
    self.inner.ids.fetch_add(1, Ordering::Relaxed) + 1
  }

  // Every critical section leaves the map consistent, so a poisoned lock is
  // still safe to use.
  pub(crate) fn state(&self) -> MutexGuard<'_, State> {
    self
      .inner
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(SyncOptions::default())
  }
}
