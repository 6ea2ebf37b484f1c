//! Cache entries and the snapshots observers receive.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use super::fetcher::SharedFetch;
use super::key::QueryKey;
use crate::error::{Error, Result};

/// A cached value. Type-erased so one cache can hold every query's output.
pub type Value = Arc<dyn Any + Send + Sync>;

pub(crate) type Observer = Arc<dyn Fn(&Snapshot) + Send + Sync>;
pub(crate) type ObserverId = u64;

/// Fetch status of a cache entry.
///
/// Transitions are `Idle -> Loading -> {Success, Error}`, and back to
/// `Loading` on refetch. `Loading` is never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  Idle,
  Loading,
  Success,
  Error,
}

/// The state of a query, with typed access to its data
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(Error),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&Error> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

pub(crate) struct InFlight {
  pub id: u64,
  pub future: SharedFetch,
  /// Started by an invalidation, so later invalidations are already covered.
  pub after_invalidation: bool,
  /// Another fetch must follow this one once it settles.
  pub refetch_after: bool,
  /// The entry was removed while this request ran; its outcome is dropped.
  pub discarded: bool,
}

/// The single timer owned by an entry while it is polling.
pub(crate) struct PollHandle {
  pub generation: u64,
  pub abort: AbortHandle,
}

/// Stored state for one key.
pub(crate) struct CacheEntry {
  pub key: QueryKey,
  pub value: Option<Value>,
  pub status: QueryStatus,
  pub error: Option<Error>,
  pub updated_at: Option<DateTime<Utc>>,
  /// Set by invalidation and removal; cleared when a fetch starts.
  pub stale: bool,
  pub in_flight: Option<InFlight>,
  pub poll: Option<PollHandle>,
  /// Consecutive polls armed since the entry last left its pending state.
  pub polls: u32,
  /// In subscription order.
  pub observers: Vec<(ObserverId, Observer)>,
}

impl CacheEntry {
  pub fn new(key: QueryKey) -> Self {
    Self {
      key,
      value: None,
      status: QueryStatus::Idle,
      error: None,
      updated_at: None,
      stale: false,
      in_flight: None,
      poll: None,
      polls: 0,
      observers: Vec::new(),
    }
  }

  /// Record the outcome of a fetch.
  pub fn apply(&mut self, outcome: Result<Value>) {
    self.updated_at = Some(Utc::now());
    match outcome {
      Ok(value) => {
        self.status = QueryStatus::Success;
        self.value = Some(value);
        self.error = None;
      }
      Err(err) => {
        // Keep the last good value around for display next to the error
        self.status = QueryStatus::Error;
        self.error = Some(err);
      }
    }
  }

  /// Whether a fresh subscription should fetch instead of serving what is cached.
  pub fn needs_fetch(&self, stale_time: Duration) -> bool {
    if self.in_flight.is_some() {
      return false;
    }
    match self.status {
      QueryStatus::Idle | QueryStatus::Error => true,
      QueryStatus::Loading => false,
      QueryStatus::Success => self.stale || self.is_expired(stale_time),
    }
  }

  fn is_expired(&self, stale_time: Duration) -> bool {
    match self.updated_at {
      Some(at) => Utc::now()
        .signed_duration_since(at)
        .to_std()
        .map(|age| age >= stale_time)
        .unwrap_or(false),
      None => true,
    }
  }

  pub fn observer_list(&self) -> Vec<Observer> {
    self.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      key: self.key.clone(),
      status: self.status,
      value: self.value.clone(),
      error: self.error.clone(),
      updated_at: self.updated_at,
      is_stale: self.stale,
      is_polling: self.poll.is_some(),
    }
  }
}

/// Read-only copy of an entry, handed to observers and returned by `snapshot`.
#[derive(Clone)]
pub struct Snapshot {
  pub key: QueryKey,
  pub status: QueryStatus,
  pub error: Option<Error>,
  pub updated_at: Option<DateTime<Utc>>,
  pub is_stale: bool,
  pub is_polling: bool,
  value: Option<Value>,
}

impl Snapshot {
  /// The cached value, if present and of type `T`.
  ///
  /// Still available while a refetch is loading or after it failed.
  pub fn data<T: Any>(&self) -> Option<&T> {
    self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
  }

  pub fn has_value(&self) -> bool {
    self.value.is_some()
  }

  /// Typed view of the entry for rendering.
  pub fn state<T: Any>(&self) -> QueryState<&T> {
    match self.status {
      QueryStatus::Idle => QueryState::Idle,
      QueryStatus::Loading => QueryState::Loading,
      QueryStatus::Error => QueryState::Error(
        self
          .error
          .clone()
          .unwrap_or_else(|| Error::Network("Unknown error".to_string())),
      ),
      QueryStatus::Success => match self.data::<T>() {
        Some(data) => QueryState::Success(data),
        None => QueryState::Error(Error::TypeMismatch(self.key.to_string())),
      },
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

impl fmt::Debug for Snapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Snapshot")
      .field("key", &self.key)
      .field("status", &self.status)
      .field("has_value", &self.value.is_some())
      .field("error", &self.error)
      .field("updated_at", &self.updated_at)
      .field("is_stale", &self.is_stale)
      .field("is_polling", &self.is_polling)
      .finish()
  }
}
