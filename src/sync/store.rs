//! Entity store: entries, observers, results and invalidation.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::QueryClient;
use super::entry::{CacheEntry, Observer, ObserverId, QueryStatus, Snapshot, Value};
use super::key::{KeyPattern, QueryKey};
use crate::error::Result;

/// Call each observer with the snapshot, in subscription order.
///
/// Callers pass a copy of the observer list taken under the lock, so
/// observers may subscribe or unsubscribe while being notified.
pub(crate) fn notify(observers: &[Observer], snapshot: &Snapshot) {
  for observer in observers {
    observer(snapshot);
  }
}

/// Interest in one key. Dropping it (or calling `unsubscribe`) removes the
/// observer; when the last observer of a key leaves, its poll timer is
/// cancelled but the cached value is kept.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  client: QueryClient,
  key: QueryKey,
  id: ObserverId,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.client.remove_observer(&self.key, self.id);
  }
}

impl QueryClient {
  /// Snapshot of the entry for `key`, creating an `Idle` one if needed.
  /// Does not fetch.
  pub fn get_or_create(&self, key: &QueryKey) -> Snapshot {
    self.state().entry(key).snapshot()
  }

  /// Snapshot of the entry for `key`, if it exists.
  pub fn snapshot(&self, key: &QueryKey) -> Option<Snapshot> {
    self.state().entries.get(key).map(CacheEntry::snapshot)
  }

  /// Register `observer` for changes to `key`.
  ///
  /// Starts a fetch when the entry is idle, failed, stale or older than the
  /// stale time and nothing is in flight. When this is the first observer and
  /// no fetch is needed, polling is re-derived from the cached value.
  pub fn subscribe<F>(&self, key: &QueryKey, observer: F) -> Subscription
  where
    F: Fn(&Snapshot) + Send + Sync + 'static,
  {
    let id = self.next_id();
    let stale_time = self.options().stale_time;
    let needs_fetch = {
      let mut state = self.state();
      let entry = state.entry(key);
      entry.observers.push((id, Arc::new(observer)));
      // A request for removed data is still running; fetch again after it
      if let Some(in_flight) = entry.in_flight.as_mut().filter(|f| f.discarded) {
        in_flight.refetch_after = true;
      }
      let needs_fetch = entry.needs_fetch(stale_time);
      if !needs_fetch && entry.observers.len() == 1 {
        self.evaluate_poll(entry);
      }
      needs_fetch
    };

    debug!(key = %key, needs_fetch, "subscribed");
    if needs_fetch {
      let _ = self.fetch(key);
    }

    Subscription {
      client: self.clone(),
      key: key.clone(),
      id,
    }
  }

  fn remove_observer(&self, key: &QueryKey, id: ObserverId) {
    let removed = {
      let mut state = self.state();
      let Some(entry) = state.entries.get_mut(key) else {
        return;
      };
      let removed = entry
        .observers
        .iter()
        .position(|(observer_id, _)| *observer_id == id)
        .map(|at| entry.observers.remove(at));
      if entry.observers.is_empty() {
        Self::disarm_entry(entry);
        entry.polls = 0;
        debug!(key = %key, "last observer left");
      }
      removed
    };
    // The observer may own subscriptions of its own, which lock when dropped
    drop(removed);
  }

  /// Record the outcome of fetch `fetch_id` and notify observers.
  ///
  /// Ignored when the entry was removed or another fetch replaced this one.
  /// When the key was invalidated while this fetch ran and is still observed,
  /// one follow-up fetch starts in its place.
  pub(crate) fn set_result(&self, key: &QueryKey, fetch_id: u64, outcome: Result<Value>) {
    let mut follow_up = None;
    let mut evicted = None;
    let notification = {
      let mut state = self.state();
      let Some(entry) = state.entries.get_mut(key) else {
        debug!(key = %key, "entry removed before fetch settled");
        return;
      };
      let finished = match entry.in_flight.take() {
        Some(in_flight) if in_flight.id == fetch_id => in_flight,
        other => {
          entry.in_flight = other;
          return;
        }
      };

      if finished.discarded {
        debug!(key = %key, "dropping result for removed data");
      } else {
        match &outcome {
          Ok(_) => debug!(key = %key, "fetch succeeded"),
          Err(err) => warn!(key = %key, error = %err, "fetch failed"),
        }
        entry.apply(outcome);
      }

      let observed = !entry.observers.is_empty();
      if finished.refetch_after && observed {
        debug!(key = %key, "refetching after invalidation during fetch");
        follow_up = Some(self.begin_fetch(entry, true));
        Some((entry.snapshot(), entry.observer_list()))
      } else if finished.discarded {
        if !observed && !finished.refetch_after {
          evicted = state.entries.remove(key);
        }
        None
      } else {
        self.evaluate_poll(entry);
        Some((entry.snapshot(), entry.observer_list()))
      }
    };

    drop(evicted);
    if let Some((snapshot, observers)) = notification {
      notify(&observers, &snapshot);
    }
    if let Some(future) = follow_up {
      tokio::spawn(future);
    }
  }

  /// Mark `key` stale, creating the entry if needed.
  ///
  /// Observed keys are refetched right away. When a fetch that started before
  /// this call is still running, a single follow-up fetch is queued behind it
  /// instead. A fetch started by an earlier invalidation already covers this
  /// one. Unobserved keys are refetched on their next subscription.
  pub fn invalidate(&self, key: &QueryKey) {
    let refetch = {
      let mut state = self.state();
      let entry = state.entry(key);
      entry.stale = true;
      match entry.in_flight.as_mut() {
        Some(in_flight) => {
          if in_flight.discarded || !in_flight.after_invalidation {
            in_flight.refetch_after = true;
          }
          false
        }
        None => !entry.observers.is_empty(),
      }
    };

    debug!(key = %key, refetch, "invalidated");
    if refetch {
      let _ = self.start_fetch(key, true);
    }
  }

  /// Invalidate every key matching `pattern`. Returns how many were invalidated.
  pub fn invalidate_matching(&self, pattern: &KeyPattern) -> usize {
    let keys: Vec<QueryKey> = match pattern {
      KeyPattern::Exact(key) => vec![key.clone()],
      KeyPattern::Prefix(_) => self
        .state()
        .entries
        .keys()
        .filter(|key| pattern.matches(key))
        .cloned()
        .collect(),
    };
    for key in &keys {
      self.invalidate(key);
    }
    keys.len()
  }

  /// Drop the cached data for `key`.
  ///
  /// Without observers the entry is deleted. With observers it is reset to
  /// `Idle` and marked stale, and they are notified; it is not refetched.
  /// A request still running for the key stays registered until it settles,
  /// so no second one starts, and its outcome is dropped.
  pub fn remove(&self, key: &QueryKey) {
    let mut evicted = None;
    let mut old_value = None;
    let notification = {
      let mut state = self.state();
      let Some(entry) = state.entries.get_mut(key) else {
        return;
      };
      Self::disarm_entry(entry);
      if let Some(in_flight) = entry.in_flight.as_mut() {
        in_flight.discarded = true;
        in_flight.refetch_after = false;
      }

      if entry.observers.is_empty() && entry.in_flight.is_none() {
        evicted = state.entries.remove(key);
        None
      } else {
        old_value = entry.value.take();
        entry.error = None;
        entry.status = QueryStatus::Idle;
        entry.stale = true;
        entry.updated_at = None;
        entry.polls = 0;
        (!entry.observers.is_empty()).then(|| (entry.snapshot(), entry.observer_list()))
      }
    };

    drop((evicted, old_value));
    info!(key = %key, "removed from cache");
    if let Some((snapshot, observers)) = notification {
      notify(&observers, &snapshot);
    }
  }

  /// Evict every entry with no observers and no fetch in flight.
  pub fn gc(&self) -> usize {
    let evicted: Vec<CacheEntry> = {
      let mut state = self.state();
      let keys: Vec<QueryKey> = state
        .entries
        .iter()
        .filter(|(_, entry)| entry.observers.is_empty() && entry.in_flight.is_none())
        .map(|(key, _)| key.clone())
        .collect();
      keys
        .iter()
        .filter_map(|key| state.entries.remove(key))
        .collect()
    };
    if !evicted.is_empty() {
      debug!(evicted = evicted.len(), "cache gc");
    }
    evicted.len()
  }

  /// Number of cached keys.
  pub fn len(&self) -> usize {
    self.state().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
