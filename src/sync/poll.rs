//! Poll scheduler: refetches a key on a fixed delay while its latest
//! successful value is still pending.
//!
//! Each entry owns at most one timer. Timers carry a generation number so a
//! timer that already fired can never clear the one that replaced it.

use std::time::Duration;
use tracing::{debug, warn};

use super::client::QueryClient;
use super::entry::{CacheEntry, PollHandle, QueryStatus};
use super::key::QueryKey;

impl QueryClient {
  /// Schedule a refetch of `key` after `delay`, replacing any pending one.
  pub fn arm(&self, key: &QueryKey, delay: Duration) {
    let mut state = self.state();
    let entry = state.entry(key);
    self.arm_entry(entry, delay);
  }

  /// Cancel the pending refetch of `key`, if any.
  pub fn disarm(&self, key: &QueryKey) {
    let mut state = self.state();
    if let Some(entry) = state.entries.get_mut(key) {
      Self::disarm_entry(entry);
    }
  }

  /// Decide whether `entry` keeps polling, from its current status and value.
  ///
  /// Polls only on `Success` with at least one observer and a value the
  /// query's predicate still considers pending.
  pub(crate) fn evaluate_poll(&self, entry: &mut CacheEntry) {
    let pending = entry.status == QueryStatus::Success
      && !entry.observers.is_empty()
      && match (&entry.value, self.query_def(entry.key.name())) {
        (Some(value), Some(query)) => query.should_poll(value),
        _ => false,
      };

    if !pending {
      Self::disarm_entry(entry);
      entry.polls = 0;
      return;
    }

    if let Some(max) = self.options().max_polls {
      if entry.polls >= max {
        warn!(key = %entry.key, polls = entry.polls, "poll limit reached, not polling further");
        Self::disarm_entry(entry);
        return;
      }
    }

    self.arm_entry(entry, self.options().poll_interval);
  }

  fn arm_entry(&self, entry: &mut CacheEntry, delay: Duration) {
    Self::disarm_entry(entry);

    let generation = self.next_id();
    let client = self.clone();
    let key = entry.key.clone();
    let task = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      client.poll_fired(&key, generation);
    });

    entry.poll = Some(PollHandle {
      generation,
      abort: task.abort_handle(),
    });
    entry.polls += 1;
    debug!(key = %entry.key, delay_ms = delay.as_millis() as u64, poll = entry.polls, "poll armed");
  }

  pub(crate) fn disarm_entry(entry: &mut CacheEntry) {
    if let Some(handle) = entry.poll.take() {
      handle.abort.abort();
      debug!(key = %entry.key, "poll disarmed");
    }
  }

  fn poll_fired(&self, key: &QueryKey, generation: u64) {
    let refetch = {
      let mut state = self.state();
      match state.entries.get_mut(key) {
        Some(entry) if entry.poll.as_ref().map(|p| p.generation) == Some(generation) => {
          entry.poll = None;
          !entry.observers.is_empty()
        }
        _ => false,
      }
    };

    if refetch {
      let _ = self.fetch(key);
    }
  }
}
