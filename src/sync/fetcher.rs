//! Fetcher: runs the retrieval capability registered for a query name and
//! reports the outcome back into the store.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::client::QueryClient;
use super::entry::{CacheEntry, InFlight, QueryStatus, Value};
use super::key::QueryKey;
use super::store::notify;
use crate::error::{Error, Result};

/// An in-flight fetch. Every caller asking for the same key gets a clone.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;

type FetchFn = Arc<dyn Fn(QueryKey) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
type PollPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// How to fetch every key with a given query name, and whether its values
/// should keep being polled.
#[derive(Clone)]
pub struct QueryDef {
  name: String,
  fetch: FetchFn,
  poll_while: Option<PollPredicate>,
}

impl QueryDef {
  /// Create a query definition from an async retrieval function.
  ///
  /// The function receives the full key, so parameters such as an id can be
  /// read from it.
  pub fn new<T, F, Fut>(name: impl Into<String>, fetch: F) -> Self
  where
    T: Send + Sync + 'static,
    F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      name: name.into(),
      fetch: Arc::new(move |key| {
        let fut = fetch(key);
        async move { fut.await.map(|v| Arc::new(v) as Value) }.boxed()
      }),
      poll_while: None,
    }
  }

  /// Keep refetching while the latest successful value satisfies `predicate`.
  pub fn poll_while<T, P>(mut self, predicate: P) -> Self
  where
    T: Any,
    P: Fn(&T) -> bool + Send + Sync + 'static,
  {
    self.poll_while = Some(Arc::new(move |value: &Value| {
      (**value).downcast_ref::<T>().is_some_and(|v| predicate(v))
    }));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn should_poll(&self, value: &Value) -> bool {
    self.poll_while.as_ref().is_some_and(|p| p(value))
  }
}

impl QueryClient {
  /// Fetch `key` now.
  ///
  /// If a fetch for the key is already in flight, its future is returned and
  /// no new request is made. Otherwise the entry moves to `Loading`, observers
  /// are notified, and the request is spawned so it completes even when the
  /// returned future is dropped. Failures are not retried.
  pub fn fetch(&self, key: &QueryKey) -> SharedFetch {
    self.start_fetch(key, false)
  }

  pub(crate) fn start_fetch(&self, key: &QueryKey, after_invalidation: bool) -> SharedFetch {
    let (future, snapshot, observers) = {
      let mut state = self.state();
      let entry = state.entry(key);
      if let Some(in_flight) = entry.in_flight.as_mut() {
        if in_flight.discarded {
          in_flight.refetch_after = true;
        }
        debug!(key = %key, "joining in-flight fetch");
        return in_flight.future.clone();
      }

      let future = self.begin_fetch(entry, after_invalidation);
      (future, entry.snapshot(), entry.observer_list())
    };

    debug!(key = %key, "fetch started");
    // Loading must reach observers before the result can
    notify(&observers, &snapshot);
    tokio::spawn(future.clone());
    future
  }

  /// Fetch `key` and read the value back as `T`.
  pub async fn fetch_as<T: Any + Send + Sync>(&self, key: &QueryKey) -> Result<Arc<T>> {
    let value = self.fetch(key).await?;
    value
      .downcast::<T>()
      .map_err(|_| Error::TypeMismatch(key.to_string()))
  }

  /// Move `entry` to `Loading` and register a new request for it. The caller
  /// spawns the returned future after releasing the state lock.
  pub(crate) fn begin_fetch(&self, entry: &mut CacheEntry, after_invalidation: bool) -> SharedFetch {
    let fetch_id = self.next_id();
    entry.status = QueryStatus::Loading;
    entry.stale = false;
    let future = self.fetch_future(entry.key.clone(), fetch_id);
    entry.in_flight = Some(InFlight {
      id: fetch_id,
      future: future.clone(),
      after_invalidation,
      refetch_after: false,
      discarded: false,
    });
    future
  }

  fn fetch_future(&self, key: QueryKey, fetch_id: u64) -> SharedFetch {
    let client = self.clone();
    async move {
      // Looked up on first poll, outside the state lock
      let outcome = match client.query_def(key.name()) {
        Some(query) => (query.fetch)(key.clone()).await,
        None => Err(Error::UnknownQuery(key.name().to_string())),
      };
      client.set_result(&key, fetch_id, outcome.clone());
      outcome
    }
    .boxed()
    .shared()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::SyncOptions;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use tokio::sync::Notify;

  fn client() -> QueryClient {
    QueryClient::new(SyncOptions::default())
  }

  #[tokio::test]
  async fn test_fetch_success_stores_value() {
    let client = client();
    client.register(QueryDef::new("numbers", |_key| async {
      Ok(vec![1, 2, 3])
    }));

    let key = QueryKey::new("numbers");
    let value = client.fetch_as::<Vec<i32>>(&key).await.unwrap();
    assert_eq!(*value, vec![1, 2, 3]);

    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    assert!(snapshot.updated_at.is_some());
  }

  #[tokio::test]
  async fn test_fetch_error_is_stored_and_not_retried() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    client.register(QueryDef::new("broken", move |_key| {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Err::<i32, _>(Error::server(500, Some("boom".to_string()))) }
    }));

    let key = QueryKey::new("broken");
    let err = client.fetch(&key).await.unwrap_err();
    assert_eq!(err.to_string(), "boom");

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let snapshot = client.snapshot(&key).unwrap();
    assert!(snapshot.is_error());
    assert_eq!(snapshot.error, Some(err));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_unknown_query_becomes_error_state() {
    let client = client();
    let key = QueryKey::new("nobody-registered-this");
    let err = client.fetch(&key).await.unwrap_err();
    assert_eq!(err, Error::UnknownQuery("nobody-registered-this".to_string()));
    assert!(client.snapshot(&key).unwrap().is_error());
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_request() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let (counter, release) = (calls.clone(), gate.clone());
    client.register(QueryDef::new("slow", move |_key| {
      counter.fetch_add(1, Ordering::SeqCst);
      let release = release.clone();
      async move {
        release.notified().await;
        Ok(42u64)
      }
    }));

    let key = QueryKey::new("slow");
    let first = client.fetch(&key);
    let second = client.fetch(&key);
    assert!(client.snapshot(&key).unwrap().is_loading());

    // Let the spawned request reach the gate
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    gate.notify_one();

    let (a, b) = futures::join!(first, second);
    assert_eq!(a.unwrap().downcast_ref::<u64>(), Some(&42));
    assert_eq!(b.unwrap().downcast_ref::<u64>(), Some(&42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_observers_see_loading_then_success() {
    let client = client();
    client.register(QueryDef::new("word", |_key| async {
      Ok("hello".to_string())
    }));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let key = QueryKey::new("word");
    let _sub = client.subscribe(&key, move |snapshot| {
      log.lock().unwrap().push(snapshot.status);
    });

    client.fetch(&key).await.unwrap();
    assert_eq!(
      *seen.lock().unwrap(),
      vec![QueryStatus::Loading, QueryStatus::Success]
    );
  }

  #[tokio::test]
  async fn test_fetch_reads_params_from_key() {
    let client = client();
    client.register(QueryDef::new("double", |key: QueryKey| async move {
      key
        .int_param(0)
        .map(|n| n * 2)
        .ok_or_else(|| Error::Validation("missing param".to_string()))
    }));

    let value = client
      .fetch_as::<i64>(&QueryKey::new("double").with(21))
      .await
      .unwrap();
    assert_eq!(*value, 42);

    let err = client.fetch(&QueryKey::new("double")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn test_fetch_as_wrong_type() {
    let client = client();
    client.register(QueryDef::new("n", |_key| async { Ok(1u8) }));
    let err = client
      .fetch_as::<String>(&QueryKey::new("n"))
      .await
      .unwrap_err();
    assert_eq!(err, Error::TypeMismatch("n".to_string()));
  }
}
