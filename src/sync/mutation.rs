//! Mutation executor: runs a write and, once it succeeds, invalidates the
//! keys the write declared as affected.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::QueryClient;
use super::key::{KeyPattern, QueryKey};
use crate::error::Result;

type WriteFn<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync>;
type ValidateFn<I> = Arc<dyn Fn(&QueryClient, &I) -> Result<()> + Send + Sync>;
type KeysFn<I, K> = Arc<dyn Fn(&I) -> Vec<K> + Send + Sync>;

/// A write operation and the cache keys it affects.
pub struct Mutation<I, O> {
  name: String,
  write: WriteFn<I, O>,
  validate: Option<ValidateFn<I>>,
  invalidates: Option<KeysFn<I, KeyPattern>>,
  removes: Option<KeysFn<I, QueryKey>>,
}

impl<I, O> Clone for Mutation<I, O> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      write: Arc::clone(&self.write),
      validate: self.validate.clone(),
      invalidates: self.invalidates.clone(),
      removes: self.removes.clone(),
    }
  }
}

impl<I: 'static, O: 'static> Mutation<I, O> {
  pub fn new<F, Fut>(name: impl Into<String>, write: F) -> Self
  where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
  {
    Self {
      name: name.into(),
      write: Arc::new(move |input| write(input).boxed()),
      validate: None,
      invalidates: None,
      removes: None,
    }
  }

  /// Check the input before any request is made. May consult the cache.
  pub fn validate<F>(mut self, validate: F) -> Self
  where
    F: Fn(&QueryClient, &I) -> Result<()> + Send + Sync + 'static,
  {
    self.validate = Some(Arc::new(validate));
    self
  }

  /// Keys to invalidate once the write succeeds.
  pub fn invalidates<F>(mut self, keys: F) -> Self
  where
    F: Fn(&I) -> Vec<KeyPattern> + Send + Sync + 'static,
  {
    self.invalidates = Some(Arc::new(keys));
    self
  }

  /// Keys whose cached data no longer exists once the write succeeds.
  pub fn removes<F>(mut self, keys: F) -> Self
  where
    F: Fn(&I) -> Vec<QueryKey> + Send + Sync + 'static,
  {
    self.removes = Some(Arc::new(keys));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl QueryClient {
  /// Run `mutation` with `input`.
  ///
  /// On success the declared keys are removed and invalidated before this
  /// returns, so observers of those keys already see a refetch in flight.
  /// On failure nothing in the cache changes and the error goes back to the
  /// caller only. Writes are never retried.
  pub async fn mutate<I, O>(&self, mutation: &Mutation<I, O>, input: I) -> Result<O> {
    if let Some(validate) = &mutation.validate {
      if let Err(err) = validate(self, &input) {
        warn!(mutation = %mutation.name, error = %err, "mutation rejected");
        return Err(err);
      }
    }

    let invalidates = mutation
      .invalidates
      .as_ref()
      .map(|keys| keys(&input))
      .unwrap_or_default();
    let removes = mutation
      .removes
      .as_ref()
      .map(|keys| keys(&input))
      .unwrap_or_default();

    debug!(mutation = %mutation.name, "mutation started");
    match (mutation.write)(input).await {
      Ok(output) => {
        for key in &removes {
          self.remove(key);
        }
        let invalidated: usize = invalidates
          .iter()
          .map(|pattern| self.invalidate_matching(pattern))
          .sum();
        info!(mutation = %mutation.name, invalidated, removed = removes.len(), "mutation succeeded");
        Ok(output)
      }
      Err(err) => {
        warn!(mutation = %mutation.name, error = %err, "mutation failed");
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::sync::{QueryDef, QueryStatus};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn client_with_list() -> (QueryClient, Arc<AtomicUsize>) {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    client.register(QueryDef::new("items", move |_key| {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Ok(vec!["a".to_string()]) }
    }));
    client.register(QueryDef::new("item", |key: QueryKey| async move {
      Ok(key.int_param(0).unwrap_or_default())
    }));
    (client, calls)
  }

  fn delete_item(writes: Arc<AtomicUsize>) -> Mutation<i64, ()> {
    Mutation::new("delete-item", move |_id: i64| {
      writes.fetch_add(1, Ordering::SeqCst);
      async { Ok(()) }
    })
    .invalidates(|_id| vec![KeyPattern::all("items")])
    .removes(|id| vec![QueryKey::new("item").with(*id)])
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  #[tokio::test]
  async fn test_success_invalidates_before_returning() {
    let (client, calls) = client_with_list();
    let list = QueryKey::new("items");
    let _sub = client.subscribe(&list, |_| {});
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let writes = Arc::new(AtomicUsize::new(0));
    client.mutate(&delete_item(writes.clone()), 5).await.unwrap();

    // Refetch already in flight when mutate resolved
    assert_eq!(client.snapshot(&list).unwrap().status, QueryStatus::Loading);
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(writes.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_success_removes_declared_keys() {
    let (client, _calls) = client_with_list();
    let detail = QueryKey::new("item").with(5);
    client.fetch(&detail).await.unwrap();

    let writes = Arc::new(AtomicUsize::new(0));
    client.mutate(&delete_item(writes), 5).await.unwrap();
    assert!(client.snapshot(&detail).is_none());
  }

  #[tokio::test]
  async fn test_unobserved_key_only_marked_stale() {
    let (client, calls) = client_with_list();
    let list = QueryKey::new("items");
    client.fetch(&list).await.unwrap();

    let writes = Arc::new(AtomicUsize::new(0));
    client.mutate(&delete_item(writes), 1).await.unwrap();
    settle().await;
    assert!(client.snapshot(&list).unwrap().is_stale);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failure_leaves_cache_untouched() {
    let (client, calls) = client_with_list();
    let list = QueryKey::new("items");
    let _sub = client.subscribe(&list, |_| {});
    settle().await;

    let failing: Mutation<i64, ()> = Mutation::new("delete-item", |_id: i64| async {
      Err(Error::server(404, Some("Lead not found".to_string())))
    })
    .invalidates(|_| vec![KeyPattern::all("items")]);

    let err = client.mutate(&failing, 3).await.unwrap_err();
    assert_eq!(err.to_string(), "Lead not found");

    settle().await;
    let snapshot = client.snapshot(&list).unwrap();
    assert!(snapshot.is_success());
    assert!(!snapshot.is_stale);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_validation_runs_before_write() {
    let (client, _calls) = client_with_list();
    let writes = Arc::new(AtomicUsize::new(0));
    let mutation = delete_item(writes.clone()).validate(|_client, id| {
      if *id <= 0 {
        Err(Error::Validation("id must be positive".to_string()))
      } else {
        Ok(())
      }
    });

    let err = client.mutate(&mutation, -1).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(writes.load(Ordering::SeqCst), 0);

    client.mutate(&mutation, 1).await.unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_overlapping_mutations_coalesce_refetch() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    client.register(QueryDef::new("items", move |_key| {
      counter.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(0u8)
      }
    }));
    let list = QueryKey::new("items");
    let _sub = client.subscribe(&list, |_| {});
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let writes = Arc::new(AtomicUsize::new(0));
    let mutation = delete_item(writes.clone());
    let (a, b) = futures::join!(client.mutate(&mutation, 1), client.mutate(&mutation, 2));
    a.unwrap();
    b.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(writes.load(Ordering::SeqCst), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
