use tokio::sync::mpsc;

use crate::sync::{QueryClient, QueryKey, Snapshot, Subscription};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// A watched cache entry changed
  Changed(Snapshot),
  /// Ctrl-C
  Interrupt,
}

/// Funnels cache notifications and Ctrl-C into one channel, so the console
/// loop renders from a single place.
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Forward every change of `key` as `Event::Changed`. Changes stop when
  /// the returned subscription is dropped.
  pub fn watch(&self, client: &QueryClient, key: &QueryKey) -> Subscription {
    let tx = self.tx.clone();
    client.subscribe(key, move |snapshot| {
      // Receiver gone means we're shutting down
      let _ = tx.send(Event::Changed(snapshot.clone()));
    })
  }

  /// Emit `Event::Interrupt` on Ctrl-C.
  pub fn listen_for_interrupt(&self) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        let _ = tx.send(Event::Interrupt);
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Default for EventHandler {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sync::{QueryDef, QueryStatus};

  #[tokio::test]
  async fn test_watch_forwards_changes_in_order() {
    let client = QueryClient::default();
    client.register(QueryDef::new("greeting", |_key| async {
      Ok("hello".to_string())
    }));
    let key = QueryKey::new("greeting");

    let mut events = EventHandler::new();
    let _sub = events.watch(&client, &key);

    let Some(Event::Changed(first)) = events.next().await else {
      panic!("expected a change event");
    };
    assert_eq!(first.status, QueryStatus::Loading);

    let Some(Event::Changed(second)) = events.next().await else {
      panic!("expected a change event");
    };
    assert_eq!(second.data::<String>().map(String::as_str), Some("hello"));
  }

  #[tokio::test]
  async fn test_dropped_subscription_stops_events() {
    let client = QueryClient::default();
    client.register(QueryDef::new("n", |_key| async { Ok(1u8) }));
    let key = QueryKey::new("n");

    let mut events = EventHandler::new();
    let sub = events.watch(&client, &key);
    // Loading and Success
    events.next().await;
    events.next().await;
    drop(sub);

    client.invalidate(&key);
    let _ = client.fetch(&key).await;
    assert!(events.rx.try_recv().is_err());
  }
}
