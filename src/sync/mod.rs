//! Client-side query cache with polling and mutation-driven invalidation.
//!
//! Inspired by TanStack Query:
//! - Values are cached per `QueryKey` and shared by every observer of the key
//! - At most one fetch per key is in flight; later requests join it
//! - A query can keep polling while its value is in a pending state
//! - Mutations invalidate the keys they affect once the write succeeds
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::new(SyncOptions::default());
//! client.register(
//!   QueryDef::new("lead", move |key| {
//!     let api = api.clone();
//!     async move { api.get_lead(key.int_param(0).unwrap_or_default()).await }
//!   })
//!   .poll_while(|lead: &Lead| lead.status.is_processing()),
//! );
//!
//! let sub = client.subscribe(&QueryKey::new("lead").with(42), |snapshot| {
//!   match snapshot.state::<Lead>() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(lead) => render_lead(lead),
//!     QueryState::Error(e) => render_error(&e),
//!     QueryState::Idle => {}
//!   }
//! });
//! ```

mod client;
mod entry;
mod fetcher;
mod key;
mod mutation;
mod poll;
mod store;

pub use client::{QueryClient, SyncOptions};
pub use entry::{QueryState, QueryStatus, Snapshot, Value};
pub use fetcher::{QueryDef, SharedFetch};
pub use key::{KeyParam, KeyPattern, QueryKey};
pub use mutation::Mutation;
pub use store::Subscription;
