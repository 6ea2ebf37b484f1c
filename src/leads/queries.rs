//! Query keys for leads and the fetchers behind them.

use std::sync::Arc;

use crate::api::{Lead, LeadsBackend};
use crate::error::{Error, Result};
use crate::sync::{QueryClient, QueryDef, QueryKey};

pub const LEADS: &str = "leads";
pub const LEAD: &str = "lead";
pub const PITCHES: &str = "pitches";

/// `("leads")`: every lead.
pub fn leads_list() -> QueryKey {
  QueryKey::new(LEADS)
}

/// `("lead", id)`: one lead, polled while it is still being analyzed.
pub fn lead_detail(id: i64) -> QueryKey {
  QueryKey::new(LEAD).with(id)
}

/// `("pitches", lead_id)`: pitches generated for a lead.
pub fn pitches(lead_id: i64) -> QueryKey {
  QueryKey::new(PITCHES).with(lead_id)
}

/// Register the lead queries with `client`.
pub fn register(client: &QueryClient, backend: Arc<dyn LeadsBackend>) {
  let list_backend = backend.clone();
  client.register(QueryDef::new(LEADS, move |_key| {
    let backend = list_backend.clone();
    async move { backend.list_leads().await }
  }));

  client.register(
    QueryDef::new(LEAD, move |key: QueryKey| {
      let backend = backend.clone();
      async move {
        let id = lead_id(&key)?;
        backend.get_lead(id).await
      }
    })
    .poll_while(|lead: &Lead| lead.status.is_processing()),
  );
}

fn lead_id(key: &QueryKey) -> Result<i64> {
  key
    .int_param(0)
    .ok_or_else(|| Error::Validation(format!("{} has no lead id", key)))
}

/// The freshest cached copy of a lead: the detail entry, else the list.
pub fn cached_lead(client: &QueryClient, id: i64) -> Option<Lead> {
  let from_detail = client
    .snapshot(&lead_detail(id))
    .and_then(|s| s.data::<Lead>().cloned());
  from_detail.or_else(|| {
    client
      .snapshot(&leads_list())
      .and_then(|s| s.data::<Vec<Lead>>().and_then(|leads| leads.iter().find(|l| l.id == id).cloned()))
  })
}
