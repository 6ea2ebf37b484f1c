//! Writes against the backend and the cache keys each one affects.

use std::sync::Arc;

use crate::api::{Lead, LeadStatus, LeadsBackend, NewLead, Pitch, PitchRequest};
use crate::error::Error;
use crate::leads::queries::{cached_lead, lead_detail, leads_list, pitches};
use crate::sync::{KeyPattern, Mutation};

/// Create a lead. Invalidates the list.
pub fn create_lead(backend: Arc<dyn LeadsBackend>) -> Mutation<NewLead, Lead> {
  Mutation::new("create-lead", move |new: NewLead| {
    let backend = backend.clone();
    async move { backend.create_lead(&new).await }
  })
  .invalidates(|_| vec![KeyPattern::Exact(leads_list())])
}

/// Delete a lead by id. Invalidates the list and drops the lead's own entry.
pub fn delete_lead(backend: Arc<dyn LeadsBackend>) -> Mutation<i64, ()> {
  Mutation::new("delete-lead", move |id: i64| {
    let backend = backend.clone();
    async move { backend.delete_lead(id).await }
  })
  .invalidates(|_| vec![KeyPattern::Exact(leads_list())])
  .removes(|id| vec![lead_detail(*id)])
}

/// Generate a pitch for a completed lead. Invalidates that lead's pitches.
///
/// Rejected without a request when the description is blank or the cached
/// lead is known not to be completed yet.
pub fn generate_pitch(backend: Arc<dyn LeadsBackend>) -> Mutation<PitchRequest, Pitch> {
  Mutation::new("generate-pitch", move |req: PitchRequest| {
    let backend = backend.clone();
    async move {
      backend
        .generate_pitch(req.lead_id, req.user_product_description.trim())
        .await
    }
  })
  .validate(|client, req| {
    if req.user_product_description.trim().is_empty() {
      return Err(Error::Validation(
        "Product description is required".to_string(),
      ));
    }
    match cached_lead(client, req.lead_id) {
      Some(lead) if lead.status != LeadStatus::Completed => Err(Error::Validation(format!(
        "Lead {} is {}; pitches need a completed analysis",
        lead.id, lead.status
      ))),
      _ => Ok(()),
    }
  })
  .invalidates(|req| vec![KeyPattern::Prefix(pitches(req.lead_id))])
}
