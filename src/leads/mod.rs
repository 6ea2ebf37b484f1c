//! Lead queries and mutations wired onto a `QueryClient`.

pub mod mutations;
pub mod queries;
mod stats;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::api::{Lead, LeadsBackend, NewLead, Pitch, PitchRequest};
use crate::error::Result;
use crate::sync::{Mutation, QueryClient};

pub use stats::LeadStats;

/// The lead queries registered on a client, plus the mutations against the
/// same backend.
#[derive(Clone)]
pub struct Leads {
  client: QueryClient,
  create: Mutation<NewLead, Lead>,
  delete: Mutation<i64, ()>,
  pitch: Mutation<PitchRequest, Pitch>,
}

impl Leads {
  pub fn new(client: QueryClient, backend: Arc<dyn LeadsBackend>) -> Self {
    queries::register(&client, backend.clone());
    Self {
      client,
      create: mutations::create_lead(backend.clone()),
      delete: mutations::delete_lead(backend.clone()),
      pitch: mutations::generate_pitch(backend),
    }
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  pub async fn create(&self, lead: NewLead) -> Result<Lead> {
    self.client.mutate(&self.create, lead).await
  }

  pub async fn delete(&self, id: i64) -> Result<()> {
    self.client.mutate(&self.delete, id).await
  }

  pub async fn generate_pitch(&self, lead_id: i64, user_product_description: &str) -> Result<Pitch> {
    let request = PitchRequest {
      lead_id,
      user_product_description: user_product_description.to_string(),
    };
    self.client.mutate(&self.pitch, request).await
  }
}
