//! In-memory backend for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::{Lead, LeadStatus, LeadsBackend, NewLead, Pitch};
use crate::error::{Error, Result};

pub fn lead(id: i64, status: LeadStatus) -> Lead {
  Lead {
    id,
    company_name: format!("Company {}", id),
    website_url: format!("https://company{}.example", id),
    status,
    page_title: None,
    summary: None,
    bullet_points: None,
    analysis_json: None,
    created_at: "2024-05-01T10:00:00".to_string(),
  }
}

#[derive(Default)]
struct Inner {
  leads: Vec<Lead>,
  next_id: i64,
  calls: HashMap<&'static str, usize>,
  fail_next: Option<Error>,
}

/// Behaves like the real backend: duplicate websites and pitches for
/// unfinished leads are rejected with 400, unknown ids with 404.
pub struct FakeBackend {
  inner: Mutex<Inner>,
}

impl FakeBackend {
  pub fn new(leads: Vec<Lead>) -> Self {
    let next_id = leads.iter().map(|l| l.id).max().unwrap_or(0) + 1;
    Self {
      inner: Mutex::new(Inner {
        leads,
        next_id,
        ..Inner::default()
      }),
    }
  }

  pub fn calls(&self, op: &str) -> usize {
    self.inner.lock().unwrap().calls.get(op).copied().unwrap_or(0)
  }

  pub fn set_status(&self, id: i64, status: LeadStatus) {
    let mut inner = self.inner.lock().unwrap();
    if let Some(lead) = inner.leads.iter_mut().find(|l| l.id == id) {
      lead.status = status;
    }
  }

  /// Make the next call of any kind fail with `err`.
  pub fn fail_next(&self, err: Error) {
    self.inner.lock().unwrap().fail_next = Some(err);
  }

  fn begin(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, Inner>> {
    let mut inner = self.inner.lock().unwrap();
    *inner.calls.entry(op).or_default() += 1;
    match inner.fail_next.take() {
      Some(err) => Err(err),
      None => Ok(inner),
    }
  }
}

fn not_found() -> Error {
  Error::server(404, Some("Lead not found".to_string()))
}

#[async_trait]
impl LeadsBackend for FakeBackend {
  async fn list_leads(&self) -> Result<Vec<Lead>> {
    Ok(self.begin("list")?.leads.clone())
  }

  async fn get_lead(&self, id: i64) -> Result<Lead> {
    let inner = self.begin("get")?;
    inner
      .leads
      .iter()
      .find(|l| l.id == id)
      .cloned()
      .ok_or_else(not_found)
  }

  async fn create_lead(&self, new: &NewLead) -> Result<Lead> {
    let mut inner = self.begin("create")?;
    if inner.leads.iter().any(|l| l.website_url == new.website_url()) {
      return Err(Error::server(
        400,
        Some("Website URL already exists in the database".to_string()),
      ));
    }
    let id = inner.next_id;
    inner.next_id += 1;
    let mut created = lead(id, LeadStatus::Pending);
    created.company_name = new.company_name().to_string();
    created.website_url = new.website_url().to_string();
    inner.leads.push(created.clone());
    Ok(created)
  }

  async fn delete_lead(&self, id: i64) -> Result<()> {
    let mut inner = self.begin("delete")?;
    let before = inner.leads.len();
    inner.leads.retain(|l| l.id != id);
    if inner.leads.len() == before {
      return Err(not_found());
    }
    Ok(())
  }

  async fn generate_pitch(&self, lead_id: i64, user_product_description: &str) -> Result<Pitch> {
    let inner = self.begin("pitch")?;
    let lead = inner
      .leads
      .iter()
      .find(|l| l.id == lead_id)
      .ok_or_else(not_found)?;
    if lead.status != LeadStatus::Completed {
      return Err(Error::server(
        400,
        Some("Lead analysis is not yet complete. Please wait.".to_string()),
      ));
    }
    Ok(Pitch {
      id: 1,
      lead_id,
      content: format!("{} could use {}", lead.company_name, user_product_description),
      created_at: "2024-05-02T09:00:00".to_string(),
    })
  }
}
