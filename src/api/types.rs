use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::analysis::{self, Analysis};
use crate::error::{Error, Result};

/// Processing state of a lead on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
  Pending,
  Crawling,
  Analyzing,
  Completed,
  Failed,
}

impl LeadStatus {
  /// No further changes are expected once a lead is here.
  pub fn is_terminal(self) -> bool {
    match self {
      LeadStatus::Completed | LeadStatus::Failed => true,
      LeadStatus::Pending | LeadStatus::Crawling | LeadStatus::Analyzing => false,
    }
  }

  pub fn is_processing(self) -> bool {
    !self.is_terminal()
  }

  pub fn as_str(self) -> &'static str {
    match self {
      LeadStatus::Pending => "PENDING",
      LeadStatus::Crawling => "CRAWLING",
      LeadStatus::Analyzing => "ANALYZING",
      LeadStatus::Completed => "COMPLETED",
      LeadStatus::Failed => "FAILED",
    }
  }
}

impl fmt::Display for LeadStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

/// A company being analyzed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
  pub id: i64,
  pub company_name: String,
  pub website_url: String,
  pub status: LeadStatus,
  pub page_title: Option<String>,
  pub summary: Option<String>,
  /// JSON array encoded as a string
  pub bullet_points: Option<String>,
  /// Full analysis, JSON encoded as a string. Only meaningful once completed.
  pub analysis_json: Option<String>,
  #[serde(default)]
  pub created_at: String,
}

impl Lead {
  /// Decoded analysis, when the lead is completed and the payload parses.
  pub fn analysis(&self) -> Option<Analysis> {
    if self.status != LeadStatus::Completed {
      return None;
    }
    analysis::parse(self.analysis_json.as_deref())
  }

  /// Creation date for display (the date part of `created_at`).
  pub fn created_date(&self) -> &str {
    self
      .created_at
      .split(['T', ' '])
      .next()
      .unwrap_or(&self.created_at)
  }
}

/// A sales pitch generated for a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
  pub id: i64,
  pub lead_id: i64,
  pub content: String,
  #[serde(default)]
  pub created_at: String,
}

/// Validated input for creating a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLead {
  company_name: String,
  website_url: String,
}

impl NewLead {
  /// Both fields are required. A website without a scheme gets `https://`.
  pub fn new(company_name: &str, website_url: &str) -> Result<Self> {
    let company_name = company_name.trim();
    let website = website_url.trim();
    if company_name.is_empty() || website.is_empty() {
      return Err(Error::Validation(
        "Company name and website are both required".to_string(),
      ));
    }

    let website_url = if has_http_scheme(website) {
      website.to_string()
    } else {
      format!("https://{}", website)
    };

    let parsed = Url::parse(&website_url)
      .map_err(|e| Error::Validation(format!("Invalid website '{}': {}", website, e)))?;
    if parsed.host_str().is_none() {
      return Err(Error::Validation(format!(
        "Invalid website '{}': missing host",
        website
      )));
    }

    Ok(Self {
      company_name: company_name.to_string(),
      website_url,
    })
  }

  pub fn company_name(&self) -> &str {
    &self.company_name
  }

  pub fn website_url(&self) -> &str {
    &self.website_url
  }
}

fn has_http_scheme(url: &str) -> bool {
  let lower = url.to_ascii_lowercase();
  lower.starts_with("http://") || lower.starts_with("https://")
}

/// Input for the generate-pitch mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchRequest {
  pub lead_id: i64,
  pub user_product_description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PitchRequestBody<'a> {
  pub user_product_description: &'a str,
}

#[cfg(test)]
mod tests {
  use super::*;

  const LEAD_JSON: &str = r#"{
    "id": 42,
    "company_name": "Acme",
    "website_url": "https://acme.example/",
    "status": "ANALYZING",
    "page_title": "Acme Corp",
    "summary": null,
    "bullet_points": null,
    "analysis_json": null,
    "created_at": "2024-05-01T10:20:30.123456"
  }"#;

  #[test]
  fn test_deserialize_lead() {
    let lead: Lead = serde_json::from_str(LEAD_JSON).unwrap();
    assert_eq!(lead.id, 42);
    assert_eq!(lead.status, LeadStatus::Analyzing);
    assert_eq!(lead.page_title.as_deref(), Some("Acme Corp"));
    assert_eq!(lead.created_date(), "2024-05-01");
  }

  #[test]
  fn test_deserialize_lead_with_missing_optionals() {
    let lead: Lead = serde_json::from_str(
      r#"{"id":1,"company_name":"A","website_url":"https://a.example","status":"PENDING"}"#,
    )
    .unwrap();
    assert_eq!(lead.analysis_json, None);
    assert_eq!(lead.created_at, "");
  }

  #[test]
  fn test_status_terminal() {
    assert!(LeadStatus::Completed.is_terminal());
    assert!(LeadStatus::Failed.is_terminal());
    for status in [
      LeadStatus::Pending,
      LeadStatus::Crawling,
      LeadStatus::Analyzing,
    ] {
      assert!(status.is_processing());
      assert!(!status.is_terminal());
    }
  }

  #[test]
  fn test_analysis_only_when_completed() {
    let mut lead: Lead = serde_json::from_str(LEAD_JSON).unwrap();
    lead.analysis_json = Some(r#"{"summary":"x"}"#.to_string());
    assert!(lead.analysis().is_none());

    lead.status = LeadStatus::Completed;
    let analysis = lead.analysis().unwrap();
    assert_eq!(analysis.summary.as_deref(), Some("x"));
  }

  #[test]
  fn test_new_lead_prepends_scheme() {
    let lead = NewLead::new("  Acme ", "acme.example").unwrap();
    assert_eq!(lead.company_name(), "Acme");
    assert_eq!(lead.website_url(), "https://acme.example");

    let lead = NewLead::new("Acme", "HTTP://acme.example/about").unwrap();
    assert_eq!(lead.website_url(), "HTTP://acme.example/about");
  }

  #[test]
  fn test_new_lead_requires_both_fields() {
    assert!(matches!(
      NewLead::new("", "acme.example"),
      Err(Error::Validation(_))
    ));
    assert!(matches!(NewLead::new("Acme", "   "), Err(Error::Validation(_))));
  }

  #[test]
  fn test_new_lead_rejects_garbage_url() {
    assert!(matches!(
      NewLead::new("Acme", "https://"),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn test_new_lead_serializes_for_backend() {
    let lead = NewLead::new("Acme", "acme.example").unwrap();
    assert_eq!(
      serde_json::to_value(&lead).unwrap(),
      serde_json::json!({"company_name": "Acme", "website_url": "https://acme.example"})
    );
  }
}
