//! Decoder for the analysis payload a completed lead carries as a JSON
//! string.
//!
//! Decoding never fails: malformed or absent input yields `None`, and inside
//! a parsed payload every section is read on its own, so a section that is
//! missing or has the wrong shape is simply unavailable while the rest still
//! render.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Text shown in place of a section that is not available.
pub const NOT_AVAILABLE: &str = "Not available";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
  pub summary: Option<String>,
  pub bullet_points: Option<Vec<String>>,
  pub simple_pitch: Option<String>,
  pub swot_analysis: Option<Swot>,
  pub detailed_analysis: Option<DetailedAnalysis>,
  pub key_persons: Option<Vec<KeyPerson>>,
  pub tech_and_trends: Option<Vec<String>>,
  pub growth_analysis: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Swot {
  pub strengths: Vec<String>,
  pub weaknesses: Vec<String>,
  pub opportunities: Vec<String>,
  pub threats: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetailedAnalysis {
  pub business_model: Option<String>,
  pub target_audience: Option<String>,
  pub value_proposition: Option<String>,
  pub company_tone: Option<String>,
  pub potential_needs: Vec<String>,
}

/// A person named in the analysis, either just a name or a name with a role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeyPerson {
  Name(String),
  Detailed {
    name: String,
    #[serde(default, alias = "title")]
    role: Option<String>,
  },
}

impl KeyPerson {
  pub fn name(&self) -> &str {
    match self {
      KeyPerson::Name(name) => name,
      KeyPerson::Detailed { name, .. } => name,
    }
  }

  pub fn role(&self) -> Option<&str> {
    match self {
      KeyPerson::Name(_) => None,
      KeyPerson::Detailed { role, .. } => role.as_deref(),
    }
  }
}

/// Decode `raw`. Absent input, invalid JSON, or a payload that is not a
/// JSON object all give `None`.
pub fn parse(raw: Option<&str>) -> Option<Analysis> {
  let raw = raw?.trim();
  if raw.is_empty() {
    return None;
  }

  let object = match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(object)) => object,
    Ok(_) => {
      tracing::debug!("analysis payload is not an object");
      return None;
    }
    Err(e) => {
      tracing::debug!(error = %e, "analysis payload is not valid JSON");
      return None;
    }
  };

  Some(Analysis {
    summary: section(&object, "summary"),
    bullet_points: section(&object, "bullet_points"),
    simple_pitch: section(&object, "simple_pitch"),
    swot_analysis: section(&object, "swot_analysis"),
    detailed_analysis: section(&object, "detailed_analysis"),
    key_persons: section(&object, "key_persons"),
    tech_and_trends: section(&object, "tech_and_trends"),
    growth_analysis: section(&object, "growth_analysis"),
  })
}

fn section<T: DeserializeOwned>(object: &Map<String, Value>, name: &str) -> Option<T> {
  let value = object.get(name)?;
  if value.is_null() {
    return None;
  }
  match T::deserialize(value) {
    Ok(v) => Some(v),
    Err(e) => {
      tracing::debug!(section = name, error = %e, "analysis section unavailable");
      None
    }
  }
}

/// One section as the view sees it.
#[derive(Debug, PartialEq, Eq)]
pub enum Section<'a, T> {
  Available(&'a T),
  NotAvailable,
}

impl<T> Clone for Section<'_, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Section<'_, T> {}

impl<'a, T> Section<'a, T> {
  pub fn is_available(&self) -> bool {
    matches!(self, Section::Available(_))
  }

  /// Render with `f`, or the placeholder text.
  pub fn render_or_placeholder(self, f: impl FnOnce(&'a T) -> String) -> String {
    match self {
      Section::Available(v) => f(v),
      Section::NotAvailable => NOT_AVAILABLE.to_string(),
    }
  }
}

impl<'a, T> From<Option<&'a T>> for Section<'a, T> {
  fn from(value: Option<&'a T>) -> Self {
    match value {
      Some(v) => Section::Available(v),
      None => Section::NotAvailable,
    }
  }
}

/// Every section of an analysis, each marked unavailable when missing.
/// Built from `None` every section is unavailable.
#[derive(Debug, Clone, Copy)]
pub struct Sections<'a> {
  pub summary: Section<'a, String>,
  pub bullet_points: Section<'a, Vec<String>>,
  pub simple_pitch: Section<'a, String>,
  pub swot_analysis: Section<'a, Swot>,
  pub detailed_analysis: Section<'a, DetailedAnalysis>,
  pub key_persons: Section<'a, Vec<KeyPerson>>,
  pub tech_and_trends: Section<'a, Vec<String>>,
  pub growth_analysis: Section<'a, String>,
}

impl<'a> Sections<'a> {
  pub fn of(analysis: Option<&'a Analysis>) -> Self {
    Self {
      summary: analysis.and_then(|a| a.summary.as_ref()).into(),
      bullet_points: analysis.and_then(|a| a.bullet_points.as_ref()).into(),
      simple_pitch: analysis.and_then(|a| a.simple_pitch.as_ref()).into(),
      swot_analysis: analysis.and_then(|a| a.swot_analysis.as_ref()).into(),
      detailed_analysis: analysis.and_then(|a| a.detailed_analysis.as_ref()).into(),
      key_persons: analysis.and_then(|a| a.key_persons.as_ref()).into(),
      tech_and_trends: analysis.and_then(|a| a.tech_and_trends.as_ref()).into(),
      growth_analysis: analysis.and_then(|a| a.growth_analysis.as_ref()).into(),
    }
  }

  pub fn available_count(&self) -> usize {
    [
      self.summary.is_available(),
      self.bullet_points.is_available(),
      self.simple_pitch.is_available(),
      self.swot_analysis.is_available(),
      self.detailed_analysis.is_available(),
      self.key_persons.is_available(),
      self.tech_and_trends.is_available(),
      self.growth_analysis.is_available(),
    ]
    .iter()
    .filter(|available| **available)
    .count()
  }
}
