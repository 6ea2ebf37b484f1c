//! Plain-text rendering of leads for the console.

use crate::analysis::{KeyPerson, Section, Sections};
use crate::api::{Lead, LeadStatus, Pitch};
use crate::leads::LeadStats;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Short marker shown next to a status
pub fn status_marker(status: LeadStatus) -> &'static str {
  match status {
    LeadStatus::Completed => "✓",
    LeadStatus::Failed => "✗",
    LeadStatus::Pending | LeadStatus::Crawling | LeadStatus::Analyzing => "…",
  }
}

pub fn stats(stats: &LeadStats) -> String {
  format!(
    "Total: {}  Completed: {}  In progress: {}  Failed: {}",
    stats.total, stats.completed, stats.in_progress, stats.failed
  )
}

pub fn lead_table(leads: &[Lead]) -> String {
  if leads.is_empty() {
    return "No leads yet. Add one with `leadsync add <company> <website>`.\n".to_string();
  }

  let header = format!(
    "{:>5}  {:<24}  {:<36}  {:<12}  {}",
    "ID", "COMPANY", "WEBSITE", "STATUS", "CREATED"
  );
  let rows = leads.iter().map(|lead| {
    format!(
      "{:>5}  {:<24}  {:<36}  {} {:<10}  {}",
      lead.id,
      truncate(&lead.company_name, 24),
      truncate(&lead.website_url, 36),
      status_marker(lead.status),
      lead.status,
      lead.created_date()
    )
  });
  std::iter::once(header)
    .chain(rows)
    .map(|line| line + "\n")
    .collect()
}

fn list(items: &[String]) -> String {
  if items.is_empty() {
    return "  (none)".to_string();
  }
  items
    .iter()
    .map(|item| format!("  - {}", item))
    .collect::<Vec<_>>()
    .join("\n")
}

fn person(person: &KeyPerson) -> String {
  match person.role() {
    Some(role) => format!("{} ({})", person.name(), role),
    None => person.name().to_string(),
  }
}

pub fn lead_detail(lead: &Lead) -> String {
  let mut out = format!("{} [{}]\n{}\n", lead.company_name, lead.status, lead.website_url);
  if let Some(title) = &lead.page_title {
    out.push_str(&format!("Page title: {}\n", title));
  }

  match lead.status {
    LeadStatus::Failed => {
      out.push_str("\nAnalysis failed.\n");
      return out;
    }
    status if status.is_processing() => {
      out.push_str(&format!("\nAnalysis in progress ({}).\n", status));
      return out;
    }
    _ => {}
  }

  let analysis = lead.analysis();
  let sections = Sections::of(analysis.as_ref());

  let swot = sections.swot_analysis.render_or_placeholder(|swot| {
    format!(
      "Strengths:\n{}\nWeaknesses:\n{}\nOpportunities:\n{}\nThreats:\n{}",
      list(&swot.strengths),
      list(&swot.weaknesses),
      list(&swot.opportunities),
      list(&swot.threats)
    )
  });
  let detailed = sections.detailed_analysis.render_or_placeholder(|d| {
    let field = |v: &Option<String>| Section::from(v.as_ref()).render_or_placeholder(String::clone);
    format!(
      "Business model: {}\nTarget audience: {}\nValue proposition: {}\nTone: {}\nPotential needs:\n{}",
      field(&d.business_model),
      field(&d.target_audience),
      field(&d.value_proposition),
      field(&d.company_tone),
      list(&d.potential_needs)
    )
  });
  let key_persons = sections
    .key_persons
    .render_or_placeholder(|people| list(&people.iter().map(person).collect::<Vec<_>>()));

  let blocks = [
    ("Summary", sections.summary.render_or_placeholder(String::clone)),
    ("Key Business Points", sections.bullet_points.render_or_placeholder(|p| list(p))),
    ("Opening Pitch", sections.simple_pitch.render_or_placeholder(String::clone)),
    ("SWOT", swot),
    ("Detailed Analysis", detailed),
    ("Key Persons", key_persons),
    ("Tech & Trends", sections.tech_and_trends.render_or_placeholder(|t| list(t))),
    ("Growth", sections.growth_analysis.render_or_placeholder(String::clone)),
  ];
  for (title, body) in blocks {
    out.push_str(&format!("\n== {} ==\n{}\n", title, body));
  }
  out
}

pub fn pitch(pitch: &Pitch) -> String {
  format!("Pitch for lead {}:\n\n{}\n", pitch.lead_id, pitch.content)
}
