use crate::api::{Lead, LeadStatus};

/// Dashboard counters over the lead list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeadStats {
  pub total: usize,
  pub completed: usize,
  pub in_progress: usize,
  pub failed: usize,
}

impl LeadStats {
  pub fn from_leads(leads: &[Lead]) -> Self {
    leads.iter().fold(Self::default(), |mut stats, lead| {
      stats.total += 1;
      match lead.status {
        LeadStatus::Completed => stats.completed += 1,
        LeadStatus::Failed => stats.failed += 1,
        LeadStatus::Pending | LeadStatus::Crawling | LeadStatus::Analyzing => {
          stats.in_progress += 1
        }
      }
      stats
    })
  }
}
