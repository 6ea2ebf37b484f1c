use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::info;

use crate::api::{Lead, LeadStatus, LeadsApi, LeadsBackend, NewLead};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::leads::{queries, LeadStats, Leads};
use crate::render;
use crate::sync::{QueryClient, QueryKey, QueryState, Snapshot, SyncOptions};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// List every lead with dashboard counters
  List,
  /// Add a lead; the backend starts crawling and analyzing it
  Add {
    company: String,
    /// Website, `https://` is assumed when no scheme is given
    website: String,
  },
  /// Show one lead and its analysis
  Show {
    id: i64,
    /// Keep refreshing until the analysis finishes
    #[arg(short, long)]
    watch: bool,
  },
  /// Delete a lead
  Delete { id: i64 },
  /// Generate a sales pitch for a completed lead
  Pitch {
    id: i64,
    /// What you are selling
    description: String,
  },
}

/// Main application state
pub struct App {
  leads: Leads,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let api = LeadsApi::new(config)?;
    info!(base_url = %api.base_url(), "using backend");
    Ok(Self::with_backend(config.sync.options(), Arc::new(api)))
  }

  pub fn with_backend(options: SyncOptions, backend: Arc<dyn LeadsBackend>) -> Self {
    Self {
      leads: Leads::new(QueryClient::new(options), backend),
    }
  }

  fn client(&self) -> &QueryClient {
    self.leads.client()
  }

  pub async fn run<W: Write>(&self, command: Command, out: &mut W) -> Result<()> {
    match command {
      Command::List => self.list(out).await,
      Command::Add { company, website } => self.add(&company, &website, out).await,
      Command::Show { id, watch: false } => self.show(id, out).await,
      Command::Show { id, watch: true } => self.watch(id, out).await,
      Command::Delete { id } => {
        self.leads.delete(id).await?;
        writeln!(out, "Deleted lead {}", id)?;
        Ok(())
      }
      Command::Pitch { id, description } => self.pitch(id, &description, out).await,
    }
  }

  async fn list<W: Write>(&self, out: &mut W) -> Result<()> {
    let key = queries::leads_list();
    let mut events = EventHandler::new();
    let _sub = events.watch(self.client(), &key);

    let Some(snapshot) = self.settled(&mut events, &key).await else {
      return Ok(());
    };
    let leads = expect_data::<Vec<Lead>>(&snapshot)?;

    write!(out, "{}", render::lead_table(leads))?;
    writeln!(out)?;
    writeln!(out, "{}", render::stats(&LeadStats::from_leads(leads)))?;
    Ok(())
  }

  async fn add<W: Write>(&self, company: &str, website: &str, out: &mut W) -> Result<()> {
    let new = NewLead::new(company, website)?;
    let lead = self.leads.create(new).await?;
    writeln!(
      out,
      "Added lead {}: {} ({}) [{}]",
      lead.id, lead.company_name, lead.website_url, lead.status
    )?;
    Ok(())
  }

  async fn show<W: Write>(&self, id: i64, out: &mut W) -> Result<()> {
    let key = queries::lead_detail(id);
    let mut events = EventHandler::new();
    let _sub = events.watch(self.client(), &key);

    let Some(snapshot) = self.settled(&mut events, &key).await else {
      return Ok(());
    };
    let lead = expect_data::<Lead>(&snapshot)?;
    write!(out, "{}", render::lead_detail(lead))?;
    Ok(())
  }

  /// Print each status change while the lead is polled, then the full detail
  /// once it reaches a terminal status.
  async fn watch<W: Write>(&self, id: i64, out: &mut W) -> Result<()> {
    let key = queries::lead_detail(id);
    let mut events = EventHandler::new();
    events.listen_for_interrupt();
    let _sub = events.watch(self.client(), &key);

    let mut last_status: Option<LeadStatus> = None;
    let mut current = self.client().snapshot(&key);

    loop {
      if let Some(snapshot) = current.take() {
        match snapshot.state::<Lead>() {
          QueryState::Success(lead) => {
            if last_status != Some(lead.status) {
              writeln!(out, "{} {}", render::status_marker(lead.status), lead.status)?;
              last_status = Some(lead.status);
            }
            if lead.status.is_terminal() {
              writeln!(out)?;
              write!(out, "{}", render::lead_detail(lead))?;
              return Ok(());
            }
            // Poll limit reached, no further updates will arrive
            if !snapshot.is_polling {
              writeln!(
                out,
                "Lead {} is still {} but is no longer refreshed; watch it again to resume",
                id, lead.status
              )?;
              return Ok(());
            }
          }
          QueryState::Error(e) => return Err(e.into()),
          QueryState::Idle | QueryState::Loading => {}
        }
      }

      match events.next().await {
        Some(Event::Changed(snapshot)) => current = Some(snapshot),
        Some(Event::Interrupt) | None => {
          writeln!(out, "Stopped watching lead {}", id)?;
          return Ok(());
        }
      }
    }
  }

  async fn pitch<W: Write>(&self, id: i64, description: &str, out: &mut W) -> Result<()> {
    // Loads the lead so a pitch for an unfinished one is refused locally
    self
      .client()
      .fetch_as::<Lead>(&queries::lead_detail(id))
      .await?;
    let pitch = self.leads.generate_pitch(id, description).await?;
    write!(out, "{}", render::pitch(&pitch))?;
    Ok(())
  }

  /// Wait until `key` holds a success or an error. `None` when the event
  /// stream ended first.
  async fn settled(&self, events: &mut EventHandler, key: &QueryKey) -> Option<Snapshot> {
    if let Some(snapshot) = self.client().snapshot(key) {
      if snapshot.is_success() || snapshot.is_error() {
        return Some(snapshot);
      }
    }

    while let Some(event) = events.next().await {
      match event {
        Event::Changed(snapshot) if snapshot.is_success() || snapshot.is_error() => {
          return Some(snapshot)
        }
        Event::Changed(_) => continue,
        Event::Interrupt => return None,
      }
    }
    None
  }
}

fn expect_data<T: std::any::Any>(snapshot: &Snapshot) -> Result<&T> {
  match snapshot.state::<T>() {
    QueryState::Success(data) => Ok(data),
    QueryState::Error(e) => Err(e.into()),
    QueryState::Idle | QueryState::Loading => Err(eyre!("{} has not loaded", snapshot.key)),
  }
}
