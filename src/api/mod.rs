//! REST boundary of the lead-analysis backend.

mod client;
mod types;

pub use client::{LeadsApi, LeadsBackend};
pub use types::{Lead, LeadStatus, NewLead, Pitch, PitchRequest};
