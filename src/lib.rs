//! Lead-analysis dashboard client built on a polling query cache.
//!
//! [`sync`] holds the cache itself and knows nothing about leads. [`leads`]
//! registers the lead queries and mutations on it, [`api`] talks to the
//! backend, and [`analysis`] decodes the analysis payload of a finished lead.

pub mod analysis;
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod leads;
pub mod logging;
pub mod render;
pub mod sync;
