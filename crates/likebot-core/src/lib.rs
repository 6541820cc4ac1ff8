//! # Likebot Core
//!
//! Shared building blocks for the Likebot workspace: configuration,
//! the error taxonomy, domain types, the admin allow-list, and the
//! quota-day boundary function that anchors all daily counters to a
//! fixed timezone.

pub mod admins;
pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use admins::AdminSet;
pub use config::LikebotConfig;
pub use error::{LikebotError, Result};
pub use types::{ActionClass, AutoTask, Entitlement, PrincipalId, QuotaView, RunOutcome, RunSummary};
