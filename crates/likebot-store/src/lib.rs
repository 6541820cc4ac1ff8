//! # Likebot Store
//!
//! SQLite persistence for entitlements, daily quota counters, auto
//! tasks, and the audit event log. All mutation goes through one
//! exclusive lock around the connection, so every read-then-write
//! counter transition (consume, rollover, decrement) is atomic.

pub mod db;
pub mod entitlements;
pub mod quota;
pub mod tasks;

pub use db::{BotStats, LikebotDb};
