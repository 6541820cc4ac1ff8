//! # Likebot Scheduler
//!
//! The batch runner that walks all active auto tasks once, and the
//! daily trigger loop that fires it at a fixed wall-clock time in the
//! anchor timezone. The manual admin trigger calls the exact same
//! entry point (`TaskRunner::run_once`), so scheduled and manual runs
//! cannot diverge in semantics.

pub mod runner;
pub mod trigger;

pub use runner::TaskRunner;
pub use trigger::run_daily_trigger;
