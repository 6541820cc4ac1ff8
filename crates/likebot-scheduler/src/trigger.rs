//! Daily trigger — fires the runner once per quota day at a fixed
//! wall-clock time in the anchor timezone.
//!
//! The loop checks on a short interval whether the fire time has been
//! reached for a day it has not fired on yet. The fired day is
//! persisted in the store, so a restart after the day's fire does not
//! run a second batch. Missed firings while the process was down are
//! not caught up: task state is count-indexed, not time-indexed, so
//! the next firing simply runs the unchanged active set.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use likebot_core::config::SchedulerConfig;
use likebot_core::error::LikebotError;

use crate::runner::TaskRunner;

/// The quota day a fire is due for, or `None` when nothing is due.
///
/// Due means: local time in the anchor zone has reached `hour:minute`
/// and no fire has happened for that local date yet. Pure, so the
/// boundary cases are testable without a running loop.
pub fn due_day(
    now: DateTime<Utc>,
    anchor: FixedOffset,
    hour: u32,
    minute: u32,
    last_fired: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let local = now.with_timezone(&anchor);
    let today = local.date_naive();
    if last_fired == Some(today) {
        return None;
    }
    let fire_at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    if local.time() >= fire_at {
        Some(today)
    } else {
        None
    }
}

/// Run the daily trigger loop forever. Spawn as a background task.
pub async fn run_daily_trigger(
    runner: Arc<TaskRunner>,
    config: SchedulerConfig,
    anchor: FixedOffset,
) {
    tracing::info!(
        "⏰ Daily trigger started: fires at {:02}:{:02} (UTC{:+}), checking every {}s",
        config.run_hour,
        config.run_minute,
        anchor.local_minus_utc() / 3600,
        config.check_interval_secs
    );

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.check_interval_secs));
    let mut last_fired: Option<NaiveDate> = match runner.db().last_trigger_day() {
        Ok(day) => day,
        Err(e) => {
            tracing::warn!("⚠️ Could not load the last trigger day: {e}");
            None
        }
    };

    loop {
        interval.tick().await;
        let now = Utc::now();
        let Some(day) = due_day(now, anchor, config.run_hour, config.run_minute, last_fired)
        else {
            continue;
        };
        // Mark the day fired before running, so a crash mid-batch is
        // treated as covered rather than re-fired
        last_fired = Some(day);
        if let Err(e) = runner.db().set_last_trigger_day(day) {
            tracing::warn!("⚠️ Could not persist the trigger day {day}: {e}");
        }

        match runner.run_once(now).await {
            Ok(summary) => {
                tracing::info!(
                    "📣 Scheduled run for {day}: {}/{} succeeded",
                    summary.succeeded,
                    summary.attempted
                );
            }
            // A manual run beat us to it; the day's batch is covered
            Err(LikebotError::RunInProgress) => {
                tracing::info!("Scheduled run for {day} skipped: a run is already in progress");
            }
            Err(e) => {
                tracing::error!("⚠️ Scheduled run for {day} failed: {e}");
            }
        }
    }
}
