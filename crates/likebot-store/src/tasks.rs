//! Auto-task store — recurring like jobs keyed by target.
//!
//! Mutation of `runs_remaining` belongs to the runner alone
//! (`decrement_on_success`, `record_failure`); everything else only
//! creates, lists, or deletes tasks.

use chrono::{DateTime, Utc};
use likebot_core::error::{LikebotError, Result};
use likebot_core::types::{AutoTask, PrincipalId};
use rusqlite::OptionalExtension;

use crate::db::LikebotDb;
use crate::entitlements::parse_ts;

const TASK_COLUMNS: &str =
    "target_id, owner_id, runs_remaining, created_at, last_run_at, last_error";

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<AutoTask> {
    Ok(AutoTask {
        target: row.get(0)?,
        owner: PrincipalId(row.get(1)?),
        runs_remaining: row.get(2)?,
        created_at: parse_ts(row.get(3)?).unwrap_or_else(Utc::now),
        last_run_at: parse_ts(row.get(4)?),
        last_error: row.get(5)?,
    })
}

impl LikebotDb {
    /// Create a task, or overwrite the existing one for the same
    /// target. Re-scheduling resets the countdown and owner rather
    /// than stacking runs — deliberate, matching a fresh order for the
    /// same target.
    pub fn create_or_replace_task(
        &self,
        target: &str,
        owner: PrincipalId,
        runs: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO auto_tasks (target_id, owner_id, runs_remaining, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(target_id) DO UPDATE SET
                 owner_id = excluded.owner_id,
                 runs_remaining = excluded.runs_remaining,
                 created_at = excluded.created_at,
                 last_error = NULL",
            rusqlite::params![target, owner.0, runs, now.to_rfc3339()],
        )
        .map_err(|e| LikebotError::Store(format!("Save task: {e}")))?;
        tracing::info!("📅 Auto task for target {target} set to {runs} run(s), owner {owner}");
        Ok(())
    }

    /// Add runs to an existing task. Errors with `NotFound` when no
    /// task exists for the target.
    pub fn extend_task(&self, target: &str, delta: u32) -> Result<u32> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE auto_tasks SET runs_remaining = runs_remaining + ?1 WHERE target_id = ?2",
                rusqlite::params![delta, target],
            )
            .map_err(|e| LikebotError::Store(format!("Extend task: {e}")))?;
        if changed == 0 {
            return Err(LikebotError::NotFound);
        }
        conn.query_row(
            "SELECT runs_remaining FROM auto_tasks WHERE target_id = ?1",
            [target],
            |row| row.get(0),
        )
        .map_err(|e| LikebotError::Store(format!("Extend task: {e}")))
    }

    /// Look up one task by target.
    pub fn task(&self, target: &str) -> Result<Option<AutoTask>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM auto_tasks WHERE target_id = ?1"),
            [target],
            row_to_task,
        )
        .optional()
        .map_err(|e| LikebotError::Store(format!("Load task: {e}")))
    }

    /// Active tasks owned by one principal.
    pub fn tasks_for_owner(&self, owner: PrincipalId) -> Result<Vec<AutoTask>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM auto_tasks
                 WHERE owner_id = ?1 AND runs_remaining > 0 ORDER BY target_id"
            ))
            .map_err(|e| LikebotError::Store(format!("List tasks: {e}")))?;
        let rows = stmt
            .query_map([owner.0], row_to_task)
            .map_err(|e| LikebotError::Store(format!("List tasks: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All tasks with runs remaining. The runner snapshots this at
    /// batch start; tasks added mid-batch wait for the next cycle.
    pub fn active_tasks(&self) -> Result<Vec<AutoTask>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM auto_tasks
                 WHERE runs_remaining > 0 ORDER BY target_id"
            ))
            .map_err(|e| LikebotError::Store(format!("List tasks: {e}")))?;
        let rows = stmt
            .query_map([], row_to_task)
            .map_err(|e| LikebotError::Store(format!("List tasks: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete a task. Only the owner or a privileged requester may
    /// remove it; anyone else gets `Forbidden`.
    pub fn remove_task(
        &self,
        target: &str,
        requester: PrincipalId,
        privileged: bool,
    ) -> Result<()> {
        let conn = self.lock()?;
        let owner: Option<i64> = conn
            .query_row(
                "SELECT owner_id FROM auto_tasks WHERE target_id = ?1",
                [target],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LikebotError::Store(format!("Remove task: {e}")))?;
        let Some(owner) = owner else {
            return Err(LikebotError::NotFound);
        };
        if owner != requester.0 && !privileged {
            return Err(LikebotError::Forbidden);
        }
        conn.execute("DELETE FROM auto_tasks WHERE target_id = ?1", [target])
            .map_err(|e| LikebotError::Store(format!("Remove task: {e}")))?;
        tracing::info!("🗑️ Auto task for target {target} removed by {requester}");
        Ok(())
    }

    /// Commit a successful run: decrement by exactly one, stamp the
    /// run, clear the error. Returns the remaining count; the row is
    /// deleted once it reaches zero so an inert task is never selected
    /// again.
    pub fn decrement_on_success(&self, target: &str, now: DateTime<Utc>) -> Result<u32> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE auto_tasks
                 SET runs_remaining = runs_remaining - 1, last_run_at = ?1, last_error = NULL
                 WHERE target_id = ?2 AND runs_remaining > 0",
                rusqlite::params![now.to_rfc3339(), target],
            )
            .map_err(|e| LikebotError::Store(format!("Decrement task: {e}")))?;
        if changed == 0 {
            return Err(LikebotError::NotFound);
        }
        let remaining: u32 = conn
            .query_row(
                "SELECT runs_remaining FROM auto_tasks WHERE target_id = ?1",
                [target],
                |row| row.get(0),
            )
            .map_err(|e| LikebotError::Store(format!("Decrement task: {e}")))?;
        if remaining == 0 {
            conn.execute("DELETE FROM auto_tasks WHERE target_id = ?1", [target])
                .map_err(|e| LikebotError::Store(format!("Decrement task: {e}")))?;
        }
        Ok(remaining)
    }

    /// Record a failed run. The countdown is untouched — a failed call
    /// never consumes a scheduled run; the task retries next cycle.
    pub fn record_failure(&self, target: &str, now: DateTime<Utc>, reason: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE auto_tasks SET last_run_at = ?1, last_error = ?2 WHERE target_id = ?3",
            rusqlite::params![now.to_rfc3339(), reason, target],
        )
        .map_err(|e| LikebotError::Store(format!("Record failure: {e}")))?;
        Ok(())
    }
}
