//! Database handle, migrations, audit events, and aggregate stats.

use chrono::{NaiveDate, Utc};
use likebot_core::config::QuotaConfig;
use likebot_core::error::{LikebotError, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed store for all Likebot state.
///
/// The connection lives behind a single `Mutex`: the accepted design is
/// one global critical section for all quota/task mutation, which keeps
/// check-and-increment atomic without per-row locking. External network
/// calls are never made while this lock is held.
pub struct LikebotDb {
    conn: Mutex<Connection>,
    quota: QuotaConfig,
}

impl LikebotDb {
    /// Open or create the database at the given path.
    pub fn open(path: &Path, quota: QuotaConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| LikebotError::Store(format!("DB open: {e}")))?;
        let db = Self {
            conn: Mutex::new(conn),
            quota,
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory(quota: QuotaConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LikebotError::Store(format!("DB open: {e}")))?;
        let db = Self {
            conn: Mutex::new(conn),
            quota,
        };
        db.migrate()?;
        Ok(db)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LikebotError::Store(format!("DB lock: {e}")))
    }

    pub(crate) fn quota_config(&self) -> &QuotaConfig {
        &self.quota
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            -- Per-principal capability flags, limit overrides, daily counters
            CREATE TABLE IF NOT EXISTS entitlements (
                principal_id INTEGER PRIMARY KEY,
                like_allowed INTEGER NOT NULL DEFAULT 0,
                auto_allowed INTEGER NOT NULL DEFAULT 0,
                like_limit INTEGER,              -- NULL = class default
                auto_limit INTEGER,
                likes_used INTEGER NOT NULL DEFAULT 0,
                autos_used INTEGER NOT NULL DEFAULT 0,
                like_reset_at TEXT,              -- RFC3339, last rollover
                auto_reset_at TEXT
            );

            -- Recurring auto-like tasks, one per target across the system
            CREATE TABLE IF NOT EXISTS auto_tasks (
                target_id TEXT PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                runs_remaining INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                last_run_at TEXT,
                last_error TEXT
            );

            -- Audit trail for grants and run outcomes
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL
            );

            -- Single-row bookkeeping (last scheduled fire day)
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| LikebotError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    // ─── Trigger bookkeeping ──────────────────────────────────────

    /// Quota day of the last scheduled fire, or `None` if the trigger
    /// has never fired. Survives restarts so a fresh process does not
    /// re-run a day the previous process already covered.
    pub fn last_trigger_day(&self) -> Result<Option<NaiveDate>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'last_trigger_day'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LikebotError::Store(format!("Load trigger day: {e}")))?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Record the quota day a scheduled fire just happened for.
    pub fn set_last_trigger_day(&self, day: NaiveDate) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('last_trigger_day', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [day.to_string()],
        )
        .map_err(|e| LikebotError::Store(format!("Save trigger day: {e}")))?;
        Ok(())
    }

    // ─── Audit events ──────────────────────────────────────

    /// Append an audit event. Failures are logged, never propagated —
    /// the audit trail must not break the operation it describes.
    pub fn log_event(&self, level: &str, message: &str) {
        let result = self.lock().and_then(|conn| {
            conn.execute(
                "INSERT INTO events (ts, level, message) VALUES (?1, ?2, ?3)",
                rusqlite::params![Utc::now().to_rfc3339(), level, message],
            )
            .map_err(|e| LikebotError::Store(format!("Save event: {e}")))
        });
        if let Err(e) = result {
            tracing::warn!("⚠️ Failed to record audit event: {e}");
        }
    }

    /// Number of audit events recorded in the last `hours` hours.
    pub fn recent_event_count(&self, hours: i64) -> Result<u32> {
        let conn = self.lock()?;
        let cutoff = (Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
        conn.query_row(
            "SELECT COUNT(*) FROM events WHERE ts > ?1",
            [cutoff],
            |row| row.get::<_, u32>(0),
        )
        .map_err(|e| LikebotError::Store(format!("Count events: {e}")))
    }

    // ─── Stats ──────────────────────────────────────

    /// Aggregate statistics for the admin stats view.
    pub fn stats(&self) -> Result<BotStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<u32> {
            conn.query_row(sql, [], |row| row.get::<_, u32>(0))
                .map_err(|e| LikebotError::Store(format!("Stats: {e}")))
        };
        let active_tasks = count("SELECT COUNT(*) FROM auto_tasks WHERE runs_remaining > 0")?;
        let total_principals = count("SELECT COUNT(*) FROM entitlements")?;
        let like_granted = count("SELECT COUNT(*) FROM entitlements WHERE like_allowed = 1")?;
        let auto_granted = count("SELECT COUNT(*) FROM entitlements WHERE auto_allowed = 1")?;
        drop(conn);
        let recent_events = self.recent_event_count(24)?;
        Ok(BotStats {
            active_tasks,
            total_principals,
            like_granted,
            auto_granted,
            recent_events,
        })
    }
}

/// Counts shown by the stats command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStats {
    pub active_tasks: u32,
    pub total_principals: u32,
    pub like_granted: u32,
    pub auto_granted: u32,
    pub recent_events: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_migrate() {
        let db = LikebotDb::open_in_memory(QuotaConfig::default()).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.active_tasks, 0);
        assert_eq!(stats.total_principals, 0);
    }

    #[test]
    fn trigger_day_round_trips() {
        let db = LikebotDb::open_in_memory(QuotaConfig::default()).unwrap();
        assert_eq!(db.last_trigger_day().unwrap(), None);

        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        db.set_last_trigger_day(day).unwrap();
        assert_eq!(db.last_trigger_day().unwrap(), Some(day));

        let next = day.succ_opt().unwrap();
        db.set_last_trigger_day(next).unwrap();
        assert_eq!(db.last_trigger_day().unwrap(), Some(next));
    }

    #[test]
    fn events_are_counted() {
        let db = LikebotDb::open_in_memory(QuotaConfig::default()).unwrap();
        db.log_event("INFO", "grant issued");
        db.log_event("ERROR", "like failed");
        assert_eq!(db.recent_event_count(24).unwrap(), 2);
        assert_eq!(db.stats().unwrap().recent_events, 2);
    }
}
