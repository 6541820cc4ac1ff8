//! Quota tracker — atomic daily check-and-increment with
//! reset-on-read day rollover.
//!
//! Counters reset the first time a principal is touched on a new quota
//! day rather than via a background timer, so correctness survives
//! process downtime: any read after the boundary self-heals.

use chrono::{DateTime, Utc};
use likebot_core::clock::quota_day;
use likebot_core::error::{LikebotError, Result};
use likebot_core::types::{ActionClass, PrincipalId, QuotaView};
use rusqlite::OptionalExtension;

use crate::db::LikebotDb;
use crate::entitlements::{columns, parse_ts};

/// One class's counter state as stored.
struct CounterRow {
    allowed: bool,
    limit_override: Option<u32>,
    used: u32,
    reset_at: Option<DateTime<Utc>>,
}

impl LikebotDb {
    /// Consume one unit of the daily budget, or explain why not.
    ///
    /// The whole read-reset-check-increment sequence runs under the
    /// store lock: two concurrent callers can never both take the last
    /// remaining slot. The rollover reset happens before the limit is
    /// evaluated, so a cross-midnight request always sees a fresh
    /// budget.
    pub fn try_consume(
        &self,
        principal: PrincipalId,
        class: ActionClass,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let anchor = self.quota_config().anchor();
        let default_limit = self.quota_config().default_limit(class);
        let cols = columns(class);

        let conn = self.lock()?;
        let Some(mut row) = read_counter(&conn, principal, class)? else {
            // No stored record means no capability was ever granted.
            return Err(LikebotError::NotPermitted);
        };
        if !row.allowed {
            return Err(LikebotError::NotPermitted);
        }

        let today = quota_day(now, anchor);
        if row.reset_at.map(|t| quota_day(t, anchor)) != Some(today) {
            conn.execute(
                &format!(
                    "UPDATE entitlements SET {} = 0, {} = ?1 WHERE principal_id = ?2",
                    cols.used, cols.reset_at
                ),
                rusqlite::params![now.to_rfc3339(), principal.0],
            )
            .map_err(|e| LikebotError::Store(format!("Quota reset: {e}")))?;
            row.used = 0;
        }

        let limit = row.limit_override.unwrap_or(default_limit);
        if row.used >= limit {
            return Err(LikebotError::LimitExceeded {
                used: row.used,
                limit,
            });
        }

        conn.execute(
            &format!(
                "UPDATE entitlements SET {} = {} + 1 WHERE principal_id = ?1",
                cols.used, cols.used
            ),
            [principal.0],
        )
        .map_err(|e| LikebotError::Store(format!("Quota consume: {e}")))?;
        Ok(())
    }

    /// Usage snapshot with the same reset-if-stale behavior as
    /// `try_consume`, but no increment. Used for status displays.
    pub fn peek(
        &self,
        principal: PrincipalId,
        class: ActionClass,
        now: DateTime<Utc>,
    ) -> Result<QuotaView> {
        let anchor = self.quota_config().anchor();
        let default_limit = self.quota_config().default_limit(class);
        let cols = columns(class);

        let conn = self.lock()?;
        let Some(mut row) = read_counter(&conn, principal, class)? else {
            return Ok(QuotaView {
                used: 0,
                limit: default_limit,
            });
        };

        let today = quota_day(now, anchor);
        if row.reset_at.map(|t| quota_day(t, anchor)) != Some(today) {
            conn.execute(
                &format!(
                    "UPDATE entitlements SET {} = 0, {} = ?1 WHERE principal_id = ?2",
                    cols.used, cols.reset_at
                ),
                rusqlite::params![now.to_rfc3339(), principal.0],
            )
            .map_err(|e| LikebotError::Store(format!("Quota reset: {e}")))?;
            row.used = 0;
        }

        Ok(QuotaView {
            used: row.used,
            limit: row.limit_override.unwrap_or(default_limit),
        })
    }
}

fn read_counter(
    conn: &rusqlite::Connection,
    principal: PrincipalId,
    class: ActionClass,
) -> Result<Option<CounterRow>> {
    let cols = columns(class);
    conn.query_row(
        &format!(
            "SELECT {}, {}, {}, {} FROM entitlements WHERE principal_id = ?1",
            cols.allowed, cols.limit, cols.used, cols.reset_at
        ),
        [principal.0],
        |row| {
            Ok(CounterRow {
                allowed: row.get::<_, i64>(0)? != 0,
                limit_override: row.get(1)?,
                used: row.get(2)?,
                reset_at: parse_ts(row.get(3)?),
            })
        },
    )
    .optional()
    .map_err(|e| LikebotError::Store(format!("Load quota: {e}")))
}
