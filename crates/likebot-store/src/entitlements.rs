//! Entitlement store — capability flags and limit overrides.
//!
//! Rows materialize lazily: reads of an absent principal return a
//! zero-value view without persisting anything; the row is only
//! created on first mutation.

use chrono::{DateTime, Utc};
use likebot_core::error::{LikebotError, Result};
use likebot_core::types::{ActionClass, Entitlement, PrincipalId};
use rusqlite::{Connection, OptionalExtension};

use crate::db::LikebotDb;

/// Column names for one action class, used to share the SQL between
/// the like and auto counters.
pub(crate) struct ClassColumns {
    pub allowed: &'static str,
    pub limit: &'static str,
    pub used: &'static str,
    pub reset_at: &'static str,
}

pub(crate) fn columns(class: ActionClass) -> ClassColumns {
    match class {
        ActionClass::Like => ClassColumns {
            allowed: "like_allowed",
            limit: "like_limit",
            used: "likes_used",
            reset_at: "like_reset_at",
        },
        ActionClass::Auto => ClassColumns {
            allowed: "auto_allowed",
            limit: "auto_limit",
            used: "autos_used",
            reset_at: "auto_reset_at",
        },
    }
}

pub(crate) fn parse_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn read_entitlement(conn: &Connection, principal: PrincipalId) -> Result<Option<Entitlement>> {
    conn.query_row(
        "SELECT like_allowed, auto_allowed, like_limit, auto_limit,
                likes_used, autos_used, like_reset_at, auto_reset_at
         FROM entitlements WHERE principal_id = ?1",
        [principal.0],
        |row| {
            Ok(Entitlement {
                principal,
                like_allowed: row.get::<_, i64>(0)? != 0,
                auto_allowed: row.get::<_, i64>(1)? != 0,
                like_limit: row.get(2)?,
                auto_limit: row.get(3)?,
                likes_used: row.get(4)?,
                autos_used: row.get(5)?,
                like_reset_at: parse_ts(row.get(6)?),
                auto_reset_at: parse_ts(row.get(7)?),
            })
        },
    )
    .optional()
    .map_err(|e| LikebotError::Store(format!("Load entitlement: {e}")))
}

/// Insert the zero-value row if the principal has none yet.
pub(crate) fn ensure_row(conn: &Connection, principal: PrincipalId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO entitlements (principal_id) VALUES (?1)",
        [principal.0],
    )
    .map_err(|e| LikebotError::Store(format!("Create entitlement: {e}")))?;
    Ok(())
}

impl LikebotDb {
    /// Get-or-default: never fails for a well-formed id, never persists
    /// a row for a read-only probe.
    pub fn entitlement(&self, principal: PrincipalId) -> Result<Entitlement> {
        let conn = self.lock()?;
        Ok(read_entitlement(&conn, principal)?.unwrap_or_else(|| Entitlement::empty(principal)))
    }

    /// Grant or revoke a capability. Idempotent; materializes the row.
    pub fn set_capability(
        &self,
        principal: PrincipalId,
        class: ActionClass,
        enabled: bool,
    ) -> Result<()> {
        let conn = self.lock()?;
        ensure_row(&conn, principal)?;
        let cols = columns(class);
        conn.execute(
            &format!(
                "UPDATE entitlements SET {} = ?1 WHERE principal_id = ?2",
                cols.allowed
            ),
            rusqlite::params![enabled as i64, principal.0],
        )
        .map_err(|e| LikebotError::Store(format!("Set capability: {e}")))?;
        tracing::info!(
            "🔑 {} {} for principal {}",
            if enabled { "Granted" } else { "Revoked" },
            class.as_str(),
            principal
        );
        Ok(())
    }

    /// Set or clear the per-principal limit override. `None` reverts to
    /// the class default.
    pub fn set_limit(
        &self,
        principal: PrincipalId,
        class: ActionClass,
        value: Option<u32>,
    ) -> Result<()> {
        let conn = self.lock()?;
        ensure_row(&conn, principal)?;
        let cols = columns(class);
        conn.execute(
            &format!(
                "UPDATE entitlements SET {} = ?1 WHERE principal_id = ?2",
                cols.limit
            ),
            rusqlite::params![value, principal.0],
        )
        .map_err(|e| LikebotError::Store(format!("Set limit: {e}")))?;
        Ok(())
    }

    /// Effective daily limit: the override when present, else the
    /// configured class default.
    pub fn effective_limit(&self, principal: PrincipalId, class: ActionClass) -> Result<u32> {
        let entitlement = self.entitlement(principal)?;
        Ok(entitlement
            .limit_override(class)
            .unwrap_or(self.quota_config().default_limit(class)))
    }

    /// All stored entitlements, for the admin limits view. Best-effort
    /// snapshot; display-only.
    pub fn list_entitlements(&self) -> Result<Vec<Entitlement>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT principal_id, like_allowed, auto_allowed, like_limit, auto_limit,
                        likes_used, autos_used, like_reset_at, auto_reset_at
                 FROM entitlements ORDER BY principal_id",
            )
            .map_err(|e| LikebotError::Store(format!("List entitlements: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Entitlement {
                    principal: PrincipalId(row.get(0)?),
                    like_allowed: row.get::<_, i64>(1)? != 0,
                    auto_allowed: row.get::<_, i64>(2)? != 0,
                    like_limit: row.get(3)?,
                    auto_limit: row.get(4)?,
                    likes_used: row.get(5)?,
                    autos_used: row.get(6)?,
                    like_reset_at: parse_ts(row.get(7)?),
                    auto_reset_at: parse_ts(row.get(8)?),
                })
            })
            .map_err(|e| LikebotError::Store(format!("List entitlements: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
