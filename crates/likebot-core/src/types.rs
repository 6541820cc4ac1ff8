//! Domain types — principals, entitlements, auto tasks, run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of the account entitlements attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for PrincipalId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The two rate-limited action classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionClass {
    /// Immediate like, sent on request.
    Like,
    /// Creation of a recurring auto-like task.
    Auto,
}

impl ActionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for ActionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "like" => Ok(Self::Like),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown action class '{other}' (expected like|auto)")),
        }
    }
}

/// Per-principal capability flags, limit overrides, and daily counters.
///
/// A principal without a stored row reads as `Entitlement::empty` — no
/// capability, zero usage. Rows are only persisted on first mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub principal: PrincipalId,
    pub like_allowed: bool,
    pub auto_allowed: bool,
    /// Override of the class-wide default; `None` means use the default.
    pub like_limit: Option<u32>,
    pub auto_limit: Option<u32>,
    pub likes_used: u32,
    pub autos_used: u32,
    /// When the like counter was last reset to zero.
    pub like_reset_at: Option<DateTime<Utc>>,
    pub auto_reset_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    /// Zero-value view for a principal with no stored record.
    pub fn empty(principal: PrincipalId) -> Self {
        Self {
            principal,
            like_allowed: false,
            auto_allowed: false,
            like_limit: None,
            auto_limit: None,
            likes_used: 0,
            autos_used: 0,
            like_reset_at: None,
            auto_reset_at: None,
        }
    }

    pub fn allowed(&self, class: ActionClass) -> bool {
        match class {
            ActionClass::Like => self.like_allowed,
            ActionClass::Auto => self.auto_allowed,
        }
    }

    pub fn limit_override(&self, class: ActionClass) -> Option<u32> {
        match class {
            ActionClass::Like => self.like_limit,
            ActionClass::Auto => self.auto_limit,
        }
    }
}

/// Usage snapshot for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaView {
    pub used: u32,
    pub limit: u32,
}

/// A stored intent to like a target once per day until the countdown
/// reaches zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTask {
    /// The game UID the like is repeatedly applied to. At most one
    /// active task exists per target across the whole system.
    pub target: String,
    /// Principal on whose quota and ownership the task counts.
    pub owner: PrincipalId,
    /// Decremented by exactly one per successful run; the task is
    /// removed when it reaches zero.
    pub runs_remaining: u32,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Message from the most recent failed run, cleared on success.
    pub last_error: Option<String>,
}

/// Result of one runner pass over one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub target: String,
    pub owner: PrincipalId,
    pub success: bool,
    pub message: String,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<RunOutcome>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: RunOutcome) {
        self.attempted += 1;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_entitlement_has_no_capability() {
        let e = Entitlement::empty(PrincipalId(42));
        assert!(!e.allowed(ActionClass::Like));
        assert!(!e.allowed(ActionClass::Auto));
        assert_eq!(e.likes_used, 0);
        assert_eq!(e.limit_override(ActionClass::Auto), None);
    }

    #[test]
    fn action_class_parses() {
        assert_eq!("like".parse::<ActionClass>().unwrap(), ActionClass::Like);
        assert_eq!("AUTO".parse::<ActionClass>().unwrap(), ActionClass::Auto);
        assert!("daily".parse::<ActionClass>().is_err());
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(RunOutcome {
            target: "111".into(),
            owner: PrincipalId(1),
            success: true,
            message: "ok".into(),
        });
        summary.record(RunOutcome {
            target: "222".into(),
            owner: PrincipalId(2),
            success: false,
            message: "timeout".into(),
        });
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }
}
