//! # Likebot Service
//!
//! The command surface the chat front-end (or CLI) calls into. Every
//! operation here is a plain async function on [`LikeService`]:
//! entitlement gating, quota consumption, and ownership checks all
//! happen on this side of the seam, so any front-end gets identical
//! semantics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use likebot_core::admins::AdminSet;
use likebot_core::error::{LikebotError, Result};
use likebot_core::types::{ActionClass, AutoTask, Entitlement, PrincipalId, QuotaView, RunSummary};
use likebot_gateway::LikeGateway;
use likebot_scheduler::TaskRunner;
use likebot_store::{BotStats, LikebotDb};

/// Quota snapshot for one principal across both action classes.
#[derive(Debug, Clone, Copy)]
pub struct QuotaStatus {
    pub like: QuotaView,
    pub auto: QuotaView,
}

/// Wires the store, gateway, runner, and admin allow-list together.
pub struct LikeService {
    db: Arc<LikebotDb>,
    gateway: Arc<dyn LikeGateway>,
    runner: Arc<TaskRunner>,
    admins: AdminSet,
}

impl LikeService {
    pub fn new(
        db: Arc<LikebotDb>,
        gateway: Arc<dyn LikeGateway>,
        runner: Arc<TaskRunner>,
        admins: AdminSet,
    ) -> Self {
        Self {
            db,
            gateway,
            runner,
            admins,
        }
    }

    pub fn is_admin(&self, principal: PrincipalId) -> bool {
        self.admins.contains(principal)
    }

    fn require_admin(&self, principal: PrincipalId) -> Result<()> {
        if self.is_admin(principal) {
            Ok(())
        } else {
            Err(LikebotError::Forbidden)
        }
    }

    // ─── Immediate likes ──────────────────────────────────────

    /// Send one like right now. The quota slot is consumed before the
    /// external call (atomically, so concurrent requests cannot
    /// oversubscribe the budget); admins bypass the quota entirely.
    pub async fn send_like(
        &self,
        requester: PrincipalId,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if target.is_empty() {
            return Err(LikebotError::InvalidArgument("target must not be empty".into()));
        }
        if !self.is_admin(requester) {
            self.db.try_consume(requester, ActionClass::Like, now)?;
        }

        // Gateway call with no store lock held
        let outcome = self.gateway.invoke(target).await;
        if outcome.success {
            self.db.log_event(
                "INFO",
                &format!("like sent to target {target} by {requester}"),
            );
            Ok(outcome.message)
        } else {
            self.db.log_event(
                "ERROR",
                &format!("like failed for target {target} by {requester}: {}", outcome.message),
            );
            Err(LikebotError::Gateway(outcome.message))
        }
    }

    // ─── Auto tasks ──────────────────────────────────────

    /// Schedule (or re-schedule) a daily auto task. Scheduling for a
    /// target that already has a task overwrites its countdown and
    /// owner. Only admins may schedule on behalf of another owner; the
    /// task always counts against the owner's auto quota, so an
    /// admin-created task still needs the owner's grant and budget.
    /// Admin-owned tasks bypass the quota.
    pub fn schedule_auto(
        &self,
        requester: PrincipalId,
        owner: PrincipalId,
        target: &str,
        runs: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if target.is_empty() {
            return Err(LikebotError::InvalidArgument("target must not be empty".into()));
        }
        if runs == 0 {
            return Err(LikebotError::InvalidArgument("runs must be at least 1".into()));
        }
        if owner != requester && !self.is_admin(requester) {
            return Err(LikebotError::Forbidden);
        }
        if !self.is_admin(owner) {
            self.db.try_consume(owner, ActionClass::Auto, now)?;
        }
        self.db.create_or_replace_task(target, owner, runs, now)?;
        self.db.log_event(
            "INFO",
            &format!("auto task scheduled for target {target}: {runs} run(s), owner {owner}"),
        );
        Ok(())
    }

    /// Add runs to an existing task. Owner or admin only. Returns the
    /// new countdown.
    pub fn extend_auto(&self, requester: PrincipalId, target: &str, delta: u32) -> Result<u32> {
        if delta == 0 {
            return Err(LikebotError::InvalidArgument("delta must be at least 1".into()));
        }
        let task = self.db.task(target)?.ok_or(LikebotError::NotFound)?;
        if task.owner != requester && !self.is_admin(requester) {
            return Err(LikebotError::Forbidden);
        }
        self.db.extend_task(target, delta)
    }

    /// Remove an auto task. Owner or admin only.
    pub fn remove_auto(&self, requester: PrincipalId, target: &str) -> Result<()> {
        self.db
            .remove_task(target, requester, self.is_admin(requester))
    }

    /// Active tasks owned by the requester.
    pub fn my_autos(&self, owner: PrincipalId) -> Result<Vec<AutoTask>> {
        self.db.tasks_for_owner(owner)
    }

    /// Fire the batch runner now. Admin only; identical semantics to
    /// the scheduled daily run because both call the same entry point.
    pub async fn trigger_run(&self, requester: PrincipalId, now: DateTime<Utc>) -> Result<RunSummary> {
        self.require_admin(requester)?;
        self.db
            .log_event("INFO", &format!("manual run triggered by {requester}"));
        self.runner.run_once(now).await
    }

    // ─── Administration ──────────────────────────────────────

    /// Grant or revoke a capability flag. Admin only.
    pub fn set_capability(
        &self,
        requester: PrincipalId,
        principal: PrincipalId,
        class: ActionClass,
        enabled: bool,
    ) -> Result<()> {
        self.require_admin(requester)?;
        self.db.set_capability(principal, class, enabled)?;
        self.db.log_event(
            "INFO",
            &format!(
                "{} {} for {principal} by {requester}",
                if enabled { "granted" } else { "revoked" },
                class.as_str()
            ),
        );
        Ok(())
    }

    /// Set or clear a per-principal daily limit override. Admin only.
    pub fn set_limit(
        &self,
        requester: PrincipalId,
        principal: PrincipalId,
        class: ActionClass,
        value: Option<u32>,
    ) -> Result<()> {
        self.require_admin(requester)?;
        self.db.set_limit(principal, class, value)
    }

    /// All stored entitlements. Admin only; best-effort snapshot.
    pub fn view_limits(&self, requester: PrincipalId) -> Result<Vec<Entitlement>> {
        self.require_admin(requester)?;
        self.db.list_entitlements()
    }

    /// Usage for both classes, applying the same reset-if-stale rule
    /// as consumption so the display never shows yesterday's counters.
    pub fn quota_status(&self, principal: PrincipalId, now: DateTime<Utc>) -> Result<QuotaStatus> {
        Ok(QuotaStatus {
            like: self.db.peek(principal, ActionClass::Like, now)?,
            auto: self.db.peek(principal, ActionClass::Auto, now)?,
        })
    }

    /// Aggregate statistics. Admin only.
    pub fn stats(&self, requester: PrincipalId) -> Result<BotStats> {
        self.require_admin(requester)?;
        self.db.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use likebot_core::config::QuotaConfig;
    use likebot_gateway::LikeOutcome;

    /// Gateway with a fixed answer.
    struct StaticGateway {
        success: bool,
    }

    #[async_trait]
    impl LikeGateway for StaticGateway {
        async fn invoke(&self, _target: &str) -> LikeOutcome {
            if self.success {
                LikeOutcome::ok("1 like added")
            } else {
                LikeOutcome::failed("uid not found")
            }
        }
    }

    const ADMIN: PrincipalId = PrincipalId(900);
    const ALICE: PrincipalId = PrincipalId(1);
    const BOB: PrincipalId = PrincipalId(2);

    fn service(success: bool) -> LikeService {
        let db = Arc::new(LikebotDb::open_in_memory(QuotaConfig::default()).unwrap());
        let gateway: Arc<dyn LikeGateway> = Arc::new(StaticGateway { success });
        let runner = Arc::new(TaskRunner::new(Arc::clone(&db), Arc::clone(&gateway)));
        LikeService::new(db, gateway, runner, AdminSet::from_ids(&[900]))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn like_requires_grant_and_consumes_quota() {
        let svc = service(true);
        assert!(matches!(
            svc.send_like(ALICE, "111", now()).await,
            Err(LikebotError::NotPermitted)
        ));

        svc.set_capability(ADMIN, ALICE, ActionClass::Like, true).unwrap();
        for _ in 0..3 {
            svc.send_like(ALICE, "111", now()).await.unwrap();
        }
        assert!(matches!(
            svc.send_like(ALICE, "111", now()).await,
            Err(LikebotError::LimitExceeded { used: 3, limit: 3 })
        ));
        let status = svc.quota_status(ALICE, now()).unwrap();
        assert_eq!(status.like, QuotaView { used: 3, limit: 3 });
        assert_eq!(status.auto.used, 0);
    }

    #[tokio::test]
    async fn admin_bypasses_quota() {
        let svc = service(true);
        for _ in 0..10 {
            svc.send_like(ADMIN, "111", now()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn failed_gateway_surfaces_message() {
        let svc = service(false);
        svc.set_capability(ADMIN, ALICE, ActionClass::Like, true).unwrap();
        match svc.send_like(ALICE, "111", now()).await {
            Err(LikebotError::Gateway(msg)) => assert_eq!(msg, "uid not found"),
            other => panic!("expected Gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn schedule_is_gated_and_rescheduling_overwrites() {
        let svc = service(true);
        assert!(matches!(
            svc.schedule_auto(ALICE, ALICE, "T1", 30, now()),
            Err(LikebotError::NotPermitted)
        ));

        svc.set_capability(ADMIN, ALICE, ActionClass::Auto, true).unwrap();
        svc.schedule_auto(ALICE, ALICE, "T1", 30, now()).unwrap();
        svc.schedule_auto(ALICE, ALICE, "T1", 5, now()).unwrap();

        let autos = svc.my_autos(ALICE).unwrap();
        assert_eq!(autos.len(), 1);
        assert_eq!(autos[0].runs_remaining, 5);
    }

    #[tokio::test]
    async fn scheduling_for_someone_else_requires_admin() {
        let svc = service(true);
        svc.set_capability(ADMIN, ALICE, ActionClass::Auto, true).unwrap();
        svc.set_capability(ADMIN, BOB, ActionClass::Auto, true).unwrap();
        assert!(matches!(
            svc.schedule_auto(ALICE, BOB, "T1", 3, now()),
            Err(LikebotError::Forbidden)
        ));
        // Admin may assign ownership to anyone with the grant
        svc.schedule_auto(ADMIN, BOB, "T1", 3, now()).unwrap();
        assert_eq!(svc.my_autos(BOB).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_scheduling_charges_the_owner() {
        let svc = service(true);
        svc.set_capability(ADMIN, ALICE, ActionClass::Auto, true).unwrap();

        svc.schedule_auto(ADMIN, ALICE, "T1", 5, now()).unwrap();
        assert_eq!(svc.quota_status(ALICE, now()).unwrap().auto.used, 1);

        // No grant on the owner, no task, admin or not
        assert!(matches!(
            svc.schedule_auto(ADMIN, BOB, "T2", 5, now()),
            Err(LikebotError::NotPermitted)
        ));

        // Admin-owned tasks stay uncharged
        svc.schedule_auto(ADMIN, ADMIN, "T3", 5, now()).unwrap();
        assert_eq!(svc.quota_status(ADMIN, now()).unwrap().auto.used, 0);
    }

    #[tokio::test]
    async fn extend_and_remove_respect_ownership() {
        let svc = service(true);
        svc.set_capability(ADMIN, ALICE, ActionClass::Auto, true).unwrap();
        svc.schedule_auto(ADMIN, ALICE, "T1", 3, now()).unwrap();

        assert!(matches!(
            svc.extend_auto(BOB, "T1", 2),
            Err(LikebotError::Forbidden)
        ));
        assert_eq!(svc.extend_auto(ALICE, "T1", 2).unwrap(), 5);
        assert!(matches!(
            svc.extend_auto(ALICE, "missing", 2),
            Err(LikebotError::NotFound)
        ));

        assert!(matches!(
            svc.remove_auto(BOB, "T1"),
            Err(LikebotError::Forbidden)
        ));
        svc.remove_auto(ADMIN, "T1").unwrap();
        assert!(svc.my_autos(ALICE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected() {
        let svc = service(true);
        assert!(matches!(
            svc.schedule_auto(ADMIN, ALICE, "T1", 0, now()),
            Err(LikebotError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.schedule_auto(ADMIN, ALICE, "", 3, now()),
            Err(LikebotError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.send_like(ADMIN, "", now()).await,
            Err(LikebotError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn manual_trigger_is_admin_only_and_runs_the_batch() {
        let svc = service(true);
        svc.set_capability(ADMIN, ALICE, ActionClass::Auto, true).unwrap();
        svc.schedule_auto(ADMIN, ALICE, "T1", 2, now()).unwrap();

        assert!(matches!(
            svc.trigger_run(ALICE, now()).await,
            Err(LikebotError::Forbidden)
        ));
        let summary = svc.trigger_run(ADMIN, now()).await.unwrap();
        assert_eq!((summary.attempted, summary.succeeded), (1, 1));
        assert_eq!(svc.my_autos(ALICE).unwrap()[0].runs_remaining, 1);
    }

    #[tokio::test]
    async fn stats_and_limits_views_are_admin_only() {
        let svc = service(true);
        svc.set_capability(ADMIN, ALICE, ActionClass::Like, true).unwrap();
        svc.set_capability(ADMIN, ALICE, ActionClass::Auto, true).unwrap();
        svc.schedule_auto(ADMIN, ALICE, "T1", 2, now()).unwrap();

        assert!(matches!(svc.stats(ALICE), Err(LikebotError::Forbidden)));
        assert!(matches!(svc.view_limits(ALICE), Err(LikebotError::Forbidden)));

        let stats = svc.stats(ADMIN).unwrap();
        assert_eq!(stats.active_tasks, 1);
        assert_eq!(stats.like_granted, 1);
        assert!(!svc.view_limits(ADMIN).unwrap().is_empty());
    }
}
