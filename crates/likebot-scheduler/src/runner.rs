//! Task runner — one pass over the active auto tasks.
//!
//! Per-task sequence: snapshot under the store lock, call the gateway
//! with no lock held, then commit the outcome under the lock again.
//! A failed external call never consumes a run; one target's failure
//! never aborts the batch. The run guard makes overlapping passes
//! impossible, so two batches can never double-decrement a task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use likebot_core::error::{LikebotError, Result};
use likebot_core::types::{RunOutcome, RunSummary};
use likebot_gateway::LikeGateway;
use likebot_store::LikebotDb;

/// Executes batch runs. Shared between the daily trigger and the
/// manual admin trigger.
pub struct TaskRunner {
    db: Arc<LikebotDb>,
    gateway: Arc<dyn LikeGateway>,
    guard: tokio::sync::Mutex<()>,
}

impl TaskRunner {
    pub fn new(db: Arc<LikebotDb>, gateway: Arc<dyn LikeGateway>) -> Self {
        Self {
            db,
            gateway,
            guard: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn db(&self) -> &LikebotDb {
        &self.db
    }

    /// Run every active task once and report the batch summary.
    ///
    /// Errors with `RunInProgress` when another pass is mid-flight;
    /// the active task set is snapshotted at batch start, so tasks
    /// scheduled mid-batch are deferred to the next cycle.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let Ok(_running) = self.guard.try_lock() else {
            return Err(LikebotError::RunInProgress);
        };

        let tasks = self.db.active_tasks()?;
        tracing::info!("🔄 Batch run started: {} active task(s)", tasks.len());

        let mut summary = RunSummary::default();
        for task in tasks {
            // Network call happens outside the store lock
            let outcome = self.gateway.invoke(&task.target).await;

            if outcome.success {
                match self.db.decrement_on_success(&task.target, now) {
                    Ok(0) => {
                        tracing::info!("🏁 Auto task for target {} completed", task.target);
                        self.db.log_event(
                            "INFO",
                            &format!("auto task completed for target {}", task.target),
                        );
                    }
                    Ok(remaining) => {
                        self.db.log_event(
                            "INFO",
                            &format!(
                                "auto like sent to target {} ({} run(s) left, owner {})",
                                task.target, remaining, task.owner
                            ),
                        );
                    }
                    // Removed mid-batch; nothing left to commit
                    Err(LikebotError::NotFound) => {}
                    Err(e) => return Err(e),
                }
            } else {
                self.db.record_failure(&task.target, now, &outcome.message)?;
                self.db.log_event(
                    "ERROR",
                    &format!(
                        "auto like failed for target {} (owner {}): {}",
                        task.target, task.owner, outcome.message
                    ),
                );
            }

            summary.record(RunOutcome {
                target: task.target,
                owner: task.owner,
                success: outcome.success,
                message: outcome.message,
            });
        }

        tracing::info!(
            "📣 Batch run finished: {}/{} succeeded, {} failed",
            summary.succeeded,
            summary.attempted,
            summary.failed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use likebot_core::config::QuotaConfig;
    use likebot_core::types::PrincipalId;
    use likebot_gateway::LikeOutcome;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway that replays a script of outcomes and counts calls.
    struct ScriptedGateway {
        script: Mutex<VecDeque<bool>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(script: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LikeGateway for ScriptedGateway {
        async fn invoke(&self, _target: &str) -> LikeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Past the end of the script, keep succeeding
            let success = self.script.lock().unwrap().pop_front().unwrap_or(true);
            if success {
                LikeOutcome::ok("1 like added")
            } else {
                LikeOutcome::failed("HTTP 503")
            }
        }
    }

    fn db() -> Arc<LikebotDb> {
        Arc::new(LikebotDb::open_in_memory(QuotaConfig::default()).unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn countdown_runs_to_completion() {
        let db = db();
        db.create_or_replace_task("T1", PrincipalId(1), 2, now()).unwrap();
        let gateway = ScriptedGateway::new(&[]);
        let runner = TaskRunner::new(Arc::clone(&db), gateway.clone());

        let s1 = runner.run_once(now()).await.unwrap();
        assert_eq!((s1.attempted, s1.succeeded), (1, 1));
        let s2 = runner.run_once(now()).await.unwrap();
        assert_eq!(s2.succeeded, 1);

        // Task is gone; a third batch does not attempt it
        let s3 = runner.run_once(now()).await.unwrap();
        assert_eq!(s3.attempted, 0);
        assert_eq!(gateway.calls(), 2);
        assert!(db.active_tasks().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_call_does_not_consume_a_run() {
        let db = db();
        db.create_or_replace_task("T1", PrincipalId(1), 2, now()).unwrap();
        // Fail once, then succeed until done
        let gateway = ScriptedGateway::new(&[false]);
        let runner = TaskRunner::new(Arc::clone(&db), gateway.clone());

        let s1 = runner.run_once(now()).await.unwrap();
        assert_eq!((s1.succeeded, s1.failed), (0, 1));
        let task = &db.active_tasks().unwrap()[0];
        assert_eq!(task.runs_remaining, 2);
        assert_eq!(task.last_error.as_deref(), Some("HTTP 503"));

        // Two successful cycles finish the task: exactly two decrements
        runner.run_once(now()).await.unwrap();
        runner.run_once(now()).await.unwrap();
        assert!(db.active_tasks().unwrap().is_empty());
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn one_failing_target_does_not_block_the_batch() {
        let db = db();
        db.create_or_replace_task("BAD", PrincipalId(1), 1, now()).unwrap();
        db.create_or_replace_task("GOOD", PrincipalId(2), 1, now()).unwrap();
        // Tasks run in target order: BAD fails, GOOD succeeds
        let gateway = ScriptedGateway::new(&[false, true]);
        let runner = TaskRunner::new(Arc::clone(&db), gateway);

        let summary = runner.run_once(now()).await.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        let remaining = db.active_tasks().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].target, "BAD");
    }

    /// Gateway that blocks until released, to hold a run mid-flight.
    struct BlockingGateway {
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl LikeGateway for BlockingGateway {
        async fn invoke(&self, _target: &str) -> LikeOutcome {
            self.release.notified().await;
            LikeOutcome::ok("ok")
        }
    }

    #[tokio::test]
    async fn overlapping_runs_are_rejected() {
        let db = db();
        db.create_or_replace_task("T1", PrincipalId(1), 1, now()).unwrap();
        let gateway = Arc::new(BlockingGateway {
            release: tokio::sync::Notify::new(),
        });
        let runner = Arc::new(TaskRunner::new(Arc::clone(&db), gateway.clone()));

        let first = tokio::spawn({
            let runner = Arc::clone(&runner);
            async move { runner.run_once(now()).await }
        });
        // Let the first run reach the blocked gateway call
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            runner.run_once(now()).await,
            Err(LikebotError::RunInProgress)
        ));

        gateway.release.notify_one();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.succeeded, 1);

        // Guard released: a new run works again
        assert!(runner.run_once(now()).await.is_ok());
    }
}
