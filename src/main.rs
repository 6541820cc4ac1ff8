//! # Likebot
//!
//! Daemon and operator CLI for the like-quota service.
//!
//! Usage:
//!   likebot run                          # Start the daily scheduler daemon
//!   likebot grant 12345 like             # Grant the like capability
//!   likebot schedule 8385763215 30       # Auto-like a target for 30 days
//!   likebot trigger                      # Fire the batch run now
//!   likebot stats                        # Aggregate counters

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use likebot_core::types::{ActionClass, PrincipalId};
use likebot_core::{AdminSet, LikebotConfig};
use likebot_gateway::{HttpLikeGateway, LikeGateway};
use likebot_scheduler::{TaskRunner, run_daily_trigger};
use likebot_service::LikeService;
use likebot_store::LikebotDb;

#[derive(Parser)]
#[command(name = "likebot", version, about = "👍 Likebot — daily like quotas and auto-like scheduling")]
struct Cli {
    /// Config file path (default: ~/.likebot/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Principal id the command acts as (default: first configured admin)
    #[arg(long)]
    actor: Option<i64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon: the daily trigger fires the batch at the
    /// configured local time in the anchor timezone
    Run,
    /// Send one like to a target right now
    Like { target: String },
    /// Schedule (or re-schedule) a daily auto task
    Schedule {
        target: String,
        runs: u32,
        /// Owner principal (default: the actor)
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Add runs to an existing auto task
    Extend { target: String, delta: u32 },
    /// Remove an auto task
    Remove { target: String },
    /// List active auto tasks for an owner (default: the actor)
    Autos {
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Fire the batch run now (admin)
    Trigger,
    /// Grant a capability: like or auto (admin)
    Grant { principal: i64, class: String },
    /// Revoke a capability (admin)
    Revoke { principal: i64, class: String },
    /// Set a per-principal daily limit override (admin)
    SetLimit {
        principal: i64,
        class: String,
        limit: u32,
    },
    /// Clear an override, reverting to the class default (admin)
    ClearLimit { principal: i64, class: String },
    /// Show all stored entitlements (admin)
    Limits,
    /// Show quota usage for a principal (default: the actor)
    Status {
        #[arg(long)]
        principal: Option<i64>,
    },
    /// Aggregate statistics (admin)
    Stats,
}

fn parse_class(s: &str) -> Result<ActionClass> {
    s.parse::<ActionClass>().map_err(|e| anyhow::anyhow!(e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "likebot=debug" } else { "likebot=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => LikebotConfig::load_from(std::path::Path::new(path))?,
        None => LikebotConfig::load()?,
    };

    let db = Arc::new(LikebotDb::open(
        &config.database_path(),
        config.quota.clone(),
    )?);
    let gateway: Arc<dyn LikeGateway> = Arc::new(HttpLikeGateway::new(config.gateway.clone()));
    let runner = Arc::new(TaskRunner::new(Arc::clone(&db), Arc::clone(&gateway)));
    let admins = AdminSet::from_ids(&config.admin_ids);
    let service = LikeService::new(Arc::clone(&db), gateway, Arc::clone(&runner), admins);

    // The daemon needs no identity; every other command acts as one.
    let actor_id = cli.actor.or_else(|| config.admin_ids.first().copied());
    let actor = move || -> Result<PrincipalId> {
        actor_id
            .map(PrincipalId)
            .ok_or_else(|| anyhow::anyhow!("no --actor given and no admin_ids configured"))
    };
    let now = chrono::Utc::now();

    match cli.command {
        Command::Run => {
            println!("👍 Likebot v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "   ⏰ Daily run at {:02}:{:02} (UTC{:+})",
                config.scheduler.run_hour,
                config.scheduler.run_minute,
                config.quota.utc_offset_hours
            );
            println!("   🗄️  Database: {}", config.database_path().display());
            println!("   🔑 Admins:   {}", config.admin_ids.len());

            let trigger = tokio::spawn(run_daily_trigger(
                runner,
                config.scheduler.clone(),
                config.quota.anchor(),
            ));
            tokio::signal::ctrl_c().await?;
            trigger.abort();
            tracing::info!("Likebot stopped");
        }
        Command::Like { target } => {
            let message = service.send_like(actor()?, &target, now).await?;
            println!("✅ Like sent to {target}: {message}");
        }
        Command::Schedule { target, runs, owner } => {
            let owner = owner.map(PrincipalId).map_or_else(|| actor(), Ok)?;
            service.schedule_auto(actor()?, owner, &target, runs, now)?;
            println!("✅ Auto task for {target}: {runs} run(s), owner {owner}");
        }
        Command::Extend { target, delta } => {
            let remaining = service.extend_auto(actor()?, &target, delta)?;
            println!("✅ Auto task for {target} extended to {remaining} run(s)");
        }
        Command::Remove { target } => {
            service.remove_auto(actor()?, &target)?;
            println!("✅ Auto task for {target} removed");
        }
        Command::Autos { owner } => {
            let owner = owner.map(PrincipalId).map_or_else(|| actor(), Ok)?;
            let tasks = service.my_autos(owner)?;
            if tasks.is_empty() {
                println!("No active auto tasks for {owner}.");
            }
            for task in tasks {
                println!(
                    "🎯 {} — {} run(s) left, created {}{}",
                    task.target,
                    task.runs_remaining,
                    task.created_at.format("%Y-%m-%d"),
                    task.last_error
                        .map(|e| format!(", last error: {e}"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Trigger => {
            let summary = service.trigger_run(actor()?, now).await?;
            println!(
                "📣 Run finished: {}/{} succeeded, {} failed",
                summary.succeeded, summary.attempted, summary.failed
            );
            for outcome in summary.outcomes {
                let mark = if outcome.success { "✅" } else { "❌" };
                println!("   {mark} {} — {}", outcome.target, outcome.message);
            }
        }
        Command::Grant { principal, class } => {
            service.set_capability(actor()?, PrincipalId(principal), parse_class(&class)?, true)?;
            println!("✅ Granted {class} to {principal}");
        }
        Command::Revoke { principal, class } => {
            service.set_capability(actor()?, PrincipalId(principal), parse_class(&class)?, false)?;
            println!("✅ Revoked {class} from {principal}");
        }
        Command::SetLimit { principal, class, limit } => {
            service.set_limit(actor()?, PrincipalId(principal), parse_class(&class)?, Some(limit))?;
            println!("✅ Set {class} limit for {principal} to {limit}");
        }
        Command::ClearLimit { principal, class } => {
            service.set_limit(actor()?, PrincipalId(principal), parse_class(&class)?, None)?;
            println!("✅ Cleared {class} limit for {principal} (back to default)");
        }
        Command::Limits => {
            for e in service.view_limits(actor()?)? {
                let class_view = |class: ActionClass| {
                    format!(
                        "{} (limit {})",
                        if e.allowed(class) { "✅" } else { "❌" },
                        e.limit_override(class)
                            .map(|l| l.to_string())
                            .unwrap_or_else(|| {
                                format!("{} default", config.quota.default_limit(class))
                            }),
                    )
                };
                println!(
                    "👤 {} — like: {}, auto: {}",
                    e.principal,
                    class_view(ActionClass::Like),
                    class_view(ActionClass::Auto)
                );
            }
        }
        Command::Status { principal } => {
            let principal = principal.map(PrincipalId).map_or_else(|| actor(), Ok)?;
            let status = service.quota_status(principal, now)?;
            println!(
                "📊 {principal} — likes {}/{}, autos {}/{}",
                status.like.used, status.like.limit, status.auto.used, status.auto.limit
            );
        }
        Command::Stats => {
            let stats = service.stats(actor()?)?;
            println!("📊 Likebot statistics:");
            println!("   Active auto tasks:     {}", stats.active_tasks);
            println!("   Known principals:      {}", stats.total_principals);
            println!("   Like grants:           {}", stats.like_granted);
            println!("   Auto grants:           {}", stats.auto_granted);
            println!("   Events (last 24h):     {}", stats.recent_events);
        }
    }

    Ok(())
}
