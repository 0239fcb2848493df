//! triage: operator view of the triage worklist.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use triage_engine::clock::{Clock, SystemClock};
use triage_engine::config::Config;
use triage_engine::countdown::Countdown;
use triage_engine::lock::{AcquireOutcome, LockManager, SessionOutcome, spawn_sweeper};
use triage_engine::model::{HolderId, ItemKind, LifecycleStatus, UrgencyClass, WorkItemId};
use triage_engine::sla::SlaClock;
use triage_engine::source::{ItemSource, JsonFileSource};
use triage_engine::telemetry::{TelemetryConfig, init_telemetry};
use triage_engine::worklist::{WorklistAssembler, WorklistFilter, WorklistSummary};

#[derive(Parser)]
#[command(name = "triage", about = "Clinical document triage worklist")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the ordered active worklist
    Worklist {
        /// JSON file with an array of work items
        #[arg(long)]
        items: PathBuf,
        /// Only this kind (document | referral)
        #[arg(long)]
        kind: Option<ItemKind>,
        /// Only this urgency class (stat | urgent | routine)
        #[arg(long)]
        urgency: Option<UrgencyClass>,
        /// Only this lifecycle status
        #[arg(long)]
        status: Option<LifecycleStatus>,
        /// Free-text match on name, sender and description
        #[arg(long)]
        search: Option<String>,
        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Mark a document as locked: DOCUMENT_ID=HOLDER (repeatable)
        #[arg(long = "lock", value_name = "DOCUMENT_ID=HOLDER")]
        locks: Vec<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Evaluate one SLA window
    Sla {
        /// Receipt time (RFC 3339)
        #[arg(long)]
        received: DateTime<Utc>,
        /// Deadline (RFC 3339)
        #[arg(long)]
        deadline: DateTime<Utc>,
        /// Evaluate as of this instant instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Follow one item's SLA countdown until Ctrl-C
    Watch {
        /// JSON file with an array of work items
        #[arg(long)]
        items: PathBuf,
        /// Work item ID
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Worklist {
            items,
            kind,
            urgency,
            status,
            search,
            at,
            locks,
            json,
        } => {
            let filter = WorklistFilter {
                kind,
                urgency,
                status,
                search: None,
            };
            let filter = match search {
                Some(q) => filter.search(q),
                None => filter,
            };
            cmd_worklist(&config, items, filter, at, locks, json)
        }
        Command::Sla {
            received,
            deadline,
            at,
        } => cmd_sla(&config, received, deadline, at),
        Command::Watch { items, id } => cmd_watch(&config, items, id).await,
    }
}

fn cmd_worklist(
    config: &Config,
    items: PathBuf,
    filter: WorklistFilter,
    at: Option<DateTime<Utc>>,
    locks: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let policy = config.load_policy()?;
    let assembler = WorklistAssembler::from_policy(policy);
    let items = JsonFileSource::new(&items).fetch()?;
    let now = at.unwrap_or_else(Utc::now);

    let manager = LockManager::new(Arc::new(SystemClock), config.lock_lease);
    for arg in &locks {
        let (doc, holder) = arg
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --lock {arg:?}, expected DOCUMENT_ID=HOLDER"))?;
        let doc = WorkItemId::new(doc)?;
        let holder = HolderId::new(holder)?;
        if let AcquireOutcome::DeniedHeldByOther(current) = manager.acquire_default(&doc, &holder)? {
            anyhow::bail!("{doc} is already locked by {current}");
        }
    }
    let snapshot = manager.snapshot();

    let rows = assembler.assemble(&items, &snapshot, &filter, now);
    let summary = WorklistSummary::from_items(&rows);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "items": rows,
                "summary": summary,
            }))?
        );
        return Ok(());
    }

    if rows.is_empty() {
        println!("No active work items.");
        return Ok(());
    }

    println!(
        "{:<12}  {:<9}  {:<8}  {:<14}  {:<15}  {:<9}  {:>6}  {:<28}  LOCKED BY",
        "ID", "KIND", "URGENCY", "STATUS", "SLA", "BUCKET", "SCORE", "TITLE"
    );
    println!("{}", "-".repeat(130));

    for row in &rows {
        let kind = match row.item.kind() {
            ItemKind::UnclassifiedDocument => "document",
            ItemKind::Referral => "referral",
        };
        let title = row.item.details.title();
        let title = if title.chars().count() > 28 {
            format!("{}…", title.chars().take(27).collect::<String>())
        } else {
            title.to_string()
        };
        println!(
            "{:<12}  {:<9}  {:<8}  {:<14}  {:<15}  {:<9}  {:>6.1}  {:<28}  {}",
            row.item.id.as_str(),
            kind,
            row.item.urgency,
            row.item.status,
            row.sla.remaining_label,
            row.sla.bucket,
            row.score,
            title,
            row.locked_by
                .as_ref()
                .map(|h| h.as_str())
                .unwrap_or("-"),
        );
    }

    println!(
        "\n{} item(s): {} breached, {} red, {} yellow, {} green, {} locked",
        summary.total, summary.breached, summary.red, summary.yellow, summary.green, summary.locked
    );
    Ok(())
}

fn cmd_sla(
    config: &Config,
    received: DateTime<Utc>,
    deadline: DateTime<Utc>,
    at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let policy = config.load_policy()?;
    let clock = SlaClock::from_policy(&policy);
    let status = clock.evaluate(deadline, received, at.unwrap_or_else(Utc::now))?;

    println!("Remaining:  {}", status.remaining_label);
    println!("Bucket:     {}", status.bucket);
    println!("Breached:   {}", status.is_breached);
    println!("Fraction:   {:.4}", status.fraction_remaining);
    println!("Refresh:    {:?}", clock.refresh_interval(status.bucket));
    Ok(())
}

async fn cmd_watch(config: &Config, items: PathBuf, id: String) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "triage".to_string(),
        default_level: config.log_level.clone(),
    })?;

    let policy = config.load_policy()?;
    let id = WorkItemId::new(id)?;
    let item = JsonFileSource::new(&items)
        .fetch()?
        .into_iter()
        .find(|item| item.id == id)
        .ok_or_else(|| anyhow::anyhow!("no work item with id {id}"))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = Arc::new(LockManager::new(Arc::clone(&clock), config.lock_lease));
    let shutdown = Arc::new(Notify::new());
    let sweeper = spawn_sweeper(
        Arc::clone(&manager),
        config.sweep_interval,
        Arc::clone(&shutdown),
    );

    let holder = HolderId::session();
    let mut session = match manager.open_session(&id, &holder, config.lock_lease)? {
        SessionOutcome::Opened(session) => Some(session),
        SessionOutcome::Locked { held_by } => {
            tracing::warn!(document_id = %id, %held_by, "item is locked, watching read-only");
            None
        }
        SessionOutcome::Unavailable => None,
    };
    tracing::info!(document_id = %id, holder = %holder, "watching item");

    let countdown = Countdown::start(item.window, SlaClock::from_policy(&policy), clock);
    let mut status = countdown.subscribe();
    let first = countdown.current();
    println!("{}  {}", first.remaining_label, first.bucket);

    let mut heartbeat = tokio::time::interval(config.lock_lease / 3);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = heartbeat.tick() => {
                let lost = match session.as_mut() {
                    Some(s) => !s.renew()?.is_granted(),
                    None => false,
                };
                if lost {
                    session = None;
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let s = status.borrow_and_update().clone();
                println!("{}  {}", s.remaining_label, s.bucket);
            }
        }
    }

    drop(session);
    countdown.stop().await;
    shutdown.notify_one();
    let _ = sweeper.await;
    Ok(())
}
