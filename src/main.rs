//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run a
//! demo scenario. No business logic here.
//!
//! The HTTP/socket transport and the auth layer are external collaborators;
//! this binary stands in for them by driving the dispatcher directly.

use dotenv::dotenv;
use fairshare::adapters::persistence::{MemoryRepo, SqliteRepo};
use fairshare::adapters::transport::EventDispatcher;
use fairshare::domain::{MemberId, Split};
use fairshare::ports::inbound::SessionContext;
use fairshare::ports::{ExpenseStore, GroupStore, MessageStore, UserDirectory};
use fairshare::shared::config::AppConfig;
use fairshare::usecases::{ChatRouter, GroupService, SettlementService};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Store handles plus the demo members seeded into the directory.
struct Wiring {
    groups: Arc<dyn GroupStore>,
    expenses: Arc<dyn ExpenseStore>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    demo_members: [MemberId; 3],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().unwrap_or_default();

    // --- Stores: SQLite when a data dir is configured, in-memory otherwise ---
    let wiring = match cfg.data_dir.as_deref() {
        Some(dir) => {
            let repo = Arc::new(
                SqliteRepo::connect(dir)
                    .await
                    .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
            );
            info!(path = %repo.db_path().display(), "using SQLite stores");
            let demo_members = seed_sqlite(&repo).await?;
            Wiring {
                groups: Arc::clone(&repo) as Arc<dyn GroupStore>,
                expenses: Arc::clone(&repo) as Arc<dyn ExpenseStore>,
                messages: Arc::clone(&repo) as Arc<dyn MessageStore>,
                users: Arc::clone(&repo) as Arc<dyn UserDirectory>,
                demo_members,
            }
        }
        None => {
            info!("FAIRSHARE_DATA_DIR not set, using in-memory stores");
            let repo = Arc::new(MemoryRepo::new());
            let ana = repo.seed_member("Ana", "ana@example.com").await;
            let bo = repo.seed_member("Bo", "bo@example.com").await;
            let cleo = repo.seed_member("Cleo", "cleo@example.com").await;
            Wiring {
                groups: Arc::clone(&repo) as Arc<dyn GroupStore>,
                expenses: Arc::clone(&repo) as Arc<dyn ExpenseStore>,
                messages: Arc::clone(&repo) as Arc<dyn MessageStore>,
                users: Arc::clone(&repo) as Arc<dyn UserDirectory>,
                demo_members: [ana, bo, cleo],
            }
        }
    };

    // --- Services ---
    let group_service = Arc::new(GroupService::new(
        Arc::clone(&wiring.groups),
        Arc::clone(&wiring.expenses),
        Arc::clone(&wiring.messages),
        Arc::clone(&wiring.users),
    ));
    let settlement_service = Arc::new(SettlementService::new(
        Arc::clone(&wiring.groups),
        Arc::clone(&wiring.expenses),
        Arc::clone(&wiring.users),
    ));
    let router = Arc::new(ChatRouter::new(Arc::clone(&wiring.messages)));
    let dispatcher = Arc::new(EventDispatcher::new(Arc::clone(&router)));

    if cfg.run_demo() {
        run_demo(
            &wiring,
            &group_service,
            &settlement_service,
            &router,
            &dispatcher,
        )
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    Ok(())
}

async fn seed_sqlite(repo: &SqliteRepo) -> anyhow::Result<[MemberId; 3]> {
    let ana = repo
        .seed_member("Ana", "ana@example.com")
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let bo = repo
        .seed_member("Bo", "bo@example.com")
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let cleo = repo
        .seed_member("Cleo", "cleo@example.com")
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok([ana, bo, cleo])
}

/// End-to-end walkthrough: group, expenses, settlement summary, then a chat
/// exchange through the event dispatcher.
async fn run_demo(
    wiring: &Wiring,
    groups: &GroupService,
    settlement: &SettlementService,
    router: &ChatRouter,
    dispatcher: &EventDispatcher,
) -> Result<(), fairshare::domain::DomainError> {
    let [ana, bo, _cleo] = wiring.demo_members;

    let group = groups.create_group(ana, "Weekend trip").await?;
    let group = groups.add_member(group.id, "bo@example.com").await?;
    let group = groups.add_member(group.id, "cleo@example.com").await?;
    info!(group_id = group.id, members = group.members.len(), "demo group ready");

    let everyone: Vec<Split> = group
        .members
        .iter()
        .map(|&m| Split { member_id: m, share: 0.0 })
        .collect();
    groups
        .add_expense(ana, group.id, "Cabin", 300.0, ana, everyone.clone(), None)
        .await?;
    groups
        .add_expense(bo, group.id, "Groceries", 90.0, bo, everyone, None)
        .await?;

    for line in settlement.summarize(group.id).await? {
        info!(
            from = %line.from_name,
            to = %line.to_name,
            amount = line.amount,
            "transfer"
        );
    }

    // Two sessions in the group channel; the sender hears its own message back.
    let (ana_session, mut ana_rx) = router.connect().await;
    let (bo_session, mut bo_rx) = router.connect().await;
    for (session, member) in [(ana_session, ana), (bo_session, bo)] {
        let ctx = SessionContext { session, member };
        dispatcher
            .dispatch(&ctx, "join_group", json!({ "group_id": group.id }))
            .await?;
    }
    let ctx = SessionContext { session: ana_session, member: ana };
    dispatcher
        .dispatch(
            &ctx,
            "send_message",
            json!({ "group_id": group.id, "content": "settled up, see transfers above" }),
        )
        .await?;
    for rx in [&mut ana_rx, &mut bo_rx] {
        if let Ok(msg) = rx.try_recv() {
            info!(sender = %msg.sender_name, content = %msg.content, "received");
        }
    }
    dispatcher.disconnect(ana_session).await;
    dispatcher.disconnect(bo_session).await;

    Ok(())
}
