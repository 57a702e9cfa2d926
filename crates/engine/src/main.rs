use std::sync::Arc;
use std::time::Duration;

use lootwatch_catalog::fetcher::{CatalogSource, EpicCatalogClient};
use lootwatch_common::config::AppConfig;
use lootwatch_common::db;
use lootwatch_engine::diagnostics;
use lootwatch_engine::ledger::{AnnouncementLedger, PgLedgerStore};
use lootwatch_engine::pipeline::NotificationPipeline;
use lootwatch_engine::scheduler::{self, Scheduler};
use lootwatch_engine::subscribers::{PgSubscriberDirectory, SubscriberDirectory};
use lootwatch_notifier::channel::TelegramChannel;
use lootwatch_notifier::dispatcher::{DispatchPacing, Dispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lootwatch=info,lootwatch_engine=info,lootwatch_catalog=info,lootwatch_notifier=info"
                    .into()
            }),
        )
        .json()
        .init();

    tracing::info!("Lootwatch starting...");

    // Load configuration; a bad schedule or timezone is fatal here
    let config = AppConfig::from_env()?;
    let schedule = scheduler::parse_schedule(&config.check_schedule)?;
    let timezone = scheduler::parse_timezone(&config.schedule_timezone)?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let catalog: Arc<dyn CatalogSource> = Arc::new(EpicCatalogClient::new(
        config.store_locale.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
    )?);
    let ledger = AnnouncementLedger::new(Arc::new(PgLedgerStore::new(pool.clone())));
    let directory: Arc<dyn SubscriberDirectory> = Arc::new(PgSubscriberDirectory::new(pool));
    let dispatcher = Dispatcher::new(
        Arc::new(TelegramChannel::new(config.telegram_bot_token.clone())),
        DispatchPacing::new(
            Duration::from_millis(config.message_delay_ms),
            Duration::from_millis(config.recipient_delay_ms),
        ),
    );

    match diagnostics::collect(directory.as_ref(), &ledger, catalog.as_ref()).await {
        Ok(report) => report.log(),
        Err(e) => tracing::warn!(error = %e, "Failed to collect startup diagnostics"),
    }

    let pipeline = Arc::new(NotificationPipeline::new(
        catalog, ledger, directory, dispatcher,
    ));
    let scheduler = Arc::new(Scheduler::new(
        pipeline,
        schedule,
        timezone,
        Duration::from_secs(config.startup_delay_secs),
    ));

    tracing::info!(
        schedule = %config.check_schedule,
        timezone = %config.schedule_timezone,
        locale = %config.store_locale,
        "Scheduler configured"
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = scheduler.run() => {
            tracing::warn!("Scheduler exited");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Lootwatch stopped.");
    Ok(())
}
