use serde::Deserialize;

use crate::types::StoreLocale;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Telegram bot token used for delivery
    pub telegram_bot_token: String,

    /// Cron expression for the recurring check (default: "0 18 * * *")
    pub check_schedule: String,

    /// IANA timezone the schedule is evaluated in (default: UTC)
    pub schedule_timezone: String,

    /// Storefront locale + country for catalog queries
    pub store_locale: StoreLocale,

    /// Upstream catalog request timeout in seconds (default: 30)
    pub fetch_timeout_secs: u64,

    /// Delay before the startup cycle in seconds (default: 5)
    pub startup_delay_secs: u64,

    /// Pause between promotion messages to one recipient (default: 500)
    pub message_delay_ms: u64,

    /// Pause between recipients (default: 1000)
    pub recipient_delay_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: or_default("DB_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN")
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!("TELEGRAM_BOT_TOKEN environment variable is required")
                })?,
            check_schedule: or_default("CHECK_SCHEDULE", "0 18 * * *"),
            schedule_timezone: or_default("SCHEDULE_TIMEZONE", "UTC"),
            store_locale: StoreLocale::new(
                or_default("STORE_LOCALE", "it-IT"),
                or_default("STORE_COUNTRY", "IT"),
            ),
            fetch_timeout_secs: or_default("FETCH_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_TIMEOUT_SECS must be a valid u64"))?,
            startup_delay_secs: or_default("STARTUP_DELAY_SECS", "5")
                .parse()
                .map_err(|_| anyhow::anyhow!("STARTUP_DELAY_SECS must be a valid u64"))?,
            message_delay_ms: or_default("MESSAGE_DELAY_MS", "500")
                .parse()
                .map_err(|_| anyhow::anyhow!("MESSAGE_DELAY_MS must be a valid u64"))?,
            recipient_delay_ms: or_default("RECIPIENT_DELAY_MS", "1000")
                .parse()
                .map_err(|_| anyhow::anyhow!("RECIPIENT_DELAY_MS must be a valid u64"))?,
        })
    }
}
