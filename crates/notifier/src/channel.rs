//! Delivery channels: where rendered announcement text actually goes.

use async_trait::async_trait;
use serde::Deserialize;

use lootwatch_common::error::AppError;

/// A transport capable of delivering one text message to one address.
///
/// Every call is independent: a failure is returned to the caller and never
/// poisons later calls.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, address: &str, text: &str) -> Result<(), AppError>;

    /// Human-readable channel name for logs.
    fn name(&self) -> &'static str;
}

/// Telegram Bot API channel (`sendMessage` with Markdown formatting).
pub struct TelegramChannel {
    bot_token: String,
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            client: reqwest::Client::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }

    /// Override the Bot API host (e.g., a self-hosted Bot API server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, address: &str, text: &str) -> Result<(), AppError> {
        let body = serde_json::json!({
            "chat_id": address,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Delivery(format!("Invalid sendMessage response: {e}")))?;

        if !result.ok {
            return Err(AppError::Delivery(format!(
                "Telegram rejected message: {}",
                result.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
