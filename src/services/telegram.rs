use crate::config::TelegramConfig;
use crate::error::{ApiError, ApiResult};
use crate::utils::{clamp_message, normalize_text, TELEGRAM_MESSAGE_LIMIT};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Telegram出站发送器
///
/// 纯文本发送，不用parse_mode，超长消息裁剪后带截断标记。
pub struct TelegramSender {
    client: Client,
    config: TelegramConfig,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .unwrap();

        Self { client, config }
    }

    /// 发送纯文本消息
    pub async fn send_message(&self, chat_id: i64, text: &str) -> ApiResult<()> {
        let Some(token) = self.config.bot_token.as_deref() else {
            warn!("TELEGRAM_BOT_TOKEN not configured, dropping outbound message");
            return Ok(());
        };

        let text = clamp_message(&normalize_text(text), TELEGRAM_MESSAGE_LIMIT);
        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);

        self.client
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?
            .error_for_status()?;

        debug!("Delivered message to chat {}", chat_id);
        Ok(())
    }

    /// 向Telegram注册webhook地址
    pub async fn set_webhook(&self) -> ApiResult<Value> {
        let token = self
            .config
            .bot_token
            .as_deref()
            .ok_or_else(|| ApiError::Config("TELEGRAM_BOT_TOKEN is not set".to_string()))?;
        let base = self
            .config
            .public_base_url
            .as_deref()
            .ok_or_else(|| ApiError::Config("PUBLIC_BASE_URL is not set".to_string()))?;

        let webhook_url = format!("{}/telegram/webhook", base);
        let url = format!("https://api.telegram.org/bot{}/setWebhook", token);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "url": webhook_url }))
            .send()
            .await?;

        Ok(response.json().await?)
    }
}
