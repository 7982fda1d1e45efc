//! Operator notifications: a timestamped log file plus Telegram alerts

use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::common::errors::{ClientError, Result};
use crate::common::traits::Notifier;
use crate::config::types::NotificationConfig;

/// Format a line as it appears in the log file
pub fn format_line(at: DateTime<Local>, text: &str) -> String {
    format!("[{}] {}", at.format("%d/%m/%Y %H:%M:%S"), text)
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram Bot API `sendMessage` client
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    endpoint: String,
    chat_id: i64,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, chat_id: i64, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::HttpRequest)?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
            chat_id,
        })
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Notification {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }
}

/// File + Telegram notification sink
pub struct NotificationSink {
    log_file: PathBuf,
    telegram: Option<TelegramClient>,
    write_lock: Mutex<()>,
}

impl NotificationSink {
    pub fn new(log_file: impl Into<PathBuf>, telegram: Option<TelegramClient>) -> Self {
        Self {
            log_file: log_file.into(),
            telegram,
            write_lock: Mutex::new(()),
        }
    }

    /// Build from config; Telegram is enabled only when both token and chat are set
    pub fn from_config(config: &NotificationConfig, timeout: Duration) -> Result<Self> {
        let telegram = match (&config.telegram_bot_token, config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some(TelegramClient::new(
                &config.telegram_api_url,
                token,
                chat_id,
                timeout,
            )?),
            _ => {
                info!("Telegram alerts disabled");
                None
            }
        };
        Ok(Self::new(&config.log_file, telegram))
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    async fn write_line(&self, line: &str) {
        let _guard = self.write_lock.lock().await;
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.log_file)
                .await?;
            file.write_all(format!("{}\n", line).as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(path = %self.log_file.display(), "Failed to write log line: {}", e);
        }
    }
}

#[async_trait]
impl Notifier for NotificationSink {
    async fn log(&self, text: &str) {
        info!("{}", text);
        self.write_line(&format_line(Local::now(), text)).await;
    }

    async fn alert(&self, text: &str) {
        info!(alert = true, "{}", text);
        let line = format_line(Local::now(), text);
        self.write_line(&line).await;

        if let Some(telegram) = &self.telegram {
            match telegram.send(&line).await {
                Ok(()) => debug!("Alert delivered"),
                Err(e) => warn!("Alert delivery failed: {}", e),
            }
        }
    }
}
