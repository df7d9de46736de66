//! Telegram Bot API sink.

use super::Notifier;
use crate::config::TelegramConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const SEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Posts each alert as one `sendMessage` call. Without credentials every
/// send is a no-op.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    async fn post(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: "Markdown",
        };
        let response = self
            .http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .context("Failed to reach Telegram")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram returned HTTP {}: {}", status, detail);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn send(&self, text: &str) {
        if !self.config.is_configured() {
            debug!("Telegram not configured, message dropped");
            return;
        }
        if let Err(e) = self.post(text).await {
            warn!(error = %e, "Telegram delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier_for(server: &MockServer, token: &str) -> TelegramNotifier {
        TelegramNotifier::new(TelegramConfig {
            bot_token: token.to_string(),
            chat_id: "42".to_string(),
            api_base_url: server.uri(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_markdown_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        notifier_for(&server, "TOKEN").send("hello").await;
    }

    #[tokio::test]
    async fn test_missing_credentials_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        notifier_for(&server, "").send("hello").await;
    }

    #[tokio::test]
    async fn test_http_error_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
            .expect(2)
            .mount(&server)
            .await;

        let notifier = notifier_for(&server, "TOKEN");
        notifier.send("hello").await;
        assert!(notifier.post("hello").await.is_err());
    }
}
