//! Telegram-style bot API notifier.
//!
//! Sends `GET {api_base}/bot{token}/sendMessage?chat_id=..&text=..` once
//! per recipient. Recipients on a device are identifiers that map to chat
//! ids through the configured recipient table.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use holewatch_core::{TransitionEvent, DEFAULT_API_BASE};

use crate::{Notifier, NotifyError};

/// Notifier backed by a chat-bot `sendMessage` endpoint.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_ids: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    /// Create a new builder for configuring the notifier.
    pub fn builder() -> TelegramNotifierBuilder {
        TelegramNotifierBuilder::default()
    }

    /// Chat ids for the given recipient identifiers, in order.
    ///
    /// Identifiers with no mapping are logged and skipped.
    pub fn resolve<'a>(&'a self, recipients: &'a [String]) -> Vec<(&'a str, &'a str)> {
        recipients
            .iter()
            .filter_map(|recipient| match self.chat_ids.get(recipient) {
                Some(chat_id) => Some((recipient.as_str(), chat_id.as_str())),
                None => {
                    warn!(%recipient, "no chat id for recipient, skipping");
                    None
                }
            })
            .collect()
    }

    /// Deliver `text` to one chat.
    pub async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .get(self.send_url())
            .query(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let description = response
            .json::<ApiReply>()
            .await
            .ok()
            .and_then(|reply| reply.description)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        })
    }

    /// Send to every recipient of `event`; returns how many deliveries
    /// succeeded.
    pub async fn deliver(&self, event: &TransitionEvent) -> usize {
        let text = event.text();
        info!(device = %event.device_name, "{text}");

        let mut delivered = 0;
        for (recipient, chat_id) in self.resolve(&event.recipients) {
            match self.send(chat_id, &text).await {
                Ok(()) => {
                    debug!(%recipient, device = %event.device_name, "notification sent");
                    delivered += 1;
                }
                Err(e) => {
                    warn!(%recipient, device = %event.device_name, error = %e, "notification failed");
                }
            }
        }
        delivered
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &TransitionEvent) {
        self.deliver(event).await;
    }
}

/// Builder for [`TelegramNotifier`].
#[derive(Debug, Default)]
pub struct TelegramNotifierBuilder {
    api_base: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    chat_ids: BTreeMap<String, String>,
}

impl TelegramNotifierBuilder {
    /// Bot API base URL (default: `https://api.telegram.org`).
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Per-request timeout (default: 5 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Map a recipient identifier to a chat id.
    pub fn recipient(mut self, name: impl Into<String>, chat_id: impl Into<String>) -> Self {
        self.chat_ids.insert(name.into(), chat_id.into());
        self
    }

    pub fn recipients(mut self, chat_ids: BTreeMap<String, String>) -> Self {
        self.chat_ids.extend(chat_ids);
        self
    }

    pub fn build(self) -> Result<TelegramNotifier, NotifyError> {
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(5)))
            .build()?;

        Ok(TelegramNotifier {
            client,
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: self.token.unwrap_or_default(),
            chat_ids: self.chat_ids,
        })
    }
}
