// src/notify/webhook.rs

//! Chat webhook notifier.
//!
//! Sends a `{"msgtype":"text","text":{"content":...}}` payload to a
//! configured webhook URL. Any non-success HTTP status is an error
//! carrying the status and response body.

use std::future::Future;
use std::pin::Pin;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::Notifier;

#[derive(Serialize)]
struct TextContent {
    content: String,
}

#[derive(Serialize)]
struct TextMessage {
    msgtype: &'static str,
    text: TextContent,
}

pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }

    async fn send_text(&self, content: &str) -> Result<()> {
        let message = TextMessage {
            msgtype: "text",
            text: TextContent {
                content: content.to_string(),
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("sending webhook message")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("reading webhook response body")?;
        if !status.is_success() {
            bail!("webhook returned status {status}: {body}");
        }
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.send_text(message))
    }
}
