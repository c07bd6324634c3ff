// src/notify/mod.rs

//! Outbound notification collaborators.
//!
//! Hosts typically want a human to hear about a child that died badly.
//! The supervisor itself never notifies anyone; it exposes status and
//! leaves policy to the host, which talks to a [`Notifier`].
//!
//! [`WebhookNotifier`] is the concrete implementation shipped here: a
//! JSON text message POSTed to a chat webhook.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

pub mod webhook;

pub use webhook::WebhookNotifier;

/// A collaborator that can deliver a short text message to a human.
///
/// Tests can provide their own implementation that records messages
/// instead of performing network I/O.
pub trait Notifier: Send + Sync {
    fn notify<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
