//! Webhook fan-out for notification events.
//!
//! [`Dispatcher::dispatch`] resolves the channels subscribed to an event,
//! renders the message once, and spawns one detached delivery task per
//! channel. It never waits for a delivery: failures are logged inside the
//! task and never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use super::event::{EventKind, NotificationEvent};
use crate::checklist::Checklist;
use crate::context::RequestContext;
use crate::errors::NotifyError;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on concurrent webhook requests across all dispatches.
    pub max_in_flight: usize,
    /// Per-request timeout for a webhook POST.
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 32,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Body sent to incoming-webhook endpoints, form-encoded as `payload=<json>`.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// One webhook POST for one channel.
struct WebhookDelivery {
    client: reqwest::Client,
    channel: String,
    url: String,
    kind: EventKind,
    text: Arc<str>,
}

impl WebhookDelivery {
    async fn send(self) {
        let (channel, url, kind) = (self.channel.clone(), self.url.clone(), self.kind);
        match self.post().await {
            Ok(()) => tracing::info!(%channel, %kind, "Notification delivered"),
            Err(e) => tracing::warn!(%channel, %url, %kind, error = %e, "Notification delivery failed"),
        }
    }

    async fn post(self) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&WebhookPayload { text: &self.text }).map_err(
            |source| NotifyError::Serialization {
                channel: self.channel.clone(),
                source,
            },
        )?;

        self.client
            .post(&self.url)
            .form(&[("payload", payload)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| NotifyError::Delivery {
                channel: self.channel,
                url: self.url,
                source,
            })?;

        Ok(())
    }
}

/// Fans notification events out to the webhook channels a checklist configures.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    in_flight: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(config: &DispatcherConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("prchecklist/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            client,
            in_flight: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        })
    }

    /// Deliver `event` to every channel `checklist` subscribes to its kind.
    ///
    /// Returns once the deliveries are spawned. A checklist without config is
    /// a no-op, and channel names with no matching channel entry are skipped.
    pub fn dispatch(
        &self,
        ctx: &RequestContext,
        checklist: &Checklist,
        event: NotificationEvent<'_>,
    ) -> Result<(), NotifyError> {
        let Some(config) = &checklist.config else {
            return Ok(());
        };
        let notification = &config.notification;

        let kind = event.kind();
        let names = notification.events.for_kind(kind);
        if names.is_empty() {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| NotifyError::RuntimeUnavailable)?;
        let text: Arc<str> = event.message_text(ctx).into();

        for name in names {
            let Some(channel) = notification.channels.get(name) else {
                tracing::debug!(channel = %name, %kind, "Skipping undefined notification channel");
                continue;
            };

            let delivery = WebhookDelivery {
                client: self.client.clone(),
                channel: name.clone(),
                url: channel.url.clone(),
                kind,
                text: Arc::clone(&text),
            };
            let in_flight = Arc::clone(&self.in_flight);

            runtime.spawn(async move {
                // Closed only if the semaphore is dropped, which never happens here.
                let Ok(_permit) = in_flight.acquire_owned().await else {
                    return;
                };
                delivery.send().await;
            });
        }

        Ok(())
    }
}
