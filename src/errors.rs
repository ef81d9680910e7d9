//! Typed error hierarchy for prchecklist.
//!
//! Two top-level enums cover the two subsystems:
//! - `NotifyError`: notification event parsing and webhook delivery failures
//! - `ChecklistError`: checklist use-case failures (GitHub, config, store)

use thiserror::Error;

/// Errors from the notification subsystem.
///
/// `UnknownEventKind` comes from parsing a textual kind. Of the rest, only
/// `RuntimeUnavailable` is returned by `Dispatcher::dispatch`; the delivery
/// variants are produced inside the detached per-channel tasks, where they
/// are logged and dropped.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Unknown event kind '{0}'. Valid values: on_check, on_complete")]
    UnknownEventKind(String),

    #[error("No async runtime available to deliver notifications")]
    RuntimeUnavailable,

    #[error("Failed to encode payload for channel {channel}: {source}")]
    Serialization {
        channel: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deliver to channel {channel} ({url}): {source}")]
    Delivery {
        channel: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors from the checklist use cases.
#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("Checklist item #{number} not found in {checklist}")]
    ItemNotFound { checklist: String, number: u64 },

    #[error("Invalid checklist config: {0}")]
    Config(#[source] serde_yaml::Error),

    #[error("GitHub API error: {0}")]
    GitHub(#[source] anyhow::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}
