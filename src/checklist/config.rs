//! Repository-hosted checklist configuration (`prchecklist.yml`).
//!
//! The file lives at the root of the main pull request's head revision:
//!
//! ```yaml
//! stages:
//!   - qa
//!   - production
//! notification:
//!   events:
//!     on_check: [ch1]
//!     on_complete: [ch1, ch2]
//!   channels:
//!     ch1:
//!       url: https://hooks.slack.com/services/...
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::ChecklistError;
use crate::notification::EventKind;

/// File name looked up at the head of the main pull request.
pub const CONFIG_FILE: &str = "prchecklist.yml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistConfig {
    #[serde(default)]
    pub stages: Vec<String>,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub events: EventChannels,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
}

/// Event kind → channel names, keyed by the textual kind as written in YAML.
///
/// Keys are kept as strings so an unknown kind survives parsing and can be
/// reported by [`ChecklistConfig::validate`] instead of rejecting the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventChannels(pub BTreeMap<String, Vec<String>>);

impl EventChannels {
    /// Channel names subscribed to `kind`; empty when none are configured.
    pub fn for_kind(&self, kind: EventKind) -> &[String] {
        self.0.get(kind.as_str()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, kind: EventKind, channels: Vec<String>) {
        self.0.insert(kind.as_str().to_string(), channels);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Incoming-webhook URL. Treated as a secret and never sent to browsers.
    #[serde(default, skip_serializing)]
    pub url: String,
}

impl ChecklistConfig {
    /// Parse a config from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ChecklistError> {
        // An empty file is a valid, empty config.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ChecklistError::Config)
    }

    /// Load a config from a file on disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Check the config for problems that would silently drop notifications.
    /// Returns a list of warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for stage in &self.stages {
            if stage.trim().is_empty() {
                warnings.push("Stage list contains an empty stage name".to_string());
            }
        }

        let notification = &self.notification;
        for (name, channel) in &notification.channels {
            if channel.url.is_empty() {
                warnings.push(format!("Channel '{}' has no url", name));
            } else if !channel.url.starts_with("http://") && !channel.url.starts_with("https://") {
                warnings.push(format!(
                    "Channel '{}' has a non-HTTP url '{}'",
                    name, channel.url
                ));
            }
        }

        for (kind, names) in &notification.events.0 {
            if let Err(e) = EventKind::from_str(kind) {
                warnings.push(e.to_string());
                continue;
            }
            for name in names {
                if !notification.channels.contains_key(name) {
                    warnings.push(format!(
                        "Event '{}' references undefined channel '{}'",
                        kind, name
                    ));
                }
            }
        }

        warnings
    }
}
