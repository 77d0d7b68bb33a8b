//! Notification rule: monitoring channels, Pub/Sub topic and default recipients.

use serde::{Deserialize, Serialize};

use crate::error::{BudgetError, Result};

/// Maximum monitoring channels the API accepts per budget.
pub const MAX_CHANNELS: usize = 5;

const SCHEMA_VERSION: &str = "1.0";

/// Up to [`MAX_CHANNELS`] monitoring notification channel ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NotificationChannels(Vec<String>);

impl NotificationChannels {
    /// Validate a channel list. Blank entries are dropped; more than five is an error.
    pub fn new<I, S>(channels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: Vec<String> = channels
            .into_iter()
            .map(|c| {
                let c: String = c.into();
                c.trim().to_string()
            })
            .filter(|c| !c.is_empty())
            .collect();
        if channels.len() > MAX_CHANNELS {
            return Err(BudgetError::invalid_argument(format!(
                "{} notification channels given, at most {} are allowed",
                channels.len(),
                MAX_CHANNELS
            )));
        }
        Ok(Self(channels))
    }

    pub fn single(channel: impl Into<String>) -> Self {
        Self(vec![channel.into()])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for NotificationChannels {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        let channels = match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(channel) => vec![channel],
            OneOrMany::Many(channels) => channels,
        };
        Self::new(channels).map_err(serde::de::Error::custom)
    }
}

/// Options controlling the non-channel parts of a notification rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    pub pubsub_topic: Option<String>,
    pub disable_default: bool,
}

/// The `allUpdatesRule` of a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    pub schema_version: String,
    pub disable_default_iam_recipients: bool,
    #[serde(skip_serializing_if = "NotificationChannels::is_empty")]
    pub monitoring_notification_channels: NotificationChannels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubsub_topic: Option<String>,
}

impl NotificationRule {
    /// Returns `None` when there is nothing to notify and default recipients stay on.
    pub fn build(channels: NotificationChannels, options: NotificationOptions) -> Option<Self> {
        let pubsub_topic = options.pubsub_topic.filter(|t| !t.trim().is_empty());
        if channels.is_empty() && pubsub_topic.is_none() && !options.disable_default {
            return None;
        }
        Some(Self {
            schema_version: SCHEMA_VERSION.to_string(),
            disable_default_iam_recipients: options.disable_default,
            monitoring_notification_channels: channels,
            pubsub_topic,
        })
    }
}
