//! Tracked event - one observation attributed to a variant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn default_event_value() -> f64 {
    1.0
}

/// One observed user action inside an experiment, attributed to the variant
/// the user was assigned at tracking time.
///
/// `event_value` carries the magnitude for averaged metrics (engagement
/// seconds, download counts); rate metrics only care that the event exists,
/// so the default of 1.0 fits them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedEvent {
    event_id: String,
    user_id: String,
    experiment_id: String,
    variant_id: String,
    metric_id: String,
    event_type: String,
    #[serde(default = "default_event_value")]
    event_value: f64,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl TrackedEvent {
    /// Create a new event with value 1.0, empty metadata, a fresh UUID, and
    /// the current time.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
        metric_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        TrackedEventBuilder::new(user_id, experiment_id, variant_id, metric_id, event_type).build()
    }

    /// Create a builder for constructing an event with optional fields.
    #[must_use]
    pub fn builder(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
        metric_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> TrackedEventBuilder {
        TrackedEventBuilder::new(user_id, experiment_id, variant_id, metric_id, event_type)
    }

    /// Get the event ID.
    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Get the user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the variant the user was assigned when the event fired.
    #[must_use]
    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    /// Get the metric this event feeds.
    #[must_use]
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Get the free-form event type label (`"click"`, `"purchase"`, ...).
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Get the event magnitude.
    #[must_use]
    pub const fn event_value(&self) -> f64 {
        self.event_value
    }

    /// Get the observation timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get the attached metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

/// Builder for [`TrackedEvent`].
#[derive(Debug)]
pub struct TrackedEventBuilder {
    user_id: String,
    experiment_id: String,
    variant_id: String,
    metric_id: String,
    event_type: String,
    event_value: f64,
    timestamp: DateTime<Utc>,
    metadata: Map<String, Value>,
}

impl TrackedEventBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
        metric_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            experiment_id: experiment_id.into(),
            variant_id: variant_id.into(),
            metric_id: metric_id.into(),
            event_type: event_type.into(),
            event_value: 1.0,
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Set the event magnitude (defaults to 1.0).
    #[must_use]
    pub const fn event_value(mut self, event_value: f64) -> Self {
        self.event_value = event_value;
        self
    }

    /// Set the observation timestamp (useful for testing).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the [`TrackedEvent`], minting a fresh event ID.
    #[must_use]
    pub fn build(self) -> TrackedEvent {
        TrackedEvent {
            event_id: Uuid::new_v4().to_string(),
            user_id: self.user_id,
            experiment_id: self.experiment_id,
            variant_id: self.variant_id,
            metric_id: self.metric_id,
            event_type: self.event_type,
            event_value: self.event_value,
            timestamp: self.timestamp,
            metadata: self.metadata,
        }
    }
}
