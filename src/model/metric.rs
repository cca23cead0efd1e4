//! Metric - a measured outcome of an experiment

use serde::{Deserialize, Serialize};

/// What a metric measures and how its events aggregate.
///
/// `ConversionRate` and `ClickThroughRate` normalize by exposed users;
/// every other kind averages raw event values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Share of exposed users who converted at least once.
    ConversionRate,
    /// Matching events per exposed user.
    ClickThroughRate,
    /// Share of exposed users who purchased (averaged aggregation).
    PurchaseRate,
    /// Time spent engaged, in arbitrary units (averaged aggregation).
    EngagementTime,
    /// Completed downloads (averaged aggregation).
    DownloadCount,
}

impl MetricKind {
    /// Get the boundary string form (`"conversion_rate"`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConversionRate => "conversion_rate",
            Self::ClickThroughRate => "click_through_rate",
            Self::PurchaseRate => "purchase_rate",
            Self::EngagementTime => "engagement_time",
            Self::DownloadCount => "download_count",
        }
    }
}

/// A measured outcome tracked for an experiment.
///
/// Events reference metrics by `metric_id`; the analyzer picks the
/// aggregation from [`MetricKind`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    metric_id: String,
    kind: MetricKind,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    target_value: Option<f64>,
    #[serde(default)]
    is_primary: bool,
}

impl Metric {
    /// Create a new secondary metric with no target value.
    #[must_use]
    pub fn new(metric_id: impl Into<String>, kind: MetricKind, name: impl Into<String>) -> Self {
        MetricBuilder::new(metric_id, kind, name).build()
    }

    /// Create a builder for constructing a metric with optional fields.
    #[must_use]
    pub fn builder(
        metric_id: impl Into<String>,
        kind: MetricKind,
        name: impl Into<String>,
    ) -> MetricBuilder {
        MetricBuilder::new(metric_id, kind, name)
    }

    /// Get the metric ID.
    #[must_use]
    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    /// Get the metric kind.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Get the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the target value, if one was set.
    #[must_use]
    pub const fn target_value(&self) -> Option<f64> {
        self.target_value
    }

    /// Whether this metric drives significance and recommendations.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.is_primary
    }
}

/// Builder for [`Metric`].
#[derive(Debug)]
pub struct MetricBuilder {
    metric_id: String,
    kind: MetricKind,
    name: String,
    description: String,
    target_value: Option<f64>,
    is_primary: bool,
}

impl MetricBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(metric_id: impl Into<String>, kind: MetricKind, name: impl Into<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            kind,
            name: name.into(),
            description: String::new(),
            target_value: None,
            is_primary: false,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the target value the experiment hopes to reach.
    #[must_use]
    pub const fn target_value(mut self, target_value: f64) -> Self {
        self.target_value = Some(target_value);
        self
    }

    /// Mark this metric as the experiment's primary metric.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Build the [`Metric`].
    #[must_use]
    pub fn build(self) -> Metric {
        Metric {
            metric_id: self.metric_id,
            kind: self.kind,
            name: self.name,
            description: self.description,
            target_value: self.target_value,
            is_primary: self.is_primary,
        }
    }
}
