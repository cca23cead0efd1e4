//! Experiment - immutable definition of one A/B test

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Metric, MetricKind, Variant, VariantKind};
use crate::Result;

/// How far the variant allocation sum may drift from 1.0 before an
/// experiment is rejected.
pub const ALLOCATION_TOLERANCE: f64 = 0.001;

/// Lifecycle status of an experiment.
///
/// Only `Draft -> Active` is driven by this crate; the remaining states
/// exist so externally managed experiments deserialize cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Defined but not yet serving assignments.
    Draft,
    /// Serving assignments and accepting events.
    Active,
    /// Temporarily halted.
    Paused,
    /// Finished; results are final.
    Completed,
    /// Retired and hidden from default listings.
    Archived,
}

impl ExperimentStatus {
    /// Get the boundary string form (`"draft"`, `"active"`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

/// Definition of one A/B test: arms, metrics, audience, and analysis
/// parameters.
///
/// Experiments are validated on entry to the
/// [`Catalog`](crate::catalog::Catalog): at least two variants, exactly one
/// control, at least one metric, and allocations summing to 1.0 within
/// [`ALLOCATION_TOLERANCE`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    description: String,
    status: ExperimentStatus,
    variants: Vec<Variant>,
    metrics: Vec<Metric>,
    #[serde(default)]
    target_audience: Map<String, Value>,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
    end_date: DateTime<Utc>,
    created_by: String,
    created_at: DateTime<Utc>,
    sample_size: u32,
    confidence_level: f64,
    minimum_effect_size: f64,
}

impl Experiment {
    /// Create a builder for constructing an experiment.
    #[must_use]
    pub fn builder(experiment_id: impl Into<String>, name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(experiment_id, name)
    }

    /// Create a 50/50 control-vs-treatment experiment measuring conversion
    /// (primary) and click-through, with builder defaults everywhere else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) if the
    /// allocations fail to sum (cannot happen with the fixed 0.5/0.5 split,
    /// but the builder contract is preserved).
    pub fn split_test(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        control_config: Map<String, Value>,
        treatment_config: Map<String, Value>,
    ) -> Result<Self> {
        Self::builder(experiment_id, name)
            .variant(
                Variant::builder("control", "Control", VariantKind::Control, 0.5)
                    .configuration(control_config)
                    .build()?,
            )
            .variant(
                Variant::builder("treatment", "Treatment", VariantKind::Treatment, 0.5)
                    .configuration(treatment_config)
                    .build()?,
            )
            .metric(
                Metric::builder("conversion_rate", MetricKind::ConversionRate, "Conversion Rate")
                    .description("Share of exposed users who convert")
                    .primary()
                    .build(),
            )
            .metric(
                Metric::builder(
                    "click_through_rate",
                    MetricKind::ClickThroughRate,
                    "Click-Through Rate",
                )
                .description("Clicks per exposed user")
                .build(),
            )
            .build()
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
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

    /// Get the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the variants in declared order.
    ///
    /// Declared order is load-bearing: assignment walks this slice
    /// cumulatively, so reordering arms reshuffles the user split.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Get the metrics in declared order.
    #[must_use]
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Get the free-form audience targeting document.
    #[must_use]
    pub const fn target_audience(&self) -> &Map<String, Value> {
        &self.target_audience
    }

    /// Get the activation timestamp, if the experiment has been started.
    #[must_use]
    pub const fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Get the planned end date.
    #[must_use]
    pub const fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    /// Get the creating actor.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the target sample size per variant.
    #[must_use]
    pub const fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Get the configured confidence level (e.g. 0.95).
    #[must_use]
    pub const fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Get the minimum relative effect size considered significant.
    #[must_use]
    pub const fn minimum_effect_size(&self) -> f64 {
        self.minimum_effect_size
    }

    /// Look up a variant by ID.
    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.variant_id() == variant_id)
    }

    /// Get the control arm, if one exists.
    #[must_use]
    pub fn control_variant(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_control())
    }

    /// Get the primary metric: the first marked primary, else the first
    /// declared.
    #[must_use]
    pub fn primary_metric(&self) -> Option<&Metric> {
        self.metrics
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| self.metrics.first())
    }

    /// Transition to [`ExperimentStatus::Active`], stamping the start date.
    pub fn activate(&mut self) {
        self.status = ExperimentStatus::Active;
        self.start_date = Some(Utc::now());
    }

    /// Force the experiment back to an unstarted draft. Applied on catalog
    /// entry so stored state never claims activation that did not happen
    /// through the catalog.
    pub(crate) fn reset_to_draft(&mut self) {
        self.status = ExperimentStatus::Draft;
        self.start_date = None;
    }
}

/// Builder for [`Experiment`].
#[derive(Debug)]
pub struct ExperimentBuilder {
    experiment_id: String,
    name: String,
    description: String,
    status: ExperimentStatus,
    variants: Vec<Variant>,
    metrics: Vec<Metric>,
    target_audience: Map<String, Value>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    created_by: String,
    created_at: DateTime<Utc>,
    sample_size: u32,
    confidence_level: f64,
    minimum_effect_size: f64,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields and defaults: draft status,
    /// creator `"system"`, a 30-day window, sample size 1000, confidence
    /// level 0.95, minimum effect size 0.05.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            description: String::new(),
            status: ExperimentStatus::Draft,
            variants: Vec::new(),
            metrics: Vec::new(),
            target_audience: Map::new(),
            start_date: None,
            end_date: None,
            created_by: "system".to_string(),
            created_at: Utc::now(),
            sample_size: 1000,
            confidence_level: 0.95,
            minimum_effect_size: 0.05,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the lifecycle status (useful for reconstructing stored state).
    #[must_use]
    pub const fn status(mut self, status: ExperimentStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a variant.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Add a metric.
    #[must_use]
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Set the audience targeting document.
    #[must_use]
    pub fn target_audience(mut self, target_audience: Map<String, Value>) -> Self {
        self.target_audience = target_audience;
        self
    }

    /// Set the start date (useful for reconstructing stored state).
    #[must_use]
    pub const fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Set the planned end date. Defaults to 30 days after `created_at`.
    #[must_use]
    pub const fn end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Set the creating actor.
    #[must_use]
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Set the creation timestamp (useful for testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the target sample size per variant.
    #[must_use]
    pub const fn sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the confidence level.
    #[must_use]
    pub const fn confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    /// Set the minimum relative effect size considered significant.
    #[must_use]
    pub const fn minimum_effect_size(mut self, minimum_effect_size: f64) -> Self {
        self.minimum_effect_size = minimum_effect_size;
        self
    }

    /// Build the [`Experiment`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) if the variant
    /// traffic allocations do not sum to 1.0 within [`ALLOCATION_TOLERANCE`].
    /// Structural checks (variant count, control count, metric count) run
    /// when the experiment enters the catalog, so partially built experiments
    /// remain representable for tests and storage round-trips.
    pub fn build(self) -> Result<Experiment> {
        let total: f64 = self.variants.iter().map(Variant::traffic_allocation).sum();
        if !self.variants.is_empty() && (total - 1.0).abs() > ALLOCATION_TOLERANCE {
            return Err(crate::Error::Validation(format!(
                "variant traffic allocations must sum to 1.0, got {total}"
            )));
        }
        let end_date = self
            .end_date
            .unwrap_or_else(|| self.created_at + Duration::days(30));
        Ok(Experiment {
            experiment_id: self.experiment_id,
            name: self.name,
            description: self.description,
            status: self.status,
            variants: self.variants,
            metrics: self.metrics,
            target_audience: self.target_audience,
            start_date: self.start_date,
            end_date,
            created_by: self.created_by,
            created_at: self.created_at,
            sample_size: self.sample_size,
            confidence_level: self.confidence_level,
            minimum_effect_size: self.minimum_effect_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_arm_experiment() -> Experiment {
        Experiment::builder("exp-1", "Checkout Test")
            .variant(Variant::new("control", "Control", VariantKind::Control, 0.5).unwrap())
            .variant(Variant::new("treatment", "Treatment", VariantKind::Treatment, 0.5).unwrap())
            .metric(
                Metric::builder("conv", MetricKind::ConversionRate, "Conversion")
                    .primary()
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let experiment = two_arm_experiment();
        assert_eq!(experiment.status(), ExperimentStatus::Draft);
        assert_eq!(experiment.created_by(), "system");
        assert_eq!(experiment.sample_size(), 1000);
        assert!((experiment.confidence_level() - 0.95).abs() < f64::EPSILON);
        assert!((experiment.minimum_effect_size() - 0.05).abs() < f64::EPSILON);
        assert!(experiment.start_date().is_none());
        assert_eq!(
            experiment.end_date(),
            experiment.created_at() + Duration::days(30)
        );
    }

    #[test]
    fn test_builder_rejects_bad_allocation_sum() {
        let result = Experiment::builder("exp-bad", "Bad Split")
            .variant(Variant::new("a", "A", VariantKind::Control, 0.5).unwrap())
            .variant(Variant::new("b", "B", VariantKind::Treatment, 0.3).unwrap())
            .build();
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("sum to 1.0"), "unexpected: {message}");
    }

    #[test]
    fn test_builder_tolerates_rounding_drift() {
        let result = Experiment::builder("exp-drift", "Three Way")
            .variant(Variant::new("a", "A", VariantKind::Control, 0.333).unwrap())
            .variant(Variant::new("b", "B", VariantKind::Treatment, 0.333).unwrap())
            .variant(Variant::new("c", "C", VariantKind::Treatment, 0.334).unwrap())
            .metric(Metric::new("m", MetricKind::ConversionRate, "M"))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_activate_stamps_start_date() {
        let mut experiment = two_arm_experiment();
        experiment.activate();
        assert_eq!(experiment.status(), ExperimentStatus::Active);
        assert!(experiment.start_date().is_some());
    }

    #[test]
    fn test_primary_metric_falls_back_to_first() {
        let experiment = Experiment::builder("exp-2", "No Primary Flag")
            .variant(Variant::new("control", "Control", VariantKind::Control, 1.0).unwrap())
            .metric(Metric::new("first", MetricKind::ClickThroughRate, "First"))
            .metric(Metric::new("second", MetricKind::ConversionRate, "Second"))
            .build()
            .unwrap();
        assert_eq!(experiment.primary_metric().unwrap().metric_id(), "first");
    }

    #[test]
    fn test_split_test_shape() {
        let experiment =
            Experiment::split_test("exp-split", "Split", Map::new(), Map::new()).unwrap();
        assert_eq!(experiment.variants().len(), 2);
        assert!(experiment.control_variant().is_some());
        assert_eq!(
            experiment.primary_metric().unwrap().metric_id(),
            "conversion_rate"
        );
    }

    #[test]
    fn test_experiment_serde_round_trip() {
        let experiment = two_arm_experiment();
        let json = serde_json::to_string(&experiment).unwrap();
        assert!(json.contains("\"status\":\"draft\""));
        let parsed: Experiment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, experiment);
    }
}
