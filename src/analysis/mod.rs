//! Results analyzer - aggregation, screening, and recommendations
//!
//! Analysis is a pure function of an experiment definition plus its event
//! log; nothing here touches storage or mutates state, so results can be
//! recomputed on every call and never go stale. Sparse data degrades to
//! zero-valued summaries rather than errors.
//!
//! Per-user rates deduplicate with `FxHashSet`: analysis over large event
//! logs is hashing-bound and the keys are short strings.

mod strategy;

pub use strategy::{
    ArmReading, ConfidenceIntervalStrategy, EffectSizeThreshold, FixedMarginInterval,
    SignificanceStrategy,
};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::model::{Experiment, Metric, MetricKind, TrackedEvent, Variant};

/// Aggregated reading for one `(variant, metric)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSummary {
    /// Share of exposed users who converted at least once.
    Conversion {
        /// `converters / total_users`, 0.0 when nobody was exposed.
        value: f64,
        /// Distinct users with at least one conversion event.
        converters: usize,
        /// Distinct users with any event in the variant.
        total_users: usize,
    },
    /// Matching events per exposed user.
    ClickThrough {
        /// `clicks / total_users`, 0.0 when nobody was exposed.
        value: f64,
        /// Total matching events, repeats included.
        clicks: usize,
        /// Distinct users with any event in the variant.
        total_users: usize,
    },
    /// Mean event value for every other metric kind.
    Averaged {
        /// `total / count`, 0.0 when no events matched.
        value: f64,
        /// Number of matching events.
        count: usize,
        /// Sum of matching event values.
        total: f64,
    },
}

impl MetricSummary {
    /// The headline value, whatever the aggregation shape.
    #[must_use]
    pub const fn value(&self) -> f64 {
        match self {
            Self::Conversion { value, .. }
            | Self::ClickThrough { value, .. }
            | Self::Averaged { value, .. } => *value,
        }
    }
}

/// Derived statistics for one experiment at a point in time.
///
/// `variant_results` is keyed by variant ID, then metric ID. Significance
/// flags exist only for treatment arms; confidence intervals and sample
/// sizes cover every arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    experiment_id: String,
    variant_results: HashMap<String, HashMap<String, MetricSummary>>,
    statistical_significance: HashMap<String, bool>,
    confidence_intervals: HashMap<String, (f64, f64)>,
    sample_sizes: HashMap<String, usize>,
    recommendations: Vec<String>,
    generated_at: DateTime<Utc>,
}

impl ExperimentResults {
    /// Get the experiment ID these results describe.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get all per-variant, per-metric summaries.
    #[must_use]
    pub const fn variant_results(&self) -> &HashMap<String, HashMap<String, MetricSummary>> {
        &self.variant_results
    }

    /// Get one summary by variant and metric ID.
    #[must_use]
    pub fn metric(&self, variant_id: &str, metric_id: &str) -> Option<&MetricSummary> {
        self.variant_results.get(variant_id)?.get(metric_id)
    }

    /// Whether a treatment arm screened as significant on the primary
    /// metric. `None` for the control arm and unknown variants.
    #[must_use]
    pub fn significance(&self, variant_id: &str) -> Option<bool> {
        self.statistical_significance.get(variant_id).copied()
    }

    /// Get every treatment arm's significance flag.
    #[must_use]
    pub const fn statistical_significance(&self) -> &HashMap<String, bool> {
        &self.statistical_significance
    }

    /// Get a variant's `(lower, upper)` interval on the primary metric.
    #[must_use]
    pub fn confidence_interval(&self, variant_id: &str) -> Option<(f64, f64)> {
        self.confidence_intervals.get(variant_id).copied()
    }

    /// Get the number of distinct users observed in a variant.
    #[must_use]
    pub fn sample_size(&self, variant_id: &str) -> usize {
        self.sample_sizes.get(variant_id).copied().unwrap_or(0)
    }

    /// Get all per-variant sample sizes.
    #[must_use]
    pub const fn sample_sizes(&self) -> &HashMap<String, usize> {
        &self.sample_sizes
    }

    /// Get the human-readable recommendations, strongest conclusion first.
    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    /// When these results were computed.
    #[must_use]
    pub const fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

/// Computes [`ExperimentResults`] from an experiment and its events.
pub struct Analyzer {
    significance: Box<dyn SignificanceStrategy>,
    interval: Box<dyn ConfidenceIntervalStrategy>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Create an analyzer with the stock screening heuristics.
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategies(
            Box::new(EffectSizeThreshold),
            Box::new(FixedMarginInterval::default()),
        )
    }

    /// Create an analyzer with custom significance and interval strategies.
    #[must_use]
    pub fn with_strategies(
        significance: Box<dyn SignificanceStrategy>,
        interval: Box<dyn ConfidenceIntervalStrategy>,
    ) -> Self {
        Self {
            significance,
            interval,
        }
    }

    /// Aggregate `events` into per-variant results for `experiment`.
    ///
    /// Events referencing variants the experiment no longer declares are
    /// ignored; variants without events produce zero-valued summaries.
    #[must_use]
    pub fn analyze(&self, experiment: &Experiment, events: &[TrackedEvent]) -> ExperimentResults {
        let mut variant_results = HashMap::new();
        let mut sample_sizes = HashMap::new();

        for variant in experiment.variants() {
            let variant_events: Vec<&TrackedEvent> = events
                .iter()
                .filter(|e| e.variant_id() == variant.variant_id())
                .collect();
            let exposed: FxHashSet<&str> =
                variant_events.iter().map(|e| e.user_id()).collect();
            sample_sizes.insert(variant.variant_id().to_string(), exposed.len());

            let mut metrics = HashMap::new();
            for metric in experiment.metrics() {
                metrics.insert(
                    metric.metric_id().to_string(),
                    summarize_metric(metric, &variant_events, exposed.len()),
                );
            }
            variant_results.insert(variant.variant_id().to_string(), metrics);
        }

        let statistical_significance =
            self.significance_flags(experiment, &variant_results, &sample_sizes);
        let confidence_intervals = self.intervals(experiment, &variant_results, &sample_sizes);
        let recommendations = recommend(experiment, &variant_results);

        ExperimentResults {
            experiment_id: experiment.experiment_id().to_string(),
            variant_results,
            statistical_significance,
            confidence_intervals,
            sample_sizes,
            recommendations,
            generated_at: Utc::now(),
        }
    }

    fn significance_flags(
        &self,
        experiment: &Experiment,
        variant_results: &HashMap<String, HashMap<String, MetricSummary>>,
        sample_sizes: &HashMap<String, usize>,
    ) -> HashMap<String, bool> {
        let mut flags = HashMap::new();
        let (Some(primary), Some(control)) =
            (experiment.primary_metric(), experiment.control_variant())
        else {
            return flags;
        };

        let control_reading = reading_for(
            variant_results,
            sample_sizes,
            control.variant_id(),
            primary.metric_id(),
        );
        for variant in experiment.variants() {
            if variant.is_control() {
                continue;
            }
            let treatment_reading = reading_for(
                variant_results,
                sample_sizes,
                variant.variant_id(),
                primary.metric_id(),
            );
            flags.insert(
                variant.variant_id().to_string(),
                self.significance.is_significant(
                    control_reading,
                    treatment_reading,
                    experiment.minimum_effect_size(),
                ),
            );
        }
        flags
    }

    fn intervals(
        &self,
        experiment: &Experiment,
        variant_results: &HashMap<String, HashMap<String, MetricSummary>>,
        sample_sizes: &HashMap<String, usize>,
    ) -> HashMap<String, (f64, f64)> {
        let mut intervals = HashMap::new();
        let Some(primary) = experiment.primary_metric() else {
            return intervals;
        };

        for variant in experiment.variants() {
            let reading = reading_for(
                variant_results,
                sample_sizes,
                variant.variant_id(),
                primary.metric_id(),
            );
            intervals.insert(
                variant.variant_id().to_string(),
                self.interval
                    .interval(reading, experiment.confidence_level()),
            );
        }
        intervals
    }
}

#[allow(clippy::cast_precision_loss)]
fn summarize_metric(
    metric: &Metric,
    variant_events: &[&TrackedEvent],
    total_users: usize,
) -> MetricSummary {
    let matching: Vec<&&TrackedEvent> = variant_events
        .iter()
        .filter(|e| e.metric_id() == metric.metric_id())
        .collect();

    match metric.kind() {
        MetricKind::ConversionRate => {
            let converters = matching
                .iter()
                .map(|e| e.user_id())
                .collect::<FxHashSet<_>>()
                .len();
            let value = if total_users == 0 {
                0.0
            } else {
                converters as f64 / total_users as f64
            };
            MetricSummary::Conversion {
                value,
                converters,
                total_users,
            }
        }
        MetricKind::ClickThroughRate => {
            let clicks = matching.len();
            let value = if total_users == 0 {
                0.0
            } else {
                clicks as f64 / total_users as f64
            };
            MetricSummary::ClickThrough {
                value,
                clicks,
                total_users,
            }
        }
        _ => {
            let total: f64 = matching.iter().map(|e| e.event_value()).sum();
            let count = matching.len();
            let value = if count == 0 { 0.0 } else { total / count as f64 };
            MetricSummary::Averaged {
                value,
                count,
                total,
            }
        }
    }
}

fn reading_for(
    variant_results: &HashMap<String, HashMap<String, MetricSummary>>,
    sample_sizes: &HashMap<String, usize>,
    variant_id: &str,
    metric_id: &str,
) -> ArmReading {
    let value = variant_results
        .get(variant_id)
        .and_then(|metrics| metrics.get(metric_id))
        .map_or(0.0, MetricSummary::value);
    let sample_size = sample_sizes.get(variant_id).copied().unwrap_or(0);
    ArmReading { value, sample_size }
}

/// Rank treatments by primary-metric value and phrase the outcome. The
/// wording is fixed vocabulary that downstream dashboards match on.
fn recommend(
    experiment: &Experiment,
    variant_results: &HashMap<String, HashMap<String, MetricSummary>>,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    let (Some(primary), Some(control)) =
        (experiment.primary_metric(), experiment.control_variant())
    else {
        return recommendations;
    };

    let value_of = |variant: &Variant| {
        variant_results
            .get(variant.variant_id())
            .and_then(|metrics| metrics.get(primary.metric_id()))
            .map_or(0.0, MetricSummary::value)
    };

    let control_value = value_of(control);
    let mut best: Option<&Variant> = None;
    let mut best_value = control_value;
    for variant in experiment.variants() {
        if variant.is_control() {
            continue;
        }
        let value = value_of(variant);
        if value > best_value {
            best_value = value;
            best = Some(variant);
        }
    }

    if let Some(variant) = best {
        let improvement = if control_value > 0.0 {
            (best_value - control_value) / control_value * 100.0
        } else {
            0.0
        };
        recommendations.push(format!(
            "Variant '{}' shows {improvement:.1}% improvement over control",
            variant.name()
        ));
        if improvement > 10.0 {
            recommendations.push(format!(
                "Consider implementing variant '{}' for all users",
                variant.name()
            ));
        } else if improvement > 5.0 {
            recommendations.push(format!(
                "Variant '{}' shows promising results, consider extending test duration",
                variant.name()
            ));
        } else {
            recommendations.push(
                "No significant improvement detected, consider testing different approaches"
                    .to_string(),
            );
        }
    } else {
        recommendations.push(
            "Control variant is performing best, maintain current implementation".to_string(),
        );
    }
    recommendations
}
