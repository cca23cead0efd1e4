//! Experiment engine facade
//!
//! [`ExperimentEngine`] wires the catalog, assigner, tracker, and analyzer
//! over one shared storage port and exposes the full experiment lifecycle:
//! define, start, assign, track, analyze. Build one through
//! [`ExperimentEngine::builder`] to customize the seams, or
//! [`ExperimentEngine::in_memory`] for a throwaway instance.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::analysis::{
    Analyzer, ConfidenceIntervalStrategy, EffectSizeThreshold, ExperimentResults,
    FixedMarginInterval, SignificanceStrategy,
};
use crate::analytics::AnalyticsSink;
use crate::assigner::Assigner;
use crate::audience::{AudienceQualifier, QualifyAll};
use crate::catalog::Catalog;
use crate::model::{Experiment, ExperimentStatus};
use crate::store::{MemoryBackend, StorageBackend};
use crate::tracker::Tracker;
use crate::Result;

/// What a user currently sees in one active experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserExperimentView {
    /// Experiment ID.
    pub experiment_id: String,
    /// Experiment display name.
    pub experiment_name: String,
    /// Assigned variant ID.
    pub variant_id: String,
    /// Assigned variant display name, `"Unknown"` when the definition no
    /// longer declares the assigned variant.
    pub variant_name: String,
    /// Configuration payload of the assigned variant.
    pub configuration: Map<String, Value>,
}

/// A/B experimentation engine over a pluggable storage port.
///
/// # Example
///
/// ```no_run
/// use ensayo::ExperimentEngine;
/// use ensayo::model::Experiment;
/// use serde_json::Map;
///
/// # async fn example() -> ensayo::Result<()> {
/// let engine = ExperimentEngine::in_memory().await?;
///
/// let experiment =
///     Experiment::split_test("checkout-cta", "Checkout CTA", Map::new(), Map::new())?;
/// engine.create_experiment(experiment).await?;
/// engine.start_experiment("checkout-cta").await?;
///
/// if let Some(variant) = engine.assign_user("alice", "checkout-cta", None).await? {
///     println!("alice sees {variant}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ExperimentEngine<S: StorageBackend> {
    catalog: Catalog<S>,
    assigner: Assigner<S>,
    tracker: Tracker<S>,
    analyzer: Analyzer,
}

impl ExperimentEngine<MemoryBackend> {
    /// Create an engine over a fresh volatile backend, for tests and
    /// examples.
    ///
    /// # Errors
    ///
    /// Propagates builder errors, though a fresh memory backend has nothing
    /// to replay and cannot fail.
    pub async fn in_memory() -> Result<Self> {
        Self::builder(MemoryBackend::new()).build().await
    }
}

impl<S: StorageBackend> ExperimentEngine<S> {
    /// Start building an engine over `storage`.
    #[must_use]
    pub fn builder(storage: S) -> ExperimentEngineBuilder<S> {
        ExperimentEngineBuilder::new(storage)
    }

    /// Validate and register an experiment, returning its ID. The stored
    /// definition always enters as a draft; see [`Catalog::create`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) for
    /// structurally invalid experiments and storage errors if persistence
    /// fails.
    pub async fn create_experiment(&self, experiment: Experiment) -> Result<String> {
        self.catalog.create(experiment).await
    }

    /// Activate a draft experiment so it can serve assignments. Returns
    /// `Ok(false)` if the experiment is unknown or not in draft.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the activation cannot be persisted.
    pub async fn start_experiment(&self, experiment_id: &str) -> Result<bool> {
        self.catalog.start(experiment_id).await
    }

    /// Get a copy of an experiment definition.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<Experiment> {
        self.catalog.get(experiment_id)
    }

    /// List experiments, optionally filtered by status.
    #[must_use]
    pub fn list_experiments(&self, status: Option<ExperimentStatus>) -> Vec<Experiment> {
        self.catalog.list(status)
    }

    /// Assign a user to a variant, returning the variant ID.
    ///
    /// Deterministic and sticky: the same user always lands in the same
    /// variant, and the first assignment is recorded for attribution.
    /// Returns `Ok(None)` if the experiment is unknown, not active, or the
    /// user fails audience qualification.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a fresh assignment cannot be persisted.
    pub async fn assign_user(
        &self,
        user_id: &str,
        experiment_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(experiment) = self.catalog.get(experiment_id) else {
            return Ok(None);
        };
        self.assigner.assign(&experiment, user_id, session_id).await
    }

    /// Record an event for a user's assigned variant, returning the new
    /// event ID, or `Ok(None)` if the user has no assignment in the
    /// experiment (unassigned events would poison the analysis).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the event cannot be persisted.
    pub async fn track_event(
        &self,
        user_id: &str,
        experiment_id: &str,
        metric_id: &str,
        event_type: &str,
        event_value: f64,
        metadata: Map<String, Value>,
    ) -> Result<Option<String>> {
        let Some(assignment) = self.assigner.assignment_for(user_id, experiment_id) else {
            warn!("No assignment found for user {user_id} in experiment {experiment_id}");
            return Ok(None);
        };
        let event_id = self
            .tracker
            .track(&assignment, metric_id, event_type, event_value, metadata)
            .await?;
        Ok(Some(event_id))
    }

    /// Compute up-to-date results for an experiment, `None` if the
    /// experiment is unknown.
    #[must_use]
    pub fn results(&self, experiment_id: &str) -> Option<ExperimentResults> {
        let experiment = self.catalog.get(experiment_id)?;
        let events = self.tracker.events_for(experiment_id);
        Some(self.analyzer.analyze(&experiment, &events))
    }

    /// List every active experiment the user holds an assignment in, with
    /// the variant configuration they should be served.
    #[must_use]
    pub fn active_experiments_for_user(&self, user_id: &str) -> Vec<UserExperimentView> {
        let mut views = Vec::new();
        for experiment in self.catalog.list(Some(ExperimentStatus::Active)) {
            let Some(assignment) = self
                .assigner
                .assignment_for(user_id, experiment.experiment_id())
            else {
                continue;
            };
            let (variant_name, configuration) = experiment
                .variant(assignment.variant_id())
                .map_or_else(
                    || ("Unknown".to_string(), Map::new()),
                    |v| (v.name().to_string(), v.configuration().clone()),
                );
            views.push(UserExperimentView {
                experiment_id: experiment.experiment_id().to_string(),
                experiment_name: experiment.name().to_string(),
                variant_id: assignment.variant_id().to_string(),
                variant_name,
                configuration,
            });
        }
        views
    }

    /// Get the experiment catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    /// Get the assignment component.
    #[must_use]
    pub const fn assigner(&self) -> &Assigner<S> {
        &self.assigner
    }

    /// Get the event tracker.
    #[must_use]
    pub const fn tracker(&self) -> &Tracker<S> {
        &self.tracker
    }

    /// Get the results analyzer.
    #[must_use]
    pub const fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }
}

/// Builder for [`ExperimentEngine`], with pluggable seams for audience
/// qualification, analytics notification, and analysis strategies.
pub struct ExperimentEngineBuilder<S> {
    storage: S,
    audience: Arc<dyn AudienceQualifier>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    significance: Box<dyn SignificanceStrategy>,
    interval: Box<dyn ConfidenceIntervalStrategy>,
}

impl<S: StorageBackend> ExperimentEngineBuilder<S> {
    fn new(storage: S) -> Self {
        Self {
            storage,
            audience: Arc::new(QualifyAll),
            analytics: None,
            significance: Box::new(EffectSizeThreshold),
            interval: Box::new(FixedMarginInterval::default()),
        }
    }

    /// Set the audience qualifier (defaults to accepting everyone).
    #[must_use]
    pub fn audience(mut self, qualifier: Arc<dyn AudienceQualifier>) -> Self {
        self.audience = qualifier;
        self
    }

    /// Set an analytics sink notified of catalog activity.
    #[must_use]
    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    /// Set the significance strategy (defaults to the effect-size screen).
    #[must_use]
    pub fn significance(mut self, strategy: Box<dyn SignificanceStrategy>) -> Self {
        self.significance = strategy;
        self
    }

    /// Set the confidence-interval strategy (defaults to the fixed margin).
    #[must_use]
    pub fn confidence_interval(mut self, strategy: Box<dyn ConfidenceIntervalStrategy>) -> Self {
        self.interval = strategy;
        self
    }

    /// Build the engine and replay persisted state into memory.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any collection cannot be scanned.
    pub async fn build(self) -> Result<ExperimentEngine<S>> {
        let storage = Arc::new(self.storage);
        let catalog = match self.analytics {
            Some(sink) => Catalog::with_analytics(Arc::clone(&storage), sink),
            None => Catalog::new(Arc::clone(&storage)),
        };
        let assigner = Assigner::with_qualifier(Arc::clone(&storage), self.audience);
        let tracker = Tracker::new(storage);
        let analyzer = Analyzer::with_strategies(self.significance, self.interval);

        let engine = ExperimentEngine {
            catalog,
            assigner,
            tracker,
            analyzer,
        };
        engine.catalog.load().await?;
        engine.assigner.load().await?;
        engine.tracker.load().await?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metric, MetricKind, Variant, VariantKind};

    fn two_arm(id: &str) -> Experiment {
        Experiment::builder(id, "Engine Test")
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

    #[tokio::test]
    async fn test_assign_requires_started_experiment() {
        let engine = ExperimentEngine::in_memory().await.unwrap();
        engine.create_experiment(two_arm("exp-e")).await.unwrap();

        assert!(engine
            .assign_user("alice", "exp-e", None)
            .await
            .unwrap()
            .is_none());

        assert!(engine.start_experiment("exp-e").await.unwrap());
        assert!(engine
            .assign_user("alice", "exp-e", None)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_assign_unknown_experiment_is_none() {
        let engine = ExperimentEngine::in_memory().await.unwrap();
        assert!(engine
            .assign_user("alice", "ghost", None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_track_without_assignment_is_none() {
        let engine = ExperimentEngine::in_memory().await.unwrap();
        engine.create_experiment(two_arm("exp-t")).await.unwrap();
        engine.start_experiment("exp-t").await.unwrap();

        let tracked = engine
            .track_event("stranger", "exp-t", "conv", "purchase", 1.0, Map::new())
            .await
            .unwrap();
        assert!(tracked.is_none());
        assert_eq!(engine.tracker().count(), 0);
    }

    #[tokio::test]
    async fn test_results_unknown_experiment_is_none() {
        let engine = ExperimentEngine::in_memory().await.unwrap();
        assert!(engine.results("ghost").is_none());
    }

    #[tokio::test]
    async fn test_active_experiments_view() {
        let engine = ExperimentEngine::in_memory().await.unwrap();
        engine.create_experiment(two_arm("exp-v")).await.unwrap();
        engine.start_experiment("exp-v").await.unwrap();

        // No assignment yet, so nothing to report.
        assert!(engine.active_experiments_for_user("alice").is_empty());

        let variant = engine
            .assign_user("alice", "exp-v", None)
            .await
            .unwrap()
            .unwrap();
        let views = engine.active_experiments_for_user("alice");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].experiment_id, "exp-v");
        assert_eq!(views[0].variant_id, variant);
        assert_ne!(views[0].variant_name, "Unknown");
    }

    #[tokio::test]
    async fn test_full_cycle_produces_results() {
        let engine = ExperimentEngine::in_memory().await.unwrap();
        engine.create_experiment(two_arm("exp-c")).await.unwrap();
        engine.start_experiment("exp-c").await.unwrap();

        engine
            .assign_user("alice", "exp-c", None)
            .await
            .unwrap()
            .unwrap();
        engine
            .track_event("alice", "exp-c", "conv", "purchase", 1.0, Map::new())
            .await
            .unwrap()
            .unwrap();

        let results = engine.results("exp-c").unwrap();
        assert_eq!(results.experiment_id(), "exp-c");
        let total: usize = results.sample_sizes().values().sum();
        assert_eq!(total, 1);
    }
}
