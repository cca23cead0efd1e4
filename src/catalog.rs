//! Experiment catalog - validated registry of experiment definitions
//!
//! The catalog is the only writer of experiment state. Definitions enter
//! through [`Catalog::create`] (which validates structure and resets the
//! lifecycle to draft) and change only through lifecycle transitions like
//! [`Catalog::start`]. Memory is the source of truth; the storage port is
//! written through after each accepted change.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::analytics::AnalyticsSink;
use crate::model::{Experiment, ExperimentStatus, Variant, ALLOCATION_TOLERANCE};
use crate::store::{StorageBackend, EXPERIMENTS};
use crate::{Error, Result};

/// Registry of experiment definitions backed by a storage port.
pub struct Catalog<S> {
    storage: Arc<S>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    experiments: DashMap<String, Experiment>,
}

impl<S: StorageBackend> Catalog<S> {
    /// Create an empty catalog over a storage port.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            analytics: None,
            experiments: DashMap::new(),
        }
    }

    /// Create a catalog that notifies `analytics` of catalog activity.
    #[must_use]
    pub fn with_analytics(storage: Arc<S>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            storage,
            analytics: Some(analytics),
            experiments: DashMap::new(),
        }
    }

    /// Replay persisted experiments into memory, returning how many loaded.
    /// Undecodable records are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Io`] if the storage port
    /// cannot be scanned.
    pub async fn load(&self) -> Result<usize> {
        let records = self.storage.scan_all(EXPERIMENTS).await?;
        let mut loaded = 0;
        for (key, bytes) in records {
            match serde_json::from_slice::<Experiment>(&bytes) {
                Ok(experiment) => {
                    self.experiments
                        .insert(experiment.experiment_id().to_string(), experiment);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping undecodable experiment record {key}: {e}"),
            }
        }
        if loaded > 0 {
            info!("Loaded {loaded} experiments from storage");
        }
        Ok(loaded)
    }

    /// Validate and register an experiment, returning its ID.
    ///
    /// The stored definition always enters as an unstarted draft, whatever
    /// status the caller handed in; activation must go through
    /// [`Catalog::start`]. Re-creating an existing ID replaces the stored
    /// definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the experiment has fewer than two
    /// variants, not exactly one control, allocations that do not sum to
    /// 1.0, or no metrics. Returns a storage error if the accepted
    /// experiment cannot be persisted (memory already holds it).
    pub async fn create(&self, mut experiment: Experiment) -> Result<String> {
        Self::validate(&experiment)?;
        experiment.reset_to_draft();

        let experiment_id = experiment.experiment_id().to_string();
        self.experiments
            .insert(experiment_id.clone(), experiment.clone());
        self.persist(&experiment).await?;

        if let Some(sink) = &self.analytics {
            sink.experiment_created(experiment.created_by(), &experiment_id, experiment.name());
        }
        info!("Experiment created: {} ({experiment_id})", experiment.name());
        Ok(experiment_id)
    }

    /// Transition a draft experiment to active, stamping its start date.
    ///
    /// Returns `Ok(false)` without side effects if the experiment is
    /// unknown or not in draft, so repeated calls are harmless.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the activated experiment cannot be
    /// persisted.
    pub async fn start(&self, experiment_id: &str) -> Result<bool> {
        let snapshot = {
            let Some(mut experiment) = self.experiments.get_mut(experiment_id) else {
                warn!("Cannot start unknown experiment: {experiment_id}");
                return Ok(false);
            };
            if experiment.status() != ExperimentStatus::Draft {
                warn!(
                    "Experiment {experiment_id} is {}, only draft experiments can start",
                    experiment.status().as_str()
                );
                return Ok(false);
            }
            experiment.activate();
            experiment.clone()
        };

        self.persist(&snapshot).await?;
        info!("Experiment started: {}", snapshot.name());
        Ok(true)
    }

    /// Get a copy of an experiment definition.
    #[must_use]
    pub fn get(&self, experiment_id: &str) -> Option<Experiment> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.value().clone())
    }

    /// List experiments, optionally filtered by status. Order is
    /// unspecified.
    #[must_use]
    pub fn list(&self, status: Option<ExperimentStatus>) -> Vec<Experiment> {
        self.experiments
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.value().status() == s))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered experiments.
    #[must_use]
    pub fn count(&self) -> usize {
        self.experiments.len()
    }

    fn validate(experiment: &Experiment) -> Result<()> {
        if experiment.variants().len() < 2 {
            return Err(Error::Validation(
                "must have at least 2 variants".to_string(),
            ));
        }
        let controls = experiment
            .variants()
            .iter()
            .filter(|v| v.is_control())
            .count();
        if controls != 1 {
            return Err(Error::Validation(format!(
                "must have exactly one control variant, got {controls}"
            )));
        }
        let total: f64 = experiment
            .variants()
            .iter()
            .map(Variant::traffic_allocation)
            .sum();
        if (total - 1.0).abs() > ALLOCATION_TOLERANCE {
            return Err(Error::Validation(format!(
                "variant traffic allocations must sum to 1.0, got {total}"
            )));
        }
        if experiment.metrics().is_empty() {
            return Err(Error::Validation(
                "must have at least one metric".to_string(),
            ));
        }
        Ok(())
    }

    async fn persist(&self, experiment: &Experiment) -> Result<()> {
        let bytes = serde_json::to_vec(experiment)?;
        if let Err(e) = self
            .storage
            .put(EXPERIMENTS, experiment.experiment_id(), bytes)
            .await
        {
            error!(
                "Failed to persist experiment {}: {e}",
                experiment.experiment_id()
            );
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metric, MetricKind, VariantKind};
    use crate::store::MemoryBackend;

    fn catalog() -> Catalog<MemoryBackend> {
        Catalog::new(Arc::new(MemoryBackend::new()))
    }

    fn valid_experiment(id: &str) -> Experiment {
        Experiment::builder(id, "Checkout Button")
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
    async fn test_create_and_get() {
        let catalog = catalog();
        let id = catalog.create(valid_experiment("exp-1")).await.unwrap();
        assert_eq!(id, "exp-1");

        let stored = catalog.get("exp-1").unwrap();
        assert_eq!(stored.status(), ExperimentStatus::Draft);
        assert!(stored.start_date().is_none());
    }

    #[tokio::test]
    async fn test_create_resets_caller_supplied_status() {
        let catalog = catalog();
        let mut experiment = valid_experiment("exp-sneaky");
        experiment.activate();
        catalog.create(experiment).await.unwrap();
        assert_eq!(
            catalog.get("exp-sneaky").unwrap().status(),
            ExperimentStatus::Draft
        );
    }

    #[tokio::test]
    async fn test_create_rejects_single_variant() {
        let experiment = Experiment::builder("exp-one", "One Arm")
            .variant(Variant::new("only", "Only", VariantKind::Control, 1.0).unwrap())
            .metric(Metric::new("m", MetricKind::ConversionRate, "M"))
            .build()
            .unwrap();
        let err = catalog().create(experiment).await.unwrap_err();
        assert!(err.to_string().contains("at least 2 variants"));
    }

    #[tokio::test]
    async fn test_create_rejects_two_controls() {
        let experiment = Experiment::builder("exp-two-controls", "Two Controls")
            .variant(Variant::new("a", "A", VariantKind::Control, 0.5).unwrap())
            .variant(Variant::new("b", "B", VariantKind::Control, 0.5).unwrap())
            .metric(Metric::new("m", MetricKind::ConversionRate, "M"))
            .build()
            .unwrap();
        let err = catalog().create(experiment).await.unwrap_err();
        assert!(err.to_string().contains("exactly one control"));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_metrics() {
        let experiment = Experiment::builder("exp-no-metrics", "No Metrics")
            .variant(Variant::new("a", "A", VariantKind::Control, 0.5).unwrap())
            .variant(Variant::new("b", "B", VariantKind::Treatment, 0.5).unwrap())
            .build()
            .unwrap();
        let err = catalog().create(experiment).await.unwrap_err();
        assert!(err.to_string().contains("at least one metric"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_allocation_sum_in_stored_form() {
        // Deserialized definitions skip the builder, so the catalog must
        // re-check the allocation sum itself.
        let json = serde_json::json!({
            "experiment_id": "exp-bad-sum",
            "name": "Bad Sum",
            "status": "draft",
            "variants": [
                {"variant_id": "a", "name": "A", "kind": "control", "traffic_allocation": 0.6},
                {"variant_id": "b", "name": "B", "kind": "treatment", "traffic_allocation": 0.6}
            ],
            "metrics": [
                {"metric_id": "m", "kind": "conversion_rate", "name": "M"}
            ],
            "end_date": "2025-12-31T00:00:00Z",
            "created_by": "system",
            "created_at": "2025-06-01T00:00:00Z",
            "sample_size": 1000,
            "confidence_level": 0.95,
            "minimum_effect_size": 0.05
        });
        let experiment: Experiment = serde_json::from_value(json).unwrap();
        let err = catalog().create(experiment).await.unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[tokio::test]
    async fn test_recreate_replaces_definition() {
        let catalog = catalog();
        catalog.create(valid_experiment("exp-dup")).await.unwrap();

        let replacement = Experiment::builder("exp-dup", "Replacement")
            .variant(Variant::new("control", "Control", VariantKind::Control, 0.5).unwrap())
            .variant(Variant::new("treatment", "Treatment", VariantKind::Treatment, 0.5).unwrap())
            .metric(Metric::new("m", MetricKind::ClickThroughRate, "M"))
            .build()
            .unwrap();
        catalog.create(replacement).await.unwrap();

        assert_eq!(catalog.count(), 1);
        assert_eq!(catalog.get("exp-dup").unwrap().name(), "Replacement");
    }

    #[tokio::test]
    async fn test_start_transitions_draft_once() {
        let catalog = catalog();
        catalog.create(valid_experiment("exp-start")).await.unwrap();

        assert!(catalog.start("exp-start").await.unwrap());
        let started = catalog.get("exp-start").unwrap();
        assert_eq!(started.status(), ExperimentStatus::Active);
        assert!(started.start_date().is_some());

        // Already active, so a second start is a no-op.
        assert!(!catalog.start("exp-start").await.unwrap());
        assert_eq!(
            catalog.get("exp-start").unwrap().start_date(),
            started.start_date()
        );
    }

    #[tokio::test]
    async fn test_start_unknown_experiment() {
        assert!(!catalog().start("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let catalog = catalog();
        catalog.create(valid_experiment("exp-a")).await.unwrap();
        catalog.create(valid_experiment("exp-b")).await.unwrap();
        catalog.start("exp-a").await.unwrap();

        assert_eq!(catalog.list(None).len(), 2);
        let active = catalog.list(Some(ExperimentStatus::Active));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].experiment_id(), "exp-a");
        assert_eq!(catalog.list(Some(ExperimentStatus::Draft)).len(), 1);
    }

    #[tokio::test]
    async fn test_load_round_trip() {
        let storage = Arc::new(MemoryBackend::new());
        {
            let catalog = Catalog::new(Arc::clone(&storage));
            catalog.create(valid_experiment("exp-p")).await.unwrap();
            catalog.start("exp-p").await.unwrap();
        }

        let reloaded = Catalog::new(storage);
        assert_eq!(reloaded.load().await.unwrap(), 1);
        let experiment = reloaded.get("exp-p").unwrap();
        assert_eq!(experiment.status(), ExperimentStatus::Active);
    }

    #[tokio::test]
    async fn test_analytics_sink_fires_on_create() {
        #[derive(Default)]
        struct RecordingSink {
            created: std::sync::Mutex<Vec<(String, String)>>,
        }
        impl AnalyticsSink for RecordingSink {
            fn experiment_created(&self, actor: &str, experiment_id: &str, _name: &str) {
                self.created
                    .lock()
                    .unwrap()
                    .push((actor.to_string(), experiment_id.to_string()));
            }
        }

        let sink = Arc::new(RecordingSink::default());
        let catalog = Catalog::with_analytics(
            Arc::new(MemoryBackend::new()),
            Arc::clone(&sink) as Arc<dyn AnalyticsSink>,
        );
        catalog.create(valid_experiment("exp-track")).await.unwrap();

        let created = sink.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0], ("system".to_string(), "exp-track".to_string()));
    }

    #[tokio::test]
    async fn test_analytics_sink_skipped_on_rejection() {
        #[derive(Default)]
        struct CountingSink {
            calls: std::sync::atomic::AtomicUsize,
        }
        impl AnalyticsSink for CountingSink {
            fn experiment_created(&self, _actor: &str, _experiment_id: &str, _name: &str) {
                self.calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let sink = Arc::new(CountingSink::default());
        let catalog = Catalog::with_analytics(
            Arc::new(MemoryBackend::new()),
            Arc::clone(&sink) as Arc<dyn AnalyticsSink>,
        );
        let invalid = Experiment::builder("exp-bad", "Bad")
            .variant(Variant::new("only", "Only", VariantKind::Control, 1.0).unwrap())
            .build()
            .unwrap();
        assert!(catalog.create(invalid).await.is_err());
        assert_eq!(sink.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
