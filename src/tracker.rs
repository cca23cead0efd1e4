//! Event tracker - append-only log of attributed observations
//!
//! Every event is attributed to the variant the user held when it fired,
//! copied out of the assignment rather than recomputed, so events stay
//! correct even if the experiment definition changes later. The tracker
//! never drops events: experiments in any lifecycle state accept them, and
//! filtering happens at analysis time.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::model::{Assignment, TrackedEvent};
use crate::store::{StorageBackend, EVENTS};
use crate::Result;

/// Append-only store of tracked events, grouped by experiment.
pub struct Tracker<S> {
    storage: Arc<S>,
    events: DashMap<String, Vec<TrackedEvent>>,
}

impl<S: StorageBackend> Tracker<S> {
    /// Create an empty tracker over a storage port.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            events: DashMap::new(),
        }
    }

    /// Replay persisted events into memory, returning how many loaded.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the events collection cannot be scanned.
    pub async fn load(&self) -> Result<usize> {
        let records = self.storage.scan_all(EVENTS).await?;
        let mut loaded = 0;
        for (key, bytes) in records {
            match serde_json::from_slice::<TrackedEvent>(&bytes) {
                Ok(event) => {
                    self.events
                        .entry(event.experiment_id().to_string())
                        .or_default()
                        .push(event);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping undecodable event record {key}: {e}"),
            }
        }
        Ok(loaded)
    }

    /// Record an event against the variant held by `assignment`, returning
    /// the new event ID.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the event cannot be persisted (the
    /// in-memory log already holds it).
    pub async fn track(
        &self,
        assignment: &Assignment,
        metric_id: &str,
        event_type: &str,
        event_value: f64,
        metadata: Map<String, Value>,
    ) -> Result<String> {
        let event = TrackedEvent::builder(
            assignment.user_id(),
            assignment.experiment_id(),
            assignment.variant_id(),
            metric_id,
            event_type,
        )
        .event_value(event_value)
        .metadata(metadata)
        .build();

        let event_id = event.event_id().to_string();
        self.events
            .entry(assignment.experiment_id().to_string())
            .or_default()
            .push(event.clone());
        self.persist(&event).await?;

        debug!(
            "Event tracked: {event_type} for user {} in experiment {}",
            assignment.user_id(),
            assignment.experiment_id()
        );
        Ok(event_id)
    }

    /// Get all events recorded for an experiment, in arrival order.
    #[must_use]
    pub fn events_for(&self, experiment_id: &str) -> Vec<TrackedEvent> {
        self.events
            .get(experiment_id)
            .map_or_else(Vec::new, |e| e.value().clone())
    }

    /// Total number of events across all experiments.
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }

    async fn persist(&self, event: &TrackedEvent) -> Result<()> {
        let bytes = serde_json::to_vec(event)?;
        if let Err(e) = self.storage.put(EVENTS, event.event_id(), bytes).await {
            error!("Failed to persist event {}: {e}", event.event_id());
            return Err(e);
        }
        Ok(())
    }
}
