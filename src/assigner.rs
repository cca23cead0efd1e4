//! Deterministic user-to-variant assignment
//!
//! Bucketing is a pure function of `(user_id, experiment_id)`: the first
//! four bytes of an MD5 digest map the pair onto the unit interval, and a
//! cumulative walk over the declared variants picks the arm. Two processes
//! sharing nothing therefore agree on every assignment, and the sticky
//! index exists for attribution, not correctness. MD5 is used as a mixer
//! here, not for security.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use md5::{Digest, Md5};
use tracing::{debug, error, warn};

use crate::audience::{AudienceQualifier, QualifyAll};
use crate::model::{assignment_key, Assignment, Experiment, ExperimentStatus, Variant};
use crate::store::{StorageBackend, ASSIGNMENTS};
use crate::Result;

const BUCKET_SPACE: f64 = 4_294_967_296.0; // 2^32

/// Map a `(user, experiment)` pair onto `[0.0, 1.0)`.
///
/// Takes the first four bytes of `md5("user_id:experiment_id")` as a
/// big-endian integer over 2^32. This is byte-for-byte the bucketing used
/// by existing deployments, so assignments agree across languages and
/// process restarts.
#[must_use]
pub fn unit_interval(user_id: &str, experiment_id: &str) -> f64 {
    let mut hasher = Md5::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(experiment_id.as_bytes());
    let digest = hasher.finalize();
    let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    f64::from(bucket) / BUCKET_SPACE
}

/// Walk the variants in declared order and pick the first whose cumulative
/// allocation covers `value`. Falls back to the control arm when rounding
/// drift leaves the walk short; `None` only if the experiment has no
/// control at all.
#[must_use]
pub fn choose_variant(experiment: &Experiment, value: f64) -> Option<&Variant> {
    let mut cumulative = 0.0;
    for variant in experiment.variants() {
        cumulative += variant.traffic_allocation();
        if value <= cumulative {
            return Some(variant);
        }
    }
    experiment.control_variant()
}

/// Hands out sticky variant assignments for active experiments.
pub struct Assigner<S> {
    storage: Arc<S>,
    qualifier: Arc<dyn AudienceQualifier>,
    assignments: DashMap<String, Assignment>,
}

impl<S: StorageBackend> Assigner<S> {
    /// Create an assigner that considers every user eligible.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_qualifier(storage, Arc::new(QualifyAll))
    }

    /// Create an assigner with a custom audience qualifier.
    #[must_use]
    pub fn with_qualifier(storage: Arc<S>, qualifier: Arc<dyn AudienceQualifier>) -> Self {
        Self {
            storage,
            qualifier,
            assignments: DashMap::new(),
        }
    }

    /// Replay persisted assignments into memory, returning how many loaded.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the assignments collection cannot be
    /// scanned.
    pub async fn load(&self) -> Result<usize> {
        let records = self.storage.scan_all(ASSIGNMENTS).await?;
        let mut loaded = 0;
        for (key, bytes) in records {
            match serde_json::from_slice::<Assignment>(&bytes) {
                Ok(assignment) => {
                    self.assignments.insert(assignment.key(), assignment);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping undecodable assignment record {key}: {e}"),
            }
        }
        Ok(loaded)
    }

    /// Assign a user to a variant of `experiment`, returning the variant ID.
    ///
    /// Returns `Ok(None)` if the experiment is not active, the user fails
    /// audience qualification, or the experiment has no arms to assign.
    /// An existing assignment is always returned as-is, whatever the
    /// qualifier would say today.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a freshly created assignment cannot be
    /// persisted (the in-memory index already holds it).
    pub async fn assign(
        &self,
        experiment: &Experiment,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<String>> {
        if experiment.status() != ExperimentStatus::Active {
            return Ok(None);
        }

        let key = assignment_key(user_id, experiment.experiment_id());
        if let Some(existing) = self.assignments.get(&key) {
            return Ok(Some(existing.variant_id().to_string()));
        }

        if !self.qualifier.qualifies(user_id, experiment.target_audience()) {
            debug!(
                "User {user_id} does not qualify for experiment {}",
                experiment.experiment_id()
            );
            return Ok(None);
        }

        let value = unit_interval(user_id, experiment.experiment_id());
        let Some(variant_id) = choose_variant(experiment, value).map(|v| v.variant_id().to_string())
        else {
            return Ok(None);
        };

        // The entry guard makes the first insert win; racing callers compute
        // the same variant anyway because the hash is pure.
        let (assignment, created) = match self.assignments.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let mut builder =
                    Assignment::builder(user_id, experiment.experiment_id(), variant_id);
                if let Some(session) = session_id {
                    builder = builder.session_id(session);
                }
                let assignment = builder.build();
                entry.insert(assignment.clone());
                (assignment, true)
            }
        };

        if created {
            self.persist(&assignment).await?;
            debug!(
                "User {user_id} assigned to variant {} in experiment {}",
                assignment.variant_id(),
                experiment.experiment_id()
            );
        }
        Ok(Some(assignment.variant_id().to_string()))
    }

    /// Get the stored assignment for a `(user, experiment)` pair.
    #[must_use]
    pub fn assignment_for(&self, user_id: &str, experiment_id: &str) -> Option<Assignment> {
        self.assignments
            .get(&assignment_key(user_id, experiment_id))
            .map(|a| a.value().clone())
    }

    /// Number of assignments in memory.
    #[must_use]
    pub fn count(&self) -> usize {
        self.assignments.len()
    }

    async fn persist(&self, assignment: &Assignment) -> Result<()> {
        let bytes = serde_json::to_vec(assignment)?;
        if let Err(e) = self.storage.put(ASSIGNMENTS, &assignment.key(), bytes).await {
            error!("Failed to persist assignment {}: {e}", assignment.key());
            return Err(e);
        }
        Ok(())
    }
}
