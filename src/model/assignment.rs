//! Assignment - sticky user-to-variant mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compose the `"user_id:experiment_id"` key under which an assignment is
/// stored and looked up.
#[must_use]
pub fn assignment_key(user_id: &str, experiment_id: &str) -> String {
    format!("{user_id}:{experiment_id}")
}

/// Records that a user was placed in a variant of an experiment.
///
/// Assignments are immutable once created: the first assignment for a
/// `(user, experiment)` pair wins and every later call observes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    user_id: String,
    experiment_id: String,
    variant_id: String,
    assigned_at: DateTime<Utc>,
    #[serde(default)]
    session_id: Option<String>,
}

impl Assignment {
    /// Create a new assignment stamped with the current time.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
    ) -> Self {
        AssignmentBuilder::new(user_id, experiment_id, variant_id).build()
    }

    /// Create a builder for constructing an assignment with optional fields.
    #[must_use]
    pub fn builder(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
    ) -> AssignmentBuilder {
        AssignmentBuilder::new(user_id, experiment_id, variant_id)
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

    /// Get the assigned variant ID.
    #[must_use]
    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    /// Get the assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Get the session the assignment happened in, if one was recorded.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Get the storage key for this assignment.
    #[must_use]
    pub fn key(&self) -> String {
        assignment_key(&self.user_id, &self.experiment_id)
    }
}

/// Builder for [`Assignment`].
#[derive(Debug)]
pub struct AssignmentBuilder {
    user_id: String,
    experiment_id: String,
    variant_id: String,
    assigned_at: DateTime<Utc>,
    session_id: Option<String>,
}

impl AssignmentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        experiment_id: impl Into<String>,
        variant_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            experiment_id: experiment_id.into(),
            variant_id: variant_id.into(),
            assigned_at: Utc::now(),
            session_id: None,
        }
    }

    /// Set the session the assignment happened in.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the assignment timestamp (useful for testing).
    #[must_use]
    pub const fn assigned_at(mut self, assigned_at: DateTime<Utc>) -> Self {
        self.assigned_at = assigned_at;
        self
    }

    /// Build the [`Assignment`].
    #[must_use]
    pub fn build(self) -> Assignment {
        Assignment {
            user_id: self.user_id,
            experiment_id: self.experiment_id,
            variant_id: self.variant_id,
            assigned_at: self.assigned_at,
            session_id: self.session_id,
        }
    }
}
