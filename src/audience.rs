//! Audience qualification seam

use serde_json::{Map, Value};

/// Decides whether a user is eligible for an experiment.
///
/// The qualifier runs after the sticky-assignment lookup and before
/// bucketing, so an already-assigned user keeps their variant even if the
/// qualifier would now exclude them. Implementations receive the
/// experiment's free-form `target_audience` document and interpret it
/// however their user store allows.
pub trait AudienceQualifier: Send + Sync {
    /// `true` if `user_id` may be assigned under the given targeting
    /// document.
    fn qualifies(&self, user_id: &str, target_audience: &Map<String, Value>) -> bool;
}

/// Default qualifier: every user is eligible for every experiment.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualifyAll;

impl AudienceQualifier for QualifyAll {
    fn qualifies(&self, _user_id: &str, _target_audience: &Map<String, Value>) -> bool {
        true
    }
}
