//! Analytics notification seam

/// Fire-and-forget sink notified of catalog activity.
///
/// The catalog calls the sink after the experiment is validated and
/// persisted, so observers only ever see experiments that exist.
/// Implementations must not block and must swallow their own failures; a
/// sink can never fail a catalog operation.
pub trait AnalyticsSink: Send + Sync {
    /// An experiment was created by `actor`.
    fn experiment_created(&self, actor: &str, experiment_id: &str, name: &str);
}
