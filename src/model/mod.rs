//! Data model for experiments, assignments, and events
//!
//! Records are immutable once constructed (builders validate on entry) and
//! serialize to JSON for the storage port. String forms of the enums are the
//! stable boundary vocabulary; renaming a serde tag is a breaking change for
//! stored data.

mod assignment;
mod event;
mod experiment;
mod metric;
mod variant;

pub use assignment::{assignment_key, Assignment, AssignmentBuilder};
pub use event::{TrackedEvent, TrackedEventBuilder};
pub use experiment::{
    Experiment, ExperimentBuilder, ExperimentStatus, ALLOCATION_TOLERANCE,
};
pub use metric::{Metric, MetricBuilder, MetricKind};
pub use variant::{Variant, VariantBuilder, VariantKind};
