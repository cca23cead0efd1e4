//! Variant - one arm of an experiment

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Which side of the comparison an arm sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// Baseline arm. An experiment has exactly one.
    Control,
    /// Alternative arm under test.
    Treatment,
}

impl VariantKind {
    /// Get the boundary string form (`"control"` / `"treatment"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Treatment => "treatment",
        }
    }
}

/// One arm of an experiment with its share of traffic.
///
/// `traffic_allocation` is the fraction of eligible users routed to this arm,
/// in `[0.0, 1.0]`. The shares of all arms in an experiment must sum to 1.0;
/// that cross-arm invariant lives in
/// [`ExperimentBuilder::build`](crate::model::ExperimentBuilder::build).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    variant_id: String,
    name: String,
    kind: VariantKind,
    traffic_allocation: f64,
    #[serde(default)]
    configuration: Map<String, Value>,
    #[serde(default)]
    description: String,
}

impl Variant {
    /// Create a new variant with an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `traffic_allocation` is outside
    /// `[0.0, 1.0]`.
    pub fn new(
        variant_id: impl Into<String>,
        name: impl Into<String>,
        kind: VariantKind,
        traffic_allocation: f64,
    ) -> Result<Self> {
        VariantBuilder::new(variant_id, name, kind, traffic_allocation).build()
    }

    /// Create a builder for constructing a variant with optional fields.
    #[must_use]
    pub fn builder(
        variant_id: impl Into<String>,
        name: impl Into<String>,
        kind: VariantKind,
        traffic_allocation: f64,
    ) -> VariantBuilder {
        VariantBuilder::new(variant_id, name, kind, traffic_allocation)
    }

    /// Get the variant ID.
    #[must_use]
    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    /// Get the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the arm kind.
    #[must_use]
    pub const fn kind(&self) -> VariantKind {
        self.kind
    }

    /// Whether this is the control arm.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.kind == VariantKind::Control
    }

    /// Get the fraction of traffic routed to this arm.
    #[must_use]
    pub const fn traffic_allocation(&self) -> f64 {
        self.traffic_allocation
    }

    /// Get the configuration payload served to assigned users.
    #[must_use]
    pub const fn configuration(&self) -> &Map<String, Value> {
        &self.configuration
    }

    /// Get the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for [`Variant`].
#[derive(Debug)]
pub struct VariantBuilder {
    variant_id: String,
    name: String,
    kind: VariantKind,
    traffic_allocation: f64,
    configuration: Map<String, Value>,
    description: String,
}

impl VariantBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        variant_id: impl Into<String>,
        name: impl Into<String>,
        kind: VariantKind,
        traffic_allocation: f64,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            name: name.into(),
            kind,
            traffic_allocation,
            configuration: Map::new(),
            description: String::new(),
        }
    }

    /// Set the configuration payload.
    #[must_use]
    pub fn configuration(mut self, configuration: Map<String, Value>) -> Self {
        self.configuration = configuration;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build the [`Variant`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `traffic_allocation` is outside
    /// `[0.0, 1.0]`.
    pub fn build(self) -> Result<Variant> {
        if !(0.0..=1.0).contains(&self.traffic_allocation) {
            return Err(Error::Validation(format!(
                "traffic allocation must be between 0.0 and 1.0, got {}",
                self.traffic_allocation
            )));
        }
        Ok(Variant {
            variant_id: self.variant_id,
            name: self.name,
            kind: self.kind,
            traffic_allocation: self.traffic_allocation,
            configuration: self.configuration,
            description: self.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_new() {
        let variant = Variant::new("control", "Control", VariantKind::Control, 0.5).unwrap();
        assert_eq!(variant.variant_id(), "control");
        assert_eq!(variant.name(), "Control");
        assert!(variant.is_control());
        assert!((variant.traffic_allocation() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_variant_rejects_out_of_range_allocation() {
        assert!(Variant::new("v", "V", VariantKind::Treatment, 1.2).is_err());
        assert!(Variant::new("v", "V", VariantKind::Treatment, -0.1).is_err());
    }

    #[test]
    fn test_variant_builder() {
        let config = serde_json::json!({"algorithm": "ranked"});
        let Value::Object(config) = config else {
            unreachable!()
        };
        let variant = Variant::builder("treatment", "Ranked", VariantKind::Treatment, 0.5)
            .configuration(config.clone())
            .description("Ranked recommendation list")
            .build()
            .unwrap();
        assert_eq!(variant.configuration(), &config);
        assert_eq!(variant.description(), "Ranked recommendation list");
    }

    #[test]
    fn test_variant_kind_strings() {
        assert_eq!(VariantKind::Control.as_str(), "control");
        assert_eq!(VariantKind::Treatment.as_str(), "treatment");

        let parsed: VariantKind = serde_json::from_str("\"control\"").unwrap();
        assert_eq!(parsed, VariantKind::Control);
    }
}
