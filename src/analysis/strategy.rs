//! Significance and confidence-interval strategies
//!
//! The stock implementations preserve the quick heuristics the engine has
//! always reported; they are screening aids, not hypothesis tests. The
//! traits exist so a rigorous procedure (a two-proportion z-test, a
//! bootstrap interval) can be swapped in without touching aggregation, and
//! they receive sample sizes and the configured confidence level even
//! though the stock heuristics ignore them.

/// One variant's reading on the primary metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmReading {
    /// Aggregated metric value for the arm.
    pub value: f64,
    /// Distinct users observed in the arm.
    pub sample_size: usize,
}

/// Decides whether a treatment arm's movement on the primary metric counts
/// as significant.
pub trait SignificanceStrategy: Send + Sync {
    /// `minimum_effect_size` is the experiment's configured threshold for a
    /// meaningful relative change.
    fn is_significant(
        &self,
        control: ArmReading,
        treatment: ArmReading,
        minimum_effect_size: f64,
    ) -> bool;
}

/// Relative effect-size screen: `|treatment - control| / control` must reach
/// the configured minimum. A non-positive control value never screens as
/// significant.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectSizeThreshold;

impl SignificanceStrategy for EffectSizeThreshold {
    fn is_significant(
        &self,
        control: ArmReading,
        treatment: ArmReading,
        minimum_effect_size: f64,
    ) -> bool {
        if control.value <= 0.0 {
            return false;
        }
        let effect_size = (treatment.value - control.value).abs() / control.value;
        effect_size >= minimum_effect_size
    }
}

/// Produces a `(lower, upper)` interval around a primary-metric reading.
pub trait ConfidenceIntervalStrategy: Send + Sync {
    /// `confidence_level` is the experiment's configured level (e.g. 0.95).
    fn interval(&self, reading: ArmReading, confidence_level: f64) -> (f64, f64);
}

/// Fixed relative margin around the point value, clamped at zero below.
#[derive(Debug, Clone, Copy)]
pub struct FixedMarginInterval {
    margin_fraction: f64,
}

impl FixedMarginInterval {
    /// Create an interval strategy with the given relative margin.
    #[must_use]
    pub const fn new(margin_fraction: f64) -> Self {
        Self { margin_fraction }
    }

    /// Get the relative margin.
    #[must_use]
    pub const fn margin_fraction(&self) -> f64 {
        self.margin_fraction
    }
}

impl Default for FixedMarginInterval {
    /// The historical +/-10% margin.
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl ConfidenceIntervalStrategy for FixedMarginInterval {
    fn interval(&self, reading: ArmReading, _confidence_level: f64) -> (f64, f64) {
        let margin = reading.value * self.margin_fraction;
        ((reading.value - margin).max(0.0), reading.value + margin)
    }
}
