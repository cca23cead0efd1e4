//! # Ensayo: Deterministic A/B Experimentation Engine
//!
//! Ensayo manages the full experiment lifecycle: define variants and
//! metrics, activate, hand out sticky deterministic assignments, track
//! attributed events, and compute results with actionable recommendations.
//! State lives behind a pluggable key-value storage port with in-memory and
//! append-only JSONL adapters included.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: Assignment is a pure hash, no coordination or
//!   lookup tables to keep in sync
//! - **Poka-Yoke safety**: Invalid experiments are rejected on entry, and
//!   events without an assignment are refused rather than misattributed
//! - **Genchi Genbutsu**: Results recompute from the raw event log on every
//!   call, never from cached aggregates
//! - **Jidoka**: Validation failures stop an experiment before it stores,
//!   not after it misassigns
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ensayo::model::Experiment;
//! use ensayo::ExperimentEngine;
//! use serde_json::Map;
//!
//! # async fn example() -> ensayo::Result<()> {
//! let engine = ExperimentEngine::in_memory().await?;
//!
//! // Define and activate a 50/50 test
//! let experiment =
//!     Experiment::split_test("checkout-cta", "Checkout CTA", Map::new(), Map::new())?;
//! engine.create_experiment(experiment).await?;
//! engine.start_experiment("checkout-cta").await?;
//!
//! // Assign, track, analyze
//! let variant = engine.assign_user("alice", "checkout-cta", None).await?;
//! println!("alice sees {variant:?}");
//! engine
//!     .track_event("alice", "checkout-cta", "conversion_rate", "purchase", 1.0, Map::new())
//!     .await?;
//!
//! if let Some(results) = engine.results("checkout-cta") {
//!     for recommendation in results.recommendations() {
//!         println!("{recommendation}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod analytics;
pub mod assigner;
pub mod audience;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod tracker;

pub use engine::{ExperimentEngine, ExperimentEngineBuilder, UserExperimentView};
pub use error::{Error, Result};
