//! Custom Audience Example
//!
//! Wires the engine's extension seams: an audience qualifier gating
//! assignment on the experiment's targeting document, an analytics sink
//! observing catalog activity, and the JSONL backend carrying state across
//! process restarts.
//!
//! Run with: cargo run --example custom_audience

use std::sync::Arc;

use anyhow::Result;
use ensayo::analytics::AnalyticsSink;
use ensayo::audience::AudienceQualifier;
use ensayo::model::{Experiment, Metric, MetricKind, Variant, VariantKind};
use ensayo::store::JsonlBackend;
use ensayo::ExperimentEngine;
use serde_json::{json, Map, Value};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Only users whose ID carries the cohort prefix named by `target_audience`
/// qualify. A real deployment would consult a user store instead.
struct CohortPrefix;

impl AudienceQualifier for CohortPrefix {
    fn qualifies(&self, user_id: &str, target_audience: &Map<String, Value>) -> bool {
        target_audience
            .get("cohort_prefix")
            .and_then(Value::as_str)
            .map_or(true, |prefix| user_id.starts_with(prefix))
    }
}

/// Prints catalog activity as it happens.
struct StdoutSink;

impl AnalyticsSink for StdoutSink {
    fn experiment_created(&self, actor: &str, experiment_id: &str, name: &str) {
        println!("   [analytics] {actor} created {experiment_id} ({name})");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Ensayo Custom Audience ===\n");

    let dir = std::env::temp_dir().join("ensayo-custom-audience");
    let _ = std::fs::remove_dir_all(&dir);

    // -------------------------------------------------------------------------
    // 1. Build an engine with custom seams over a durable backend
    // -------------------------------------------------------------------------
    println!("1. Building engine (JSONL storage at {})...", dir.display());

    let engine = ExperimentEngine::builder(JsonlBackend::open(&dir).await?)
        .audience(Arc::new(CohortPrefix))
        .analytics(Arc::new(StdoutSink))
        .build()
        .await?;

    // -------------------------------------------------------------------------
    // 2. Create a beta-cohort experiment
    // -------------------------------------------------------------------------
    println!("\n2. Creating beta-gated experiment...");

    let experiment = Experiment::builder("onboarding-v2", "Onboarding Flow v2")
        .description("New onboarding checklist, beta cohort only")
        .variant(Variant::new(
            "control",
            "Current Flow",
            VariantKind::Control,
            0.5,
        )?)
        .variant(
            Variant::builder("treatment", "Checklist Flow", VariantKind::Treatment, 0.5)
                .configuration(object(json!({"checklist": true, "steps": 4})))
                .build()?,
        )
        .metric(
            Metric::builder("activation", MetricKind::ConversionRate, "Activation Rate")
                .primary()
                .build(),
        )
        .target_audience(object(json!({"cohort_prefix": "beta_"})))
        .build()?;

    engine.create_experiment(experiment).await?;
    engine.start_experiment("onboarding-v2").await?;

    // -------------------------------------------------------------------------
    // 3. Qualification in action
    // -------------------------------------------------------------------------
    println!("\n3. Assigning users...");

    for user in ["beta_ana", "beta_luis", "prod_maria"] {
        match engine.assign_user(user, "onboarding-v2", None).await? {
            Some(variant) => println!("   {user}: assigned to {variant}"),
            None => println!("   {user}: not in audience"),
        }
    }

    // -------------------------------------------------------------------------
    // 4. Restart: state survives the process
    // -------------------------------------------------------------------------
    println!("\n4. Reopening engine from disk...");

    drop(engine);
    let reopened = ExperimentEngine::builder(JsonlBackend::open(&dir).await?)
        .audience(Arc::new(CohortPrefix))
        .build()
        .await?;

    let assignment = reopened
        .assign_user("beta_ana", "onboarding-v2", None)
        .await?;
    println!("   beta_ana still sees: {assignment:?}");
    println!(
        "   Experiments on disk: {}",
        reopened.list_experiments(None).len()
    );
    println!("   Log files left in {} for inspection", dir.display());

    println!("\n=== Custom Audience Complete ===");
    Ok(())
}
