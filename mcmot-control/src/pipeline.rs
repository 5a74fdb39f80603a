//! Pipeline and tasks (component C9): an ordered list of nodes, each
//! reading/writing named resources on the [`Context`].
//!
//! Grounded on the original `PipelineRunner`/`BaseTask` pair; the dotted-path
//! class registry is replaced (per the redesign flag on abstract-class
//! registries) with the [`Node`] trait plus small concrete node types built
//! once at startup.

use crate::context::Context;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use mcmot_ingest::{process_raw_events, EventStore, IngestionConfig};
use mcmot_track::Coordinator;
use std::sync::Arc;

/// What a node's `run` reported, beyond writing its context resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOutcome {
    Ran,
    Skipped,
}

/// A single pipeline step. Each node is optional via configuration
/// (constructing a [`Pipeline`] without it); a node that cannot be resolved
/// fails construction, not execution.
pub trait Node: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &mut Context, now: DateTime<Utc>) -> Result<TaskOutcome>;
}

/// An ordered sequence of nodes run once per cycle. A node failure aborts
/// the remaining nodes for this cycle (§4.15); the runner above is
/// responsible for retry/backoff.
pub struct Pipeline {
    name: String,
    nodes: Vec<Box<dyn Node>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, nodes: Vec<Box<dyn Node>>) -> Self {
        Self { name: name.into(), nodes }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&mut self, ctx: &mut Context, now: DateTime<Utc>) -> Result<()> {
        ctx.reset();
        for node in &mut self.nodes {
            node.run(ctx, now).map_err(|err| Error::NodeFailed { node: node.name().to_string(), reason: err.to_string() })?;
        }
        Ok(())
    }
}

/// Drains the event store and writes the deduped batch as `edge_events`.
pub struct IngestionNode {
    store: Arc<EventStore>,
    config: IngestionConfig,
}

impl IngestionNode {
    pub fn new(store: Arc<EventStore>, config: IngestionConfig) -> Self {
        Self { store, config }
    }
}

impl Node for IngestionNode {
    fn name(&self) -> &str {
        "ingestion"
    }

    fn run(&mut self, ctx: &mut Context, now: DateTime<Utc>) -> Result<TaskOutcome> {
        let raw = self.store.drain_all();
        let result = process_raw_events(raw, now, &self.config);
        tracing::debug!(raw = result.raw_count, kept = result.events.len(), dropped = result.dropped, "ingestion cycle");
        ctx.edge_events = Some(result.events);
        Ok(TaskOutcome::Ran)
    }
}

/// Runs each camera's deduped event through the MCMOT coordinator, writing
/// `mc_mot_tracked` (this cycle's per-camera processed objects) and
/// `mc_mot_global_objects` (the gallery snapshot after finalization).
pub struct TrackingNode {
    coordinator: Coordinator,
}

impl TrackingNode {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }
}

impl Node for TrackingNode {
    fn name(&self) -> &str {
        "tracking"
    }

    fn run(&mut self, ctx: &mut Context, now: DateTime<Utc>) -> Result<TaskOutcome> {
        let Some(events) = ctx.edge_events.clone() else {
            return Ok(TaskOutcome::Skipped);
        };
        let mut tracked = Vec::new();
        for event in events {
            let processed = self.coordinator.process_detected_objects(event.detections, &event.camera_id, event.timestamp);
            tracked.extend(processed);
        }
        self.coordinator.finalize_global_updates(now);
        ctx.mc_mot_tracked = Some(tracked);
        ctx.mc_mot_global_objects = Some(self.coordinator.get_all_global_objects());
        Ok(TaskOutcome::Ran)
    }
}

/// Converts the tracked/global object sets into the payload shape handed
/// to rule engines. The exact schema is a collaborator concern (out of
/// scope per PURPOSE & SCOPE); this produces a plain JSON projection.
pub trait Formatter: Send {
    fn format(&self, ctx: &Context) -> serde_json::Value;
}

pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn format(&self, ctx: &Context) -> serde_json::Value {
        serde_json::json!({
            "tracked": ctx.mc_mot_tracked,
            "globals": ctx.mc_mot_global_objects,
        })
    }
}

pub struct FormatNode {
    formatter: Box<dyn Formatter>,
}

impl FormatNode {
    pub fn new(formatter: Box<dyn Formatter>) -> Self {
        Self { formatter }
    }
}

impl Node for FormatNode {
    fn name(&self) -> &str {
        "format"
    }

    fn run(&mut self, ctx: &mut Context, _now: DateTime<Utc>) -> Result<TaskOutcome> {
        ctx.rules_payload = Some(self.formatter.format(ctx));
        Ok(TaskOutcome::Ran)
    }
}

/// Evaluates `rules_payload` into zero or more rule events. Downstream rule
/// engines are an external collaborator (PURPOSE & SCOPE); the default
/// implementation emits nothing.
pub trait RuleEngine: Send {
    fn evaluate(&self, payload: &serde_json::Value) -> Vec<serde_json::Value>;
}

pub struct NoOpRuleEngine;

impl RuleEngine for NoOpRuleEngine {
    fn evaluate(&self, _payload: &serde_json::Value) -> Vec<serde_json::Value> {
        Vec::new()
    }
}

pub struct RulesNode {
    engine: Box<dyn RuleEngine>,
}

impl RulesNode {
    pub fn new(engine: Box<dyn RuleEngine>) -> Self {
        Self { engine }
    }
}

impl Node for RulesNode {
    fn name(&self) -> &str {
        "rules"
    }

    fn run(&mut self, ctx: &mut Context, _now: DateTime<Utc>) -> Result<TaskOutcome> {
        let Some(payload) = ctx.rules_payload.clone() else {
            return Ok(TaskOutcome::Skipped);
        };
        ctx.rule_events = Some(self.engine.evaluate(&payload));
        Ok(TaskOutcome::Ran)
    }
}

/// Delivers `rule_events` to a downstream target. The concrete target
/// (HTTP, queue, ...) is a collaborator concern; the default logs a count.
pub trait Dispatcher: Send {
    fn dispatch(&mut self, events: &[serde_json::Value]);
}

pub struct LoggingDispatcher;

impl Dispatcher for LoggingDispatcher {
    fn dispatch(&mut self, events: &[serde_json::Value]) {
        if !events.is_empty() {
            tracing::info!(count = events.len(), "dispatching rule events");
        }
    }
}

pub struct DispatchNode {
    dispatcher: Box<dyn Dispatcher>,
}

impl DispatchNode {
    pub fn new(dispatcher: Box<dyn Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Node for DispatchNode {
    fn name(&self) -> &str {
        "dispatch"
    }

    fn run(&mut self, ctx: &mut Context, _now: DateTime<Utc>) -> Result<TaskOutcome> {
        let events = ctx.rule_events.clone().unwrap_or_default();
        self.dispatcher.dispatch(&events);
        Ok(TaskOutcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcmot_types::Event;

    struct FailingNode;
    impl Node for FailingNode {
        fn name(&self) -> &str {
            "failing"
        }
        fn run(&mut self, _ctx: &mut Context, _now: DateTime<Utc>) -> Result<TaskOutcome> {
            Err(Error::NodeFailed { node: "failing".into(), reason: "boom".into() })
        }
    }

    #[test]
    fn ingestion_node_writes_edge_events_and_drains_the_store() {
        let store = Arc::new(EventStore::new(10));
        store.append(Event { camera_id: "cam_a".into(), timestamp: Utc::now(), detections: Vec::new(), models: None });
        let mut node = IngestionNode::new(store.clone(), IngestionConfig::default());
        let mut ctx = Context::default();
        node.run(&mut ctx, Utc::now()).unwrap();
        assert_eq!(ctx.edge_events.unwrap().len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn pipeline_aborts_on_node_failure() {
        let mut pipeline = Pipeline::new("test", vec![Box::new(FailingNode)]);
        let mut ctx = Context::default();
        assert!(pipeline.run(&mut ctx, Utc::now()).is_err());
    }

    #[test]
    fn format_then_rules_then_dispatch_round_trip_with_defaults() {
        let mut ctx = Context::default();
        ctx.mc_mot_tracked = Some(Vec::new());
        ctx.mc_mot_global_objects = Some(Vec::new());
        FormatNode::new(Box::new(DefaultFormatter)).run(&mut ctx, Utc::now()).unwrap();
        assert!(ctx.rules_payload.is_some());
        RulesNode::new(Box::new(NoOpRuleEngine)).run(&mut ctx, Utc::now()).unwrap();
        assert_eq!(ctx.rule_events, Some(Vec::new()));
        DispatchNode::new(Box::new(LoggingDispatcher)).run(&mut ctx, Utc::now()).unwrap();
    }

    #[test]
    fn context_is_reset_at_the_start_of_each_pipeline_run() {
        struct WritesTracked;
        impl Node for WritesTracked {
            fn name(&self) -> &str {
                "writes_tracked"
            }
            fn run(&mut self, ctx: &mut Context, _now: DateTime<Utc>) -> Result<TaskOutcome> {
                ctx.mc_mot_tracked = Some(Vec::new());
                Ok(TaskOutcome::Ran)
            }
        }
        let mut pipeline = Pipeline::new("test", vec![Box::new(WritesTracked)]);
        let mut ctx = Context::default();
        ctx.rule_events = Some(vec![serde_json::json!(1)]);
        pipeline.run(&mut ctx, Utc::now()).unwrap();
        assert!(ctx.rule_events.is_none());
        assert!(ctx.mc_mot_tracked.is_some());
    }
}
