//! Scheduler / registry (component C11): resolves a phase name to the
//! [`Pipeline`] that should run for it, and gates re-runs by a per-phase
//! minimum interval.
//!
//! Grounded on the original `PipelineRegistry`/`ScheduleConfig` pair, with
//! the dotted-path pipeline lookup replaced by pipelines registered once at
//! startup (§9's abstract-class-registry redesign flag).

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-phase execution policy: how often its pipeline may re-run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhasePolicy {
    pub interval_seconds: Option<f64>,
}

struct Entry {
    pipeline: Pipeline,
    policy: PhasePolicy,
    last_run: Option<DateTime<Utc>>,
}

/// Maps phase names to pipelines and enforces each phase's minimum re-run
/// interval (§4.11).
pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, phase: impl Into<String>, pipeline: Pipeline, policy: PhasePolicy) {
        self.entries.insert(phase.into(), Entry { pipeline, policy, last_run: None });
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True if `phase` is registered and its minimum interval (if any) has
    /// elapsed since its last run.
    pub fn is_due(&self, phase: &str, now: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get(phase) else { return false };
        match (entry.policy.interval_seconds, entry.last_run) {
            (Some(interval), Some(last_run)) => (now - last_run).num_milliseconds() as f64 / 1000.0 >= interval,
            _ => true,
        }
    }

    /// Runs the pipeline registered for `phase`, if due. Returns
    /// `Ok(false)` when skipped because the minimum interval has not
    /// elapsed, and an error when `phase` is unknown or the pipeline fails.
    pub fn run_phase(&mut self, phase: &str, ctx: &mut crate::context::Context, now: DateTime<Utc>) -> Result<bool> {
        if !self.entries.contains_key(phase) {
            return Err(Error::UnknownPhase(phase.to_string()));
        }
        if !self.is_due(phase, now) {
            return Ok(false);
        }
        let entry = self.entries.get_mut(phase).expect("checked above");
        entry.pipeline.run(ctx, now)?;
        entry.last_run = Some(now);
        Ok(true)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::pipeline::{Node, TaskOutcome};
    use chrono::Duration;

    struct CountingNode(std::sync::Arc<std::sync::atomic::AtomicUsize>);
    impl Node for CountingNode {
        fn name(&self) -> &str {
            "counting"
        }
        fn run(&mut self, _ctx: &mut Context, _now: DateTime<Utc>) -> Result<TaskOutcome> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(TaskOutcome::Ran)
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    #[test]
    fn unknown_phase_is_an_error() {
        let mut registry = Registry::new();
        let mut ctx = Context::default();
        assert!(matches!(registry.run_phase("missing", &mut ctx, t(0)), Err(Error::UnknownPhase(_))));
    }

    #[test]
    fn phase_without_interval_runs_every_call() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let pipeline = Pipeline::new("p", vec![Box::new(CountingNode(counter.clone()))]);
        let mut registry = Registry::new();
        registry.register("working", pipeline, PhasePolicy::default());
        let mut ctx = Context::default();
        assert!(registry.run_phase("working", &mut ctx, t(0)).unwrap());
        assert!(registry.run_phase("working", &mut ctx, t(1)).unwrap());
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn phase_with_interval_skips_reruns_before_it_elapses() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let pipeline = Pipeline::new("p", vec![Box::new(CountingNode(counter.clone()))]);
        let mut registry = Registry::new();
        registry.register("non_working", pipeline, PhasePolicy { interval_seconds: Some(10.0) });
        let mut ctx = Context::default();
        assert!(registry.run_phase("non_working", &mut ctx, t(0)).unwrap());
        assert!(!registry.run_phase("non_working", &mut ctx, t(5)).unwrap());
        assert!(registry.run_phase("non_working", &mut ctx, t(11)).unwrap());
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
