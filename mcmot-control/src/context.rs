//! The per-cycle context resource bag (§4.9, §9).
//!
//! Grounded on the redesign flag "implicit coupling via context resource
//! bag": kept as an explicit typed record with one field per named
//! resource rather than a string-keyed map, so a missing or mistyped
//! resource name fails to compile instead of failing at runtime.

use mcmot_types::{Event, ObjectRecord};
use serde_json::Value;
use std::path::PathBuf;

/// Filesystem roots injected once at startup, replacing the global
/// mutable core-root/config-root state the redesign flag calls out.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Resources threaded between pipeline nodes for one cycle. Cleared
/// (reset to `None`/empty) between cycles by [`Context::reset`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub edge_events: Option<Vec<Event>>,
    pub mc_mot_tracked: Option<Vec<ObjectRecord>>,
    pub mc_mot_global_objects: Option<Vec<ObjectRecord>>,
    pub rules_payload: Option<Value>,
    pub rule_events: Option<Vec<Value>>,
}

impl Context {
    pub fn reset(&mut self) {
        self.edge_events = None;
        self.mc_mot_tracked = None;
        self.mc_mot_global_objects = None;
        self.rules_payload = None;
        self.rule_events = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_every_resource() {
        let mut ctx = Context { edge_events: Some(Vec::new()), ..Default::default() };
        ctx.rule_events = Some(Vec::new());
        ctx.reset();
        assert!(ctx.edge_events.is_none());
        assert!(ctx.rule_events.is_none());
    }
}
