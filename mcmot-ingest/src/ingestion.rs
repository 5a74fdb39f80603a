//! Ingestion engine (component C8): normalizes a drained event batch,
//! drops stale entries, and keeps only the latest event per camera.
//!
//! Grounded on the original `IngestionEngine.process_raw_events`: pure,
//! synchronous, no I/O. Malformed-field rejection happens earlier, at the
//! transport boundary where an `Event` is deserialized; this stage only
//! applies the per-camera dedup and age policy described in the tracking
//! specification's ingestion section.

use chrono::{DateTime, Duration, Utc};
use mcmot_config::Disposition;
use mcmot_types::Event;
use std::collections::HashMap;

/// Classifies one raw event against the age/validity policy, the tagged
/// result replacing exceptions-as-control-flow at this boundary (§9 DESIGN
/// NOTES). Per-camera dedup happens afterward, over the accepted set.
fn classify(event: Event, now: DateTime<Utc>, config: &IngestionConfig) -> Disposition<Event> {
    if event.camera_id.is_empty() {
        return Disposition::Dropped { reason: "empty camera_id".to_string() };
    }
    if now - event.timestamp > config.max_age {
        return Disposition::Dropped { reason: "event older than max_age".to_string() };
    }
    Disposition::Accepted(event)
}

/// Outcome of one ingestion pass (§4.8): the deduped events plus counters
/// for observability.
#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub events: Vec<Event>,
    pub raw_count: usize,
    pub dropped: usize,
}

/// Tunables for one ingestion pass, mirroring `EDGE_EVENT_MAX_AGE`.
#[derive(Debug, Clone, Copy)]
pub struct IngestionConfig {
    pub max_age: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { max_age: Duration::seconds(30) }
    }
}

/// Validates, ages out, and dedups `raw` per camera (P1: at most one event
/// per camera in the output, the one with the greatest timestamp).
pub fn process_raw_events(raw: Vec<Event>, now: DateTime<Utc>, config: &IngestionConfig) -> IngestionResult {
    let raw_count = raw.len();
    let mut dropped = 0;
    let mut latest_per_camera: HashMap<String, Event> = HashMap::new();

    for event in raw {
        let event = match classify(event, now, config) {
            Disposition::Accepted(event) => event,
            Disposition::Dropped { reason } => {
                tracing::debug!(reason, "dropped raw event");
                dropped += 1;
                continue;
            }
            Disposition::Fatal(reason) => unreachable!("classify never reports fatal: {reason}"),
        };
        match latest_per_camera.get(&event.camera_id) {
            Some(existing) if existing.timestamp >= event.timestamp => {
                dropped += 1;
            }
            _ => {
                if let Some(stale) = latest_per_camera.insert(event.camera_id.clone(), event) {
                    let _ = stale;
                    dropped += 1;
                }
            }
        }
    }

    let events: Vec<Event> = latest_per_camera.into_values().collect();
    IngestionResult { events, raw_count, dropped }
}
