//! Schedule document (§6, §4.11): maps phases to pipeline instances and
//! per-phase minimum re-run intervals, loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub class: String,
    #[serde(default)]
    pub kwargs: Option<serde_json::Value>,
    #[serde(default)]
    pub enabled_env: Option<String>,
}

/// A phase's schedule entry: either a bare pipeline name, or an object
/// carrying an optional minimum re-run interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseEntry {
    Name(String),
    Detailed { pipeline: String, interval_seconds: Option<f64> },
}

impl PhaseEntry {
    pub fn pipeline_name(&self) -> &str {
        match self {
            PhaseEntry::Name(name) => name,
            PhaseEntry::Detailed { pipeline, .. } => pipeline,
        }
    }

    pub fn interval_seconds(&self) -> Option<f64> {
        match self {
            PhaseEntry::Name(_) => None,
            PhaseEntry::Detailed { interval_seconds, .. } => *interval_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub pipelines: BTreeMap<String, PipelineEntry>,
    pub phases: BTreeMap<String, PhaseEntry>,
}

impl ScheduleDocument {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn get_entry(&self, name: &str) -> Option<&PipelineEntry> {
        self.pipelines.get(name)
    }
}
