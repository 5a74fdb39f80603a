//! Phase publisher (component C13): delivers phase-change/heartbeat
//! notifications to configured transports.
//!
//! Grounded on the original `PhasePublisherRegistry` and the transport
//! backends named in the daemon's env-driven configuration (§6): an HTTP
//! backend (built on `reqwest`, this workspace's HTTP client, mirroring how
//! `tr8tmnvny9-lab-Regatta_Race_Suite` wires its own outbound client) and an
//! MQTT backend (`rumqttc`, already in the teacher's stack for transport).
//! Backends absent from configuration are not startup errors; they are
//! simply not registered (§4.13).

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A single delivery target. `publish` returns whether delivery succeeded;
/// failures are logged by the orchestrator, never retried within a cycle.
pub trait PhasePublisher: Send {
    fn name(&self) -> &str;
    fn publish(&mut self, phase_name: &str, timestamp: DateTime<Utc>) -> bool;
}

/// Posts `{"phase": ..., "timestamp": ...}` to a configured URL.
pub struct HttpPublisher {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client configuration is static and valid"),
            base_url: base_url.into(),
        }
    }
}

impl PhasePublisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    fn publish(&mut self, phase_name: &str, timestamp: DateTime<Utc>) -> bool {
        let body = serde_json::json!({
            "phase": phase_name,
            "timestamp": timestamp.timestamp() as f64 + timestamp.timestamp_subsec_nanos() as f64 / 1e9,
        });
        match self.client.post(&self.base_url).json(&body).send() {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "phase publish over http was rejected");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "phase publish over http failed");
                false
            }
        }
    }
}

/// Publishes to an MQTT topic via a pre-connected `rumqttc` client handle.
pub struct MqttPublisher {
    client: rumqttc::Client,
    topic: String,
    qos: rumqttc::QoS,
    retain: bool,
}

impl MqttPublisher {
    pub fn new(client: rumqttc::Client, topic: impl Into<String>, qos: rumqttc::QoS, retain: bool) -> Self {
        Self { client, topic: topic.into(), qos, retain }
    }
}

impl PhasePublisher for MqttPublisher {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn publish(&mut self, phase_name: &str, timestamp: DateTime<Utc>) -> bool {
        let payload = serde_json::json!({
            "phase": phase_name,
            "timestamp": timestamp.timestamp() as f64 + timestamp.timestamp_subsec_nanos() as f64 / 1e9,
        })
        .to_string();
        match self.client.publish(&self.topic, self.qos, self.retain, payload) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, topic = %self.topic, "phase publish over mqtt failed");
                false
            }
        }
    }
}

/// Orchestrates one or more [`PhasePublisher`] backends: publishes on phase
/// change or when the heartbeat interval has elapsed (§4.13).
pub struct PublisherOrchestrator {
    backends: Vec<Box<dyn PhasePublisher>>,
    heartbeat: Duration,
    last_phase: Option<String>,
    last_publish: Option<DateTime<Utc>>,
}

impl PublisherOrchestrator {
    pub fn new(backends: Vec<Box<dyn PhasePublisher>>, heartbeat: Duration) -> Self {
        Self { backends, heartbeat, last_phase: None, last_publish: None }
    }

    fn should_publish(&self, phase_name: &str, now: DateTime<Utc>) -> bool {
        let phase_changed = self.last_phase.as_deref() != Some(phase_name);
        let heartbeat_due = self.heartbeat > Duration::ZERO
            && self
                .last_publish
                .map(|last| (now - last).num_milliseconds() as f64 / 1000.0 >= self.heartbeat.as_secs_f64())
                .unwrap_or(true);
        phase_changed || heartbeat_due
    }

    /// Returns true if at least one backend accepted the publish. State
    /// (`last_phase`/`last_publish`) only advances on at least one success.
    pub fn maybe_publish(&mut self, phase_name: &str, now: DateTime<Utc>) -> bool {
        if !self.should_publish(phase_name, now) {
            return false;
        }
        let mut any_success = false;
        for backend in &mut self.backends {
            if backend.publish(phase_name, now) {
                any_success = true;
            } else {
                tracing::warn!(backend = backend.name(), phase = phase_name, "phase publish failed");
            }
        }
        if any_success {
            self.last_phase = Some(phase_name.to_string());
            self.last_publish = Some(now);
        }
        any_success
    }
}
