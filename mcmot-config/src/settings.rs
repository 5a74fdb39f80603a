//! Env-driven daemon settings (§6 "Recognized configuration").
//!
//! Grounded on `braid-config-data`'s free-function-default idiom, applied to
//! environment variables instead of a serde struct: each setting is read
//! once at startup into a typed `DaemonSettings` value rather than scattering
//! `std::env::var` calls through the codebase.

use crate::error::{Error, Result};
use std::time::Duration;

fn env_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: T::Err| Error::InvalidEnvValue {
            name,
            raw,
            reason: err.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEventBackend {
    Http,
    Mqtt,
}

impl std::str::FromStr for EdgeEventBackend {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "http" => Ok(EdgeEventBackend::Http),
            "mqtt" => Ok(EdgeEventBackend::Mqtt),
            other => Err(format!("expected \"http\" or \"mqtt\", got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleMode {
    Freeze,
    Unknown,
}

impl std::str::FromStr for StaleMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "freeze" => Ok(StaleMode::Freeze),
            "unknown" => Ok(StaleMode::Unknown),
            other => Err(format!("expected \"freeze\" or \"unknown\", got {other:?}")),
        }
    }
}

/// The full, once-read env-driven configuration surface named in §6.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub loop_interval_seconds: f64,
    pub retry_backoff_seconds: f64,
    pub non_working_idle_seconds: f64,

    pub edge_event_backend: EdgeEventBackend,
    pub edge_event_host: String,
    pub edge_event_port: u16,
    pub edge_event_max_age_seconds: f64,
    pub edge_events_mqtt_topic: String,

    pub phase_publish_backend: Option<String>,
    pub phase_mqtt_topic: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_qos: u8,
    pub mqtt_retain: bool,
    pub mqtt_client_id: String,
    pub mqtt_enabled: bool,
    pub mqtt_heartbeat_seconds: f64,
    pub phase_http_base_url: Option<String>,

    pub pipeline_schedule_path: std::path::PathBuf,
    pub scheduler_engine_class: Option<String>,
    pub phase_engine_class: Option<String>,
    pub ingestion_engine_class: Option<String>,
    pub tracking_engine_class: Option<String>,
    pub format_strategy_class: Option<String>,
    pub rules_engine_class: Option<String>,
    pub event_dispatch_engine_class: Option<String>,

    pub phase_stable_seconds: f64,
    pub edge_event_stale_seconds: f64,
    pub edge_event_stale_mode: StaleMode,
    pub edge_event_unknown_phase: String,

    pub mcmot_enabled: bool,
    pub mcmot_config_path: Option<std::path::PathBuf>,
    pub app_timezone: String,
    pub log_level: String,
    pub config_summary: bool,
}

impl DaemonSettings {
    pub fn from_env() -> Result<Self> {
        let mcmot_enabled = parse_env("MCMOT_ENABLED", false)?;
        let mcmot_config_path = env_var("MCMOT_CONFIG_PATH").map(std::path::PathBuf::from);
        if mcmot_enabled && mcmot_config_path.is_none() {
            return Err(Error::MissingMcmotConfigPath);
        }

        Ok(Self {
            loop_interval_seconds: parse_env("LOOP_INTERVAL_SECONDS", 1.0)?,
            retry_backoff_seconds: parse_env("RETRY_BACKOFF_SECONDS", 5.0)?,
            non_working_idle_seconds: parse_env("NON_WORKING_IDLE_SECONDS", 30.0)?,

            edge_event_backend: parse_env("EDGE_EVENT_BACKEND", EdgeEventBackend::Http)?,
            edge_event_host: env_var("EDGE_EVENT_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            edge_event_port: parse_env("EDGE_EVENT_PORT", 8080)?,
            edge_event_max_age_seconds: parse_env("EDGE_EVENT_MAX_AGE", 30.0)?,
            edge_events_mqtt_topic: env_var("EDGE_EVENTS_MQTT_TOPIC").unwrap_or_else(|| "mcmot/events".to_string()),

            phase_publish_backend: env_var("PHASE_PUBLISH_BACKEND"),
            phase_mqtt_topic: env_var("PHASE_MQTT_TOPIC").unwrap_or_else(|| "mcmot/phase".to_string()),
            mqtt_host: env_var("MQTT_HOST").unwrap_or_else(|| "localhost".to_string()),
            mqtt_port: parse_env("MQTT_PORT", 1883)?,
            mqtt_qos: parse_env("MQTT_QOS", 0)?,
            mqtt_retain: parse_env("MQTT_RETAIN", false)?,
            mqtt_client_id: env_var("MQTT_CLIENT_ID").unwrap_or_else(|| "mcmotd".to_string()),
            mqtt_enabled: parse_env("MQTT_ENABLED", false)?,
            mqtt_heartbeat_seconds: parse_env("MQTT_HEARTBEAT_SECONDS", 30.0)?,
            phase_http_base_url: env_var("PHASE_HTTP_BASE_URL"),

            pipeline_schedule_path: env_var("PIPELINE_SCHEDULE_PATH")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| std::path::PathBuf::from("schedule.json")),
            scheduler_engine_class: env_var("SCHEDULER_ENGINE_CLASS"),
            phase_engine_class: env_var("PHASE_ENGINE_CLASS"),
            ingestion_engine_class: env_var("INGESTION_ENGINE_CLASS"),
            tracking_engine_class: env_var("TRACKING_ENGINE_CLASS"),
            format_strategy_class: env_var("FORMAT_STRATEGY_CLASS"),
            rules_engine_class: env_var("RULES_ENGINE_CLASS"),
            event_dispatch_engine_class: env_var("EVENT_DISPATCH_ENGINE_CLASS"),

            phase_stable_seconds: parse_env("PHASE_STABLE_SECONDS", 180.0)?,
            edge_event_stale_seconds: parse_env("EDGE_EVENT_STALE_SECONDS", 0.0)?,
            edge_event_stale_mode: parse_env("EDGE_EVENT_STALE_MODE", StaleMode::Freeze)?,
            edge_event_unknown_phase: env_var("EDGE_EVENT_UNKNOWN_PHASE").unwrap_or_else(|| "unknown".to_string()),

            mcmot_enabled,
            mcmot_config_path,
            app_timezone: env_var("APP_TIMEZONE").unwrap_or_else(|| "UTC".to_string()),
            log_level: env_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            config_summary: parse_env("CONFIG_SUMMARY", false)?,
        })
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs_f64(self.loop_interval_seconds.max(0.0))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_seconds.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_with_no_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in ["MCMOT_ENABLED", "MCMOT_CONFIG_PATH", "LOOP_INTERVAL_SECONDS"] {
            std::env::remove_var(key);
        }
        let settings = DaemonSettings::from_env().unwrap();
        assert_eq!(settings.loop_interval_seconds, 1.0);
        assert!(!settings.mcmot_enabled);
    }

    #[test]
    fn enabling_mcmot_without_config_path_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("MCMOT_ENABLED", "true");
        std::env::remove_var("MCMOT_CONFIG_PATH");
        let result = DaemonSettings::from_env();
        std::env::remove_var("MCMOT_ENABLED");
        assert!(matches!(result, Err(Error::MissingMcmotConfigPath)));
    }

    #[test]
    fn invalid_numeric_value_is_reported_with_the_variable_name() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("LOOP_INTERVAL_SECONDS", "not-a-number");
        let result = DaemonSettings::from_env();
        std::env::remove_var("LOOP_INTERVAL_SECONDS");
        assert!(matches!(result, Err(Error::InvalidEnvValue { name: "LOOP_INTERVAL_SECONDS", .. })));
    }
}
