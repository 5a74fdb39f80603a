//! Wires every component into the running daemon: loads configuration,
//! builds the tracking pipeline, starts the configured transports, and
//! drives the workflow runner on the main thread (§5 "one main loop thread
//! runs the workflow runner").

use crate::{ingest_http, ingest_mqtt};
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use mcmot_config::{DaemonSettings, EdgeEventBackend, McmotConfig, StaleMode};
use mcmot_control::{
    Context, DefaultFormatter, DispatchNode, FormatNode, HttpPublisher, IngestionNode,
    LoggingDispatcher, LoggingPhaseChangeObserver, LoopReport, LoopTask, MqttPublisher,
    NoOpRuleEngine, PhaseChangeObserver, PhasePublisher, PhaseResolver, Pipeline,
    PublisherOrchestrator, RulesNode, RunnerConfig, SinglePhaseResolver, StartupTask,
    TrackingNode,
};
use mcmot_ingest::{EventStore, IngestionConfig};
use mcmot_render::{MapRenderer, RenderMode};
use mcmot_track::{CameraEntry, Coordinator, Gallery, GalleryConfig, MapScale, RecordService};
use mcmot_types::Phase;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

struct ScheduleFileExists {
    path: Option<PathBuf>,
}

impl StartupTask for ScheduleFileExists {
    fn name(&self) -> &str {
        "schedule-file-check"
    }

    fn run(&mut self) -> mcmot_control::Result<()> {
        if let Some(path) = &self.path {
            if !path.exists() {
                return Err(mcmot_control::Error::StartupFailed {
                    task: self.name().to_string(),
                    reason: format!("pipeline schedule path does not exist: {}", path.display()),
                });
            }
        }
        Ok(())
    }
}

fn build_coordinator(config: &McmotConfig) -> Result<Coordinator> {
    let mut cameras = Vec::new();
    for camera in config.camera_configs() {
        let mapper = if camera.enabled {
            match mcmot_geom::load_mapper(config.system.coordinate_transform_mode, &camera.coordinate_matrix_ckpt) {
                Ok(mapper) => Some(mapper),
                Err(err) => {
                    tracing::warn!(camera_id = %camera.camera_id, error = %err, "failed to load coordinate mapper; camera will pass through unmapped");
                    None
                }
            }
        } else {
            None
        };
        let entry = CameraEntry {
            camera_id: camera.camera_id.clone(),
            enabled: camera.enabled,
            mapper,
            ignore_polygon: camera.ignore_polygon.clone(),
        };
        cameras.push((camera.camera_id.clone(), entry, camera.edge_id.clone()));
    }

    let trackable_classes: HashSet<String> = config.tracking.trackable_classes.iter().cloned().collect();
    let traj_method = match config.tracking.traj_method.as_str() {
        "euclidean" => mcmot_track::TrajMethod::Euclidean,
        _ => mcmot_track::TrajMethod::Dtw,
    };
    let map_scale = Some(MapScale {
        meters_per_pixel_x: config.map.width_meters / config.map.pixel_width as f64,
        meters_per_pixel_y: config.map.height_meters / config.map.pixel_height as f64,
    });
    let gallery = Gallery::new(GalleryConfig {
        cost_params: mcmot_track::CostParams {
            backtrack_seconds: config.tracking.backtrack_seconds,
            time_step: config.tracking.time_step,
            traj_method,
            alpha: config.tracking.alpha,
            max_traj_loss: config.tracking.max_traj_loss,
        },
        match_threshold: Some(config.tracking.match_threshold),
        confirmation_frames: config.tracking.confirmation_frames,
        clear_threshold: chrono::Duration::seconds(config.tracking.clear_threshold_seconds),
        candidate_threshold: chrono::Duration::seconds(config.tracking.candidate_threshold_seconds),
        map_scale,
        distance_threshold_m: config.tracking.distance_threshold_m,
    });

    Ok(Coordinator::new(cameras, trackable_classes, RecordService::new(), gallery))
}

fn build_phase_resolver(settings: &DaemonSettings) -> Box<dyn PhaseResolver> {
    let inner: Box<dyn PhaseResolver> = Box::new(SinglePhaseResolver::new(Phase::new("working", true)));
    let stale_policy = match settings.edge_event_stale_mode {
        StaleMode::Freeze => mcmot_control::StalePolicy::Freeze,
        StaleMode::Unknown => {
            mcmot_control::StalePolicy::Unknown(Phase::new(settings.edge_event_unknown_phase.clone(), false))
        }
    };
    Box::new(mcmot_control::DebouncedResolver::new(
        inner,
        settings.phase_stable_seconds,
        settings.edge_event_stale_seconds,
        stale_policy,
    ))
}

fn build_publisher(settings: &DaemonSettings) -> Option<PublisherOrchestrator> {
    let mut backends: Vec<Box<dyn PhasePublisher>> = Vec::new();
    match settings.phase_publish_backend.as_deref() {
        Some("http") => {
            if let Some(base_url) = &settings.phase_http_base_url {
                backends.push(Box::new(HttpPublisher::new(base_url.clone())));
            } else {
                tracing::warn!("PHASE_PUBLISH_BACKEND=http but PHASE_HTTP_BASE_URL is unset; http phase publishing disabled");
            }
        }
        Some("mqtt") => {
            if settings.mqtt_enabled {
                let mut options = rumqttc::MqttOptions::new(
                    format!("{}-phase-pub", settings.mqtt_client_id),
                    settings.mqtt_host.clone(),
                    settings.mqtt_port,
                );
                options.set_keep_alive(Duration::from_secs(30));
                let (client, mut connection) = rumqttc::Client::new(options, 16);
                std::thread::Builder::new()
                    .name("phase-publish-mqtt-pump".to_string())
                    .spawn(move || {
                        for notification in connection.iter() {
                            if let Err(err) = notification {
                                tracing::warn!(error = %err, "phase publish mqtt connection error");
                            }
                        }
                    })
                    .expect("failed to spawn mqtt pump thread");
                let qos = match settings.mqtt_qos {
                    0 => rumqttc::QoS::AtMostOnce,
                    1 => rumqttc::QoS::AtLeastOnce,
                    _ => rumqttc::QoS::ExactlyOnce,
                };
                backends.push(Box::new(MqttPublisher::new(client, settings.phase_mqtt_topic.clone(), qos, settings.mqtt_retain)));
            } else {
                tracing::warn!("PHASE_PUBLISH_BACKEND=mqtt but MQTT_ENABLED is false; mqtt phase publishing disabled");
            }
        }
        Some(other) => tracing::warn!(backend = other, "unrecognized PHASE_PUBLISH_BACKEND; phase publishing disabled"),
        None => {}
    }
    if backends.is_empty() {
        None
    } else {
        Some(PublisherOrchestrator::new(backends, Duration::from_secs_f64(settings.mqtt_heartbeat_seconds)))
    }
}

struct TrackingLoopTask {
    pipeline: Pipeline,
    context: Context,
    phase_resolver: Box<dyn PhaseResolver>,
    phase_observer: Box<dyn PhaseChangeObserver>,
    current_phase: Option<Phase>,
    last_event_time: Option<DateTime<Utc>>,
    publisher: Option<PublisherOrchestrator>,
    renderer: Option<MapRenderer>,
    non_working_idle: Duration,
}

impl LoopTask for TrackingLoopTask {
    fn run(&mut self, now: DateTime<Utc>) -> mcmot_control::Result<LoopReport> {
        self.pipeline.run(&mut self.context, now)?;

        if self.context.edge_events.as_ref().map(|events| !events.is_empty()).unwrap_or(false) {
            self.last_event_time = Some(now);
        }

        let phase = self.phase_resolver.resolve(now, self.last_event_time);
        if self.current_phase.as_ref() != Some(&phase) {
            self.phase_observer.on_phase_change(self.current_phase.as_ref(), &phase);
            self.current_phase = Some(phase.clone());
        }

        if let Some(publisher) = &mut self.publisher {
            publisher.maybe_publish(&phase.name, now);
        }

        if let Some(renderer) = &mut self.renderer {
            let globals = self.context.mc_mot_global_objects.clone().unwrap_or_default();
            if let Err(err) = renderer.render(&globals, &[], now, RenderMode::Write) {
                tracing::warn!(error = %err, "map render failed");
            }
        }

        let sleep_override = if phase.is_working_hours { None } else { Some(self.non_working_idle) };
        Ok(LoopReport { sleep_override })
    }
}

pub fn run() -> Result<()> {
    let settings = DaemonSettings::from_env().context("loading env-driven daemon settings")?;
    let _logging_guard = mcmot_config::init_logging(&settings.log_level);

    if !settings.mcmot_enabled {
        tracing::info!("MCMOT_ENABLED is false; nothing to do");
        return Ok(());
    }
    let config_path = settings.mcmot_config_path.clone().expect("checked by DaemonSettings::from_env");
    let mcmot_config = McmotConfig::load(&config_path)
        .with_context(|| format!("loading mcmot config from {}", config_path.display()))?;
    mcmot_config.validate().context("validating mcmot config")?;

    if settings.config_summary {
        tracing::info!(cameras = mcmot_config.cameras.len(), "loaded mcmot configuration");
    }

    let store = Arc::new(EventStore::default());

    match settings.edge_event_backend {
        EdgeEventBackend::Http => {
            ingest_http::spawn(settings.edge_event_host.clone(), settings.edge_event_port, store.clone());
        }
        EdgeEventBackend::Mqtt => {
            ingest_mqtt::spawn(
                settings.mqtt_host.clone(),
                settings.mqtt_port,
                settings.mqtt_client_id.clone(),
                settings.edge_events_mqtt_topic.clone(),
                store.clone(),
            );
        }
    }

    let coordinator = build_coordinator(&mcmot_config).context("building the tracking coordinator")?;
    let pipeline = Pipeline::new(
        "tracking",
        vec![
            Box::new(IngestionNode::new(
                store.clone(),
                IngestionConfig { max_age: chrono::Duration::seconds(settings.edge_event_max_age_seconds as i64) },
            )),
            Box::new(TrackingNode::new(coordinator)),
            Box::new(FormatNode::new(Box::new(DefaultFormatter))),
            Box::new(RulesNode::new(Box::new(NoOpRuleEngine))),
            Box::new(DispatchNode::new(Box::new(LoggingDispatcher))),
        ],
    );

    let renderer = match &mcmot_config.map.image_path {
        Some(image_path) => {
            let output_dir = config_path.parent().unwrap_or_else(|| Path::new(".")).join("map_renders");
            let map_config = mcmot_types::MapConfig {
                pixel_width: mcmot_config.map.pixel_width,
                pixel_height: mcmot_config.map.pixel_height,
                width_meters: mcmot_config.map.width_meters,
                height_meters: mcmot_config.map.height_meters,
            };
            match MapRenderer::new(image_path.clone(), map_config, 0.02, output_dir, None) {
                Ok(renderer) => Some(renderer),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to initialize map renderer; rendering disabled");
                    None
                }
            }
        }
        None => None,
    };

    let mut loop_task = TrackingLoopTask {
        pipeline,
        context: Context::default(),
        phase_resolver: build_phase_resolver(&settings),
        phase_observer: Box::new(LoggingPhaseChangeObserver),
        current_phase: None,
        last_event_time: None,
        publisher: build_publisher(&settings),
        renderer,
        non_working_idle: Duration::from_secs_f64(settings.non_working_idle_seconds.max(0.0)),
    };

    let mut startup_tasks: Vec<Box<dyn StartupTask>> = vec![Box::new(ScheduleFileExists {
        path: std::env::var_os("PIPELINE_SCHEDULE_PATH").map(PathBuf::from),
    })];

    let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
    {
        let stopped = stopped.clone();
        ctrlc_handler(move || stopped.store(true, std::sync::atomic::Ordering::SeqCst));
    }

    let runner_config = RunnerConfig { loop_interval: settings.loop_interval(), retry_backoff: settings.retry_backoff() };
    mcmot_control::run_workflow(
        &mut startup_tasks,
        &mut loop_task,
        runner_config,
        || stopped.load(std::sync::atomic::Ordering::SeqCst),
        std::thread::sleep,
        Utc::now,
    )
    .context("workflow runner exited with an error")?;

    tracing::info!("shutdown signal received; exiting cleanly");
    Ok(())
}

fn ctrlc_handler(on_signal: impl Fn() + Send + 'static) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::warn!(error = %err, "failed to start signal-handling runtime; Ctrl-C will not trigger a graceful shutdown");
            return;
        }
    };
    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal();
                }
            });
        })
        .expect("failed to spawn signal-handler thread");
}
