//! HTTP transport for inbound edge events (§6 "Inbound event").
//!
//! Grounded on `flydra2::model_server`'s axum app-state pattern; the
//! response codes follow the external-interfaces contract: `202` accepted,
//! `400` on a parse/validation failure, one line reason each.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use mcmot_ingest::EventStore;
use mcmot_types::{BBox, Detection, Event};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct InboundDetection {
    class_name: String,
    local_id: i64,
    bbox: [f64; 4],
    score: f64,
    #[serde(default)]
    feature: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct InboundEvent {
    camera_id: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    detections: Vec<InboundDetection>,
    #[serde(default)]
    models: Option<serde_json::Value>,
}

async fn ingest_handler(
    State(store): State<Arc<EventStore>>,
    Json(body): Json<InboundEvent>,
) -> (StatusCode, &'static str) {
    if body.camera_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "camera_id must not be empty");
    }
    let mut detections = Vec::with_capacity(body.detections.len());
    for raw in body.detections {
        let bbox = match BBox::new(raw.bbox[0], raw.bbox[1], raw.bbox[2], raw.bbox[3]) {
            Ok(bbox) => bbox,
            Err(_) => return (StatusCode::BAD_REQUEST, "detection bbox is degenerate"),
        };
        detections.push(Detection {
            class_name: raw.class_name,
            local_id: raw.local_id,
            bbox,
            score: raw.score,
            feature: raw.feature,
        });
    }
    store.append(Event {
        camera_id: body.camera_id,
        timestamp: body.timestamp,
        detections,
        models: body.models,
    });
    (StatusCode::ACCEPTED, "accepted")
}

fn router(store: Arc<EventStore>) -> Router {
    Router::new().route("/events", post(ingest_handler)).with_state(store)
}

/// Runs the ingestion HTTP server on a dedicated thread with its own
/// single-threaded tokio runtime, mirroring `led-box-standalone`'s
/// "spawn tokio on a worker thread, keep the main loop synchronous" split.
pub fn spawn(host: String, port: u16, store: Arc<EventStore>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("ingest-http".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to start tokio runtime for ingestion http server");
            runtime.block_on(async move {
                let addr = format!("{host}:{port}");
                let listener = match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        tracing::error!(%addr, error = %err, "failed to bind edge event http listener");
                        return;
                    }
                };
                tracing::info!(%addr, "edge event http ingestion listening");
                if let Err(err) = axum::serve(listener, router(store)).await {
                    tracing::error!(error = %err, "edge event http server exited");
                }
            });
        })
        .expect("failed to spawn ingest-http thread")
}
