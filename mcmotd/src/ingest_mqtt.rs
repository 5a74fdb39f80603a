//! MQTT transport for inbound edge events (§6), using the same `rumqttc`
//! client the phase publisher uses for its outbound leg.

use mcmot_ingest::EventStore;
use mcmot_types::Event;
use rumqttc::{Client, Event as MqttEvent, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;

pub fn spawn(
    host: String,
    port: u16,
    client_id: String,
    topic: String,
    store: Arc<EventStore>,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("ingest-mqtt".to_string())
        .spawn(move || {
            let mut options = MqttOptions::new(client_id, host, port);
            options.set_keep_alive(Duration::from_secs(30));
            let (client, mut connection) = Client::new(options, 64);
            if let Err(err) = client.subscribe(&topic, QoS::AtLeastOnce) {
                tracing::error!(error = %err, %topic, "failed to subscribe to edge event mqtt topic");
                return;
            }
            tracing::info!(%topic, "edge event mqtt ingestion subscribed");
            for notification in connection.iter() {
                match notification {
                    Ok(MqttEvent::Incoming(Packet::Publish(publish))) => {
                        match serde_json::from_slice::<Event>(&publish.payload) {
                            Ok(event) => store.append(event),
                            Err(err) => tracing::warn!(error = %err, "dropped malformed mqtt edge event payload"),
                        }
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "edge event mqtt connection error"),
                }
            }
        })
        .expect("failed to spawn ingest-mqtt thread")
}
