//! Cloud publish sink
//!
//! One MQTT client per device, mutual-TLS against the cloud broker. The
//! connection is awaited to ConnAck during setup; afterwards the event
//! loop runs in a background task whose only job is to keep the session
//! alive and log what the cloud sends back (shadow responses, threshold
//! alerts). No retry logic hangs off these handlers.

use super::PublishSink;
use crate::config::CloudConfig;
use crate::error::GatewayError;
use crate::topics;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS, TlsConfiguration, Transport};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CloudSink {
    name: String,
    client: AsyncClient,
}

impl CloudSink {
    /// Build, connect and background the MQTT client for one device.
    ///
    /// Fails with `ClientConnectFailed` when no ConnAck arrives in time.
    pub async fn connect(
        name: &str,
        config: &CloudConfig,
        certificate: &Path,
        private_key: &Path,
    ) -> Result<Self, GatewayError> {
        let ca = std::fs::read(&config.root_ca_path)?;
        let cert = std::fs::read(certificate)?;
        let key = std::fs::read(private_key)?;

        let mut options = MqttOptions::new(format!("pmp-{name}"), &config.endpoint, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((cert, key)),
        }));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let connected = tokio::time::timeout(CONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => return true,
                    Ok(_) => {}
                    Err(e) => {
                        error!("Client \"{name}\" connection error: {e}");
                        return false;
                    }
                }
            }
        })
        .await;
        if !matches!(connected, Ok(true)) {
            return Err(GatewayError::ClientConnectFailed(name.to_string()));
        }
        info!("Client \"{name}\" connected to core.");

        // Keep the session polled for the process lifetime.
        let task_name = name.to_string();
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        match format_incoming(&publish.topic, &publish.payload) {
                            Some(line) => info!("{line}"),
                            None => debug!("Received MQTT message on topic: {}", publish.topic),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Client \"{task_name}\" MQTT connection error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        Ok(Self { name: name.to_string(), client })
    }
}

#[async_trait]
impl PublishSink for CloudSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, suffix: &str, payload: &str, qos: QoS) -> Result<(), GatewayError> {
        let topic = topics::sense_topic(&self.name, suffix);
        self.client.publish(topic, qos, false, payload).await?;
        Ok(())
    }

    async fn update_shadow(&self, state: &str) -> Result<(), GatewayError> {
        let topic = topics::shadow_topic(&self.name, topics::SHADOW_UPDATE);
        self.client.publish(topic, QoS::AtLeastOnce, false, state).await?;
        Ok(())
    }

    async fn subscribe_once(&self) -> Result<(), GatewayError> {
        for topic in [
            topics::shadow_topic(&self.name, topics::SHADOW_GET),
            topics::shadow_topic(&self.name, topics::SHADOW_UPDATE),
            topics::threshold_topic(&self.name),
        ] {
            self.client.subscribe(&topic, QoS::AtLeastOnce).await?;
            debug!("Client \"{}\" subscribed to {topic}", self.name);
        }
        Ok(())
    }
}

/// Externally raised alert, consumed and logged, never produced here.
#[derive(Debug, Deserialize)]
struct ThresholdEvent {
    severity: i64,
    msg: String,
    info: Option<ThresholdInfo>,
}

#[derive(Debug, Deserialize)]
struct ThresholdInfo {
    value: serde_json::Value,
}

/// Render an incoming cloud message as a telemetry line.
///
/// Shadow responses log status and client token; threshold events log
/// severity, message and the triggering value. Anything else is left to
/// the caller's debug logging.
fn format_incoming(topic: &str, payload: &[u8]) -> Option<String> {
    let status = if topic.ends_with("/rejected") { "rejected" } else { "accepted" };
    if topic.contains(topics::SHADOW_GET) {
        return Some(format!("Get request with token \"{}\" {status}", client_token(payload)));
    }
    if topic.contains(topics::SHADOW_UPDATE) {
        return Some(format!("Update request with token \"{}\" {status}", client_token(payload)));
    }
    if topic.ends_with(&format!("{}/{}", topics::EVENTS, topics::THRESHOLD)) {
        let client = topic.split('/').nth(1).unwrap_or("?");
        let event: ThresholdEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(_) => return Some(format!("[{client}] Unparseable threshold event")),
        };
        let detail = match (&event.info, event.severity) {
            (_, 0) | (None, _) => String::new(),
            (Some(info), _) => format!(" ({})", info.value),
        };
        return Some(format!(
            "[{client}] Event of severity \"{}\": {}{detail}",
            event.severity, event.msg
        ));
    }
    None
}

fn client_token(payload: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.get("clientToken").and_then(|t| t.as_str()).map(|t| t.to_string()))
        .unwrap_or_else(|| "-".to_string())
}
