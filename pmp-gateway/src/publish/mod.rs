//! Publish transports
//!
//! A `PublishSink` carries one device's outbound messages. The cloud
//! variant wraps a connected MQTT client; the null variant is a named
//! no-op used when the cloud is disabled, so the polling loop runs the
//! same code path either way.

pub mod cloud;
pub mod null;

use crate::error::GatewayError;
use async_trait::async_trait;
use rumqttc::QoS;

#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Device name this sink is bound to; doubles as the topic identity.
    fn name(&self) -> &str;

    /// Publish a sensed payload under `pm/<name>/sense/<suffix>`.
    async fn publish(&self, suffix: &str, payload: &str, qos: QoS) -> Result<(), GatewayError>;

    /// Report the handshake identity to the device shadow.
    async fn update_shadow(&self, state: &str) -> Result<(), GatewayError>;

    /// Register the shadow and threshold-event topics; called once at start-up.
    async fn subscribe_once(&self) -> Result<(), GatewayError>;
}
