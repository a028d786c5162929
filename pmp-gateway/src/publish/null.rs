//! Cloud-disabled sink: succeeds without sending anything

use super::PublishSink;
use crate::error::GatewayError;
use async_trait::async_trait;
use rumqttc::QoS;

pub struct NullSink {
    name: String,
}

impl NullSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl PublishSink for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, _suffix: &str, _payload: &str, _qos: QoS) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn update_shadow(&self, _state: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn subscribe_once(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
