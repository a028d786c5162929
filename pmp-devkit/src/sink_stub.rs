/*!
Recording publish sink for development without a broker

Mirrors the publish/subscribe surface of the cloud client, records every
message, and lets tests and demo tooling assert on what would have gone
out over MQTT.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};

/// One recorded publish.
#[derive(Debug, Clone)]
pub struct SinkRecord {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Broker-less stand-in for the cloud publish client.
#[derive(Clone, Default)]
pub struct RecordingSink {
    published: Arc<Mutex<Vec<SinkRecord>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a publish (signature-compatible with the async client).
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let record =
            SinkRecord { topic: topic.into(), payload: payload.into(), qos, retain };
        log::info!("[STUB] Published to {}: {} bytes", record.topic, record.payload.len());
        self.published.lock().unwrap().push(record);
        Ok(())
    }

    /// Record a subscription.
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        log::info!("[STUB] Subscribed to {topic}");
        self.subscriptions.lock().unwrap().push(topic);
        Ok(())
    }

    /// All recorded publishes, in order.
    pub fn published(&self) -> Vec<SinkRecord> {
        self.published.lock().unwrap().clone()
    }

    /// All recorded subscriptions, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Publishes recorded for one exact topic.
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<SinkRecord> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse the most recent message on a topic as JSON.
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.find_messages_by_topic(topic).last() {
            Some(record) => Ok(Some(serde_json::from_slice(&record.payload)?)),
            None => Ok(None),
        }
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_publishes_and_subscriptions() {
        let sink = RecordingSink::new();
        sink.subscribe("pm/Sensor1/sense/environmental", QoS::AtLeastOnce).await.unwrap();
        assert_eq!(sink.subscriptions(), vec!["pm/Sensor1/sense/environmental"]);

        sink.publish("pm/Sensor1/sense/environmental", QoS::AtMostOnce, false, b"{}".to_vec())
            .await
            .unwrap();
        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "pm/Sensor1/sense/environmental");
        assert_eq!(published[0].qos, QoS::AtMostOnce);
        assert!(!published[0].retain);
    }

    #[tokio::test]
    async fn last_json_message_parses_the_newest_record() {
        let sink = RecordingSink::new();
        let older = crate::samples::environmental(1000.0, 40.0, 20.0);
        let newer = crate::samples::environmental(1013.25, 45.0, 22.5);
        for payload in [&older, &newer] {
            sink.publish(
                "pm/Sensor1/sense/environmental",
                QoS::AtMostOnce,
                false,
                serde_json::to_vec(payload).unwrap(),
            )
            .await
            .unwrap();
        }

        let parsed: Option<serde_json::Value> =
            sink.get_last_json_message("pm/Sensor1/sense/environmental").unwrap();
        assert_eq!(parsed.unwrap()["Pressure"], 1013.25);
        assert!(sink
            .get_last_json_message::<serde_json::Value>("pm/Sensor2/sense/environmental")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn clear_resets_the_recorder() {
        let sink = RecordingSink::new();
        sink.publish("t", QoS::AtMostOnce, false, b"x".to_vec()).await.unwrap();
        sink.subscribe("t", QoS::AtMostOnce).await.unwrap();
        sink.clear();
        assert!(sink.published().is_empty());
        assert!(sink.subscriptions().is_empty());
    }
}
