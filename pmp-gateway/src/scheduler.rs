//! Acquisition scheduling
//!
//! One repeating timer per (device, polled class) raises a pending flag;
//! a single consumer loop drains the flags in round-robin device order,
//! pulling data from the device source, publishing it and dumping it.
//! Timer tasks write one boolean per slot and the consumer is the only
//! reader, so no synchronization beyond the atomics is needed. Missed
//! ticks are dropped, never queued: a still-raised flag delays re-arming
//! and the consumer processes one occurrence per pass.

use crate::config::TimerConfig;
use crate::device::{DeviceSource, SignalClass};
use crate::dump::{DumpOutcome, SampleDumper};
use crate::error::GatewayError;
use crate::payload::{EnvironmentalPayload, FrequencyDomainPayload, TimeDomainPayload};
use crate::publish::PublishSink;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Why the polling loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every dump countdown reached zero.
    QuotaReached,
}

/// One pending flag per (device, polled class).
///
/// Raised by timer tasks, read-then-cleared by the consumer loop.
pub struct PendingFlags {
    slots: Vec<[AtomicBool; 3]>,
}

impl PendingFlags {
    pub fn new(device_count: usize) -> Self {
        Self { slots: (0..device_count).map(|_| Default::default()).collect() }
    }

    pub fn raise(&self, device: usize, class: SignalClass) {
        if let Some(slot) = class.slot() {
            self.slots[device][slot].store(true, Ordering::Release);
        }
    }

    pub fn clear(&self, device: usize, class: SignalClass) {
        if let Some(slot) = class.slot() {
            self.slots[device][slot].store(false, Ordering::Release);
        }
    }

    pub fn is_raised(&self, device: usize, class: SignalClass) -> bool {
        class.slot().is_some_and(|slot| self.slots[device][slot].load(Ordering::Acquire))
    }

    /// Highest-priority raised class for a device, if any.
    pub fn first_ready(&self, device: usize) -> Option<SignalClass> {
        SignalClass::POLLED.into_iter().find(|class| self.is_raised(device, *class))
    }
}

/// Polling period per signal class.
#[derive(Debug, Clone, Copy)]
pub struct TimerPeriods {
    pub env: Duration,
    pub tdm: Duration,
    pub fdm: Duration,
}

impl TimerPeriods {
    fn period(&self, class: SignalClass) -> Duration {
        match class {
            SignalClass::TimeDomain => self.tdm,
            SignalClass::FrequencyDomain => self.fdm,
            // Handshake carries no timer; the slot defaults to the slowest cadence.
            SignalClass::Environmental | SignalClass::Handshake => self.env,
        }
    }
}

impl From<&TimerConfig> for TimerPeriods {
    fn from(config: &TimerConfig) -> Self {
        Self {
            env: Duration::from_secs(config.env_seconds),
            tdm: Duration::from_secs(config.tdm_seconds),
            fdm: Duration::from_secs(config.fdm_seconds),
        }
    }
}

pub struct AcquisitionScheduler {
    devices: Vec<Box<dyn DeviceSource>>,
    sinks: Vec<Box<dyn PublishSink>>,
    dumper: SampleDumper,
    periods: TimerPeriods,
    flags: Arc<PendingFlags>,
}

impl AcquisitionScheduler {
    /// Devices and sinks are paired by index, fixed for the loop's lifetime.
    pub fn new(
        devices: Vec<Box<dyn DeviceSource>>,
        sinks: Vec<Box<dyn PublishSink>>,
        dumper: SampleDumper,
        periods: TimerPeriods,
    ) -> Self {
        debug_assert_eq!(devices.len(), sinks.len());
        let flags = Arc::new(PendingFlags::new(devices.len()));
        Self { devices, sinks, dumper, periods, flags }
    }

    /// Timer-driven mode: background intervals raise flags, the loop drains them.
    pub async fn run_threaded(&mut self) -> Result<Termination, GatewayError> {
        self.spawn_timers();
        info!("Demo running...");
        loop {
            if let Some(termination) = self.pass().await? {
                return Ok(termination);
            }
            tokio::task::yield_now().await;
        }
    }

    /// Throughput-bound mode: every class for every device, back-to-back.
    pub async fn run_unthreaded(&mut self) -> Result<Termination, GatewayError> {
        info!("Demo running...");
        loop {
            for device in 0..self.devices.len() {
                for class in SignalClass::POLLED {
                    if self.service(device, class).await? == DumpOutcome::Completed {
                        return Ok(Termination::QuotaReached);
                    }
                }
            }
        }
    }

    /// One round-robin sweep: at most one ready class per device,
    /// Environmental > TimeDomain > FrequencyDomain. The flag is cleared
    /// only after its publish completed.
    async fn pass(&mut self) -> Result<Option<Termination>, GatewayError> {
        for device in 0..self.devices.len() {
            let Some(class) = self.flags.first_ready(device) else { continue };
            let outcome = self.service(device, class).await?;
            self.flags.clear(device, class);
            if outcome == DumpOutcome::Completed {
                return Ok(Some(Termination::QuotaReached));
            }
        }
        Ok(None)
    }

    fn spawn_timers(&self) {
        for device in 0..self.devices.len() {
            for class in SignalClass::POLLED {
                let period = self.periods.period(class);
                let flags = Arc::clone(&self.flags);
                tokio::spawn(async move {
                    let mut ticker = interval(period);
                    // Drop ticks the consumer missed instead of replaying them.
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        flags.raise(device, class);
                    }
                });
            }
        }
    }

    /// Read one signal class from one device, publish it, dump it.
    async fn service(
        &mut self,
        device: usize,
        class: SignalClass,
    ) -> Result<DumpOutcome, GatewayError> {
        let source = &mut self.devices[device];
        let (payload, display_line) = match class {
            SignalClass::Environmental => {
                let payload = EnvironmentalPayload::from(source.environmental()?);
                let json = serde_json::to_string(&payload)?;
                let display = json.clone();
                (json, display)
            }
            SignalClass::TimeDomain => {
                let payload = TimeDomainPayload::from(source.time_domain()?);
                let json = serde_json::to_string(&payload)?;
                let display = json.clone();
                (json, display)
            }
            SignalClass::FrequencyDomain => {
                let payload = FrequencyDomainPayload::from(source.frequency_domain()?);
                (serde_json::to_string(&payload)?, payload.summary())
            }
            // Handshake is sent once by the session, never from the loop.
            SignalClass::Handshake => return Ok(DumpOutcome::Skipped),
        };

        let sink = &self.sinks[device];
        info!("[{}] {}", sink.name(), display_line);
        if let Some(suffix) = class.sense_suffix() {
            sink.publish(suffix, &payload, QoS::AtMostOnce).await?;
        }
        self.dumper.dump(self.sinks[device].name(), class, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::SimulatedDevice;
    use crate::topics;
    use async_trait::async_trait;
    use pmp_devkit::RecordingSink;
    use tempfile::TempDir;

    /// Test sink: records through the devkit stub under the full topic.
    struct StubSink {
        name: String,
        inner: RecordingSink,
    }

    #[async_trait]
    impl PublishSink for StubSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn publish(
            &self,
            suffix: &str,
            payload: &str,
            qos: QoS,
        ) -> Result<(), GatewayError> {
            self.inner
                .publish(topics::sense_topic(&self.name, suffix), qos, false, payload.as_bytes())
                .await
                .expect("recording sink never fails");
            Ok(())
        }

        async fn update_shadow(&self, state: &str) -> Result<(), GatewayError> {
            self.inner
                .publish(
                    topics::shadow_topic(&self.name, topics::SHADOW_UPDATE),
                    QoS::AtLeastOnce,
                    false,
                    state.as_bytes(),
                )
                .await
                .expect("recording sink never fails");
            Ok(())
        }

        async fn subscribe_once(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn scheduler_with(
        names: &[&str],
        quotas: [u32; 3],
        dir: &TempDir,
    ) -> (AcquisitionScheduler, RecordingSink) {
        let recorder = RecordingSink::new();
        let devices: Vec<Box<dyn DeviceSource>> =
            names.iter().map(|n| Box::new(SimulatedDevice::new(*n)) as Box<dyn DeviceSource>).collect();
        let sinks: Vec<Box<dyn PublishSink>> = names
            .iter()
            .map(|n| {
                Box::new(StubSink { name: n.to_string(), inner: recorder.clone() })
                    as Box<dyn PublishSink>
            })
            .collect();
        let dumper = SampleDumper::new(dir.path(), names, quotas);
        let periods = TimerPeriods {
            env: Duration::from_millis(5),
            tdm: Duration::from_millis(5),
            fdm: Duration::from_millis(5),
        };
        (AcquisitionScheduler::new(devices, sinks, dumper, periods), recorder)
    }

    #[test]
    fn flags_raise_and_clear_per_slot() {
        let flags = PendingFlags::new(2);
        assert_eq!(flags.first_ready(0), None);
        flags.raise(0, SignalClass::FrequencyDomain);
        flags.raise(0, SignalClass::FrequencyDomain); // idempotent, no queueing
        assert!(flags.is_raised(0, SignalClass::FrequencyDomain));
        assert!(!flags.is_raised(1, SignalClass::FrequencyDomain));
        flags.clear(0, SignalClass::FrequencyDomain);
        assert_eq!(flags.first_ready(0), None);
    }

    #[test]
    fn first_ready_prefers_environmental_over_fdm() {
        let flags = PendingFlags::new(1);
        flags.raise(0, SignalClass::FrequencyDomain);
        flags.raise(0, SignalClass::Environmental);
        assert_eq!(flags.first_ready(0), Some(SignalClass::Environmental));
    }

    #[test]
    fn handshake_has_no_flag_slot() {
        let flags = PendingFlags::new(1);
        flags.raise(0, SignalClass::Handshake);
        assert_eq!(flags.first_ready(0), None);
    }

    #[tokio::test]
    async fn pass_services_one_class_per_device_by_priority() {
        let dir = TempDir::new().unwrap();
        let (mut scheduler, recorder) = scheduler_with(&["Sensor1"], [0, 0, 0], &dir);
        scheduler.flags.raise(0, SignalClass::Environmental);
        scheduler.flags.raise(0, SignalClass::TimeDomain);

        assert_eq!(scheduler.pass().await.unwrap(), None);
        assert_eq!(recorder.find_messages_by_topic("pm/Sensor1/sense/environmental").len(), 1);
        assert!(recorder.find_messages_by_topic("pm/Sensor1/sense/inertial_tdm").is_empty());
        // The serviced flag is down, the lower-priority one still waits.
        assert!(!scheduler.flags.is_raised(0, SignalClass::Environmental));
        assert!(scheduler.flags.is_raised(0, SignalClass::TimeDomain));

        assert_eq!(scheduler.pass().await.unwrap(), None);
        assert_eq!(recorder.find_messages_by_topic("pm/Sensor1/sense/inertial_tdm").len(), 1);
    }

    #[tokio::test]
    async fn pass_walks_devices_in_configuration_order() {
        let dir = TempDir::new().unwrap();
        let (mut scheduler, recorder) = scheduler_with(&["Sensor1", "Sensor2"], [0, 0, 0], &dir);
        scheduler.flags.raise(0, SignalClass::Environmental);
        scheduler.flags.raise(1, SignalClass::Environmental);

        scheduler.pass().await.unwrap();
        let topics: Vec<String> =
            recorder.published().iter().map(|m| m.topic.clone()).collect();
        assert_eq!(
            topics,
            vec!["pm/Sensor1/sense/environmental", "pm/Sensor2/sense/environmental"]
        );
    }

    #[tokio::test]
    async fn unthreaded_services_env_tdm_fdm_per_pass() {
        let dir = TempDir::new().unwrap();
        let (mut scheduler, recorder) = scheduler_with(&["Sensor1"], [1, 1, 1], &dir);

        let termination = scheduler.run_unthreaded().await.unwrap();
        assert_eq!(termination, Termination::QuotaReached);
        let topics: Vec<String> =
            recorder.published().iter().map(|m| m.topic.clone()).collect();
        assert_eq!(
            topics,
            vec![
                "pm/Sensor1/sense/environmental",
                "pm/Sensor1/sense/inertial_tdm",
                "pm/Sensor1/sense/inertial_fdm",
            ]
        );
    }

    #[tokio::test]
    async fn threaded_runs_until_quota_completion() {
        let dir = TempDir::new().unwrap();
        let (mut scheduler, recorder) = scheduler_with(&["Sensor1", "Sensor2"], [1, 1, 1], &dir);

        let termination =
            tokio::time::timeout(Duration::from_secs(5), scheduler.run_threaded())
                .await
                .expect("scheduler should terminate on quota completion")
                .unwrap();
        assert_eq!(termination, Termination::QuotaReached);
        for device in ["Sensor1", "Sensor2"] {
            for suffix in ["environmental", "inertial_tdm", "inertial_fdm"] {
                assert!(
                    !recorder
                        .find_messages_by_topic(&format!("pm/{device}/sense/{suffix}"))
                        .is_empty(),
                    "missing publishes for {device}/{suffix}"
                );
            }
        }
        assert!(dir.path().join("Sensor1_environmental.log").exists());
        assert!(dir.path().join("Sensor2_inertial_fdm.log").exists());
    }

    #[tokio::test]
    async fn published_environmental_payload_is_sorted_compact_json() {
        let dir = TempDir::new().unwrap();
        let (mut scheduler, recorder) = scheduler_with(&["Sensor1"], [0, 0, 0], &dir);
        scheduler.flags.raise(0, SignalClass::Environmental);
        scheduler.pass().await.unwrap();

        let records = recorder.find_messages_by_topic("pm/Sensor1/sense/environmental");
        let text = String::from_utf8(records[0].payload.clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Humidity", "Pressure", "Temperature"]);
        assert_eq!(records[0].qos, QoS::AtMostOnce);
    }
}
