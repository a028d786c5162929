//! Session controller
//!
//! Wires configuration into devices, sinks and the scheduler. Phases are
//! strictly ordered and each one is a hard dependency for the next:
//! device sources, publish sinks, handshakes (once per device, in device
//! order), subscriptions, then the polling loop. The first error
//! short-circuits the whole session.

use crate::config::GatewayConfig;
use crate::device::iolink::IoLinkMaster;
use crate::device::simulated::SimulatedDevice;
use crate::device::DeviceSource;
use crate::dump::SampleDumper;
use crate::error::GatewayError;
use crate::payload::ShadowStatePayload;
use crate::publish::cloud::CloudSink;
use crate::publish::null::NullSink;
use crate::publish::PublishSink;
use crate::scheduler::{AcquisitionScheduler, Termination, TimerPeriods};
use tracing::info;

/// Run one gateway session to completion.
pub async fn run(config: GatewayConfig) -> Result<Termination, GatewayError> {
    let mut devices = build_device_sources(&config)?;
    let sinks = build_publish_sinks(&config).await?;
    send_handshakes(&mut devices, &sinks).await?;
    subscribe_topics(&sinks).await?;

    let names: Vec<String> = devices.iter().map(|d| d.name().to_string()).collect();
    let dumper = SampleDumper::new(
        config.dump.directory.clone(),
        &names,
        [config.dump.env_samples, config.dump.tdm_samples, config.dump.fdm_samples],
    );
    let mut scheduler =
        AcquisitionScheduler::new(devices, sinks, dumper, TimerPeriods::from(&config.timers));
    if config.setup.use_threads_for_polling_sensors {
        scheduler.run_threaded().await
    } else {
        scheduler.run_unthreaded().await
    }
}

/// Phase 2: bind every configured device, real or simulated.
fn build_device_sources(config: &GatewayConfig) -> Result<Vec<Box<dyn DeviceSource>>, GatewayError> {
    let mut devices: Vec<Box<dyn DeviceSource>> = Vec::new();
    if config.setup.use_sensors {
        let master = IoLinkMaster::connect(
            &config.serial_port.name,
            config.serial_port.baudrate_bits_per_second,
        )?;
        info!("Initializing IO-Link Devices...");
        for descriptor in &config.setup.devices {
            match master.device_by_position(descriptor.position, &descriptor.name)? {
                Some(device) => {
                    info!(
                        "Device \"{}\" on position \"{}\" initialized.",
                        descriptor.name, descriptor.position
                    );
                    devices.push(Box::new(device));
                }
                None => {
                    return Err(GatewayError::SetupIncomplete {
                        name: descriptor.name.clone(),
                        position: descriptor.position,
                    })
                }
            }
        }
        info!("IO-Link setup complete.");
    } else {
        for descriptor in &config.setup.devices {
            devices.push(Box::new(SimulatedDevice::new(descriptor.name.as_str())));
        }
    }
    Ok(devices)
}

/// Phase 3: one publish sink per device, paired by index.
async fn build_publish_sinks(
    config: &GatewayConfig,
) -> Result<Vec<Box<dyn PublishSink>>, GatewayError> {
    let mut sinks: Vec<Box<dyn PublishSink>> = Vec::new();
    if config.setup.use_cloud {
        let cloud = config.cloud.as_ref().ok_or_else(|| {
            GatewayError::ConfigInvalid("Missing endpoint in configuration file.".to_string())
        })?;
        info!("Initializing Edge Computing...");
        for descriptor in &config.setup.devices {
            let (certificate, private_key) = config.device_credentials(&descriptor.name);
            let sink = CloudSink::connect(&descriptor.name, cloud, &certificate, &private_key).await?;
            sinks.push(Box::new(sink));
        }
        info!("Edge Computing setup complete.");
    } else {
        for descriptor in &config.setup.devices {
            sinks.push(Box::new(NullSink::new(descriptor.name.as_str())));
        }
    }
    Ok(sinks)
}

/// Phase 4: handshake exactly once per device, in device order.
async fn send_handshakes(
    devices: &mut [Box<dyn DeviceSource>],
    sinks: &[Box<dyn PublishSink>],
) -> Result<(), GatewayError> {
    info!("Sending handshake information...");
    for (device, sink) in devices.iter_mut().zip(sinks) {
        let payload = ShadowStatePayload::from(device.handshake()?);
        let state = serde_json::to_string(&payload)?;
        info!("[{}] {state}", sink.name());
        sink.update_shadow(&state).await?;
    }
    Ok(())
}

/// Phase 5: shadow and threshold-event subscriptions.
async fn subscribe_topics(sinks: &[Box<dyn PublishSink>]) -> Result<(), GatewayError> {
    for sink in sinks {
        sink.subscribe_once().await?;
    }
    Ok(())
}
