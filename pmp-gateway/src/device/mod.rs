//! Sensor data sources
//!
//! A `DeviceSource` yields the four signal classes the gateway publishes:
//! the one-shot handshake plus the three polled classes. Two variants are
//! selected once at construction and never re-checked per call:
//! - `iolink::IoLinkDevice` — a live sensor bound to a masterboard position
//! - `simulated::SimulatedDevice` — uniform random demo readings

pub mod iolink;
pub mod simulated;

use crate::error::GatewayError;
use crate::topics;

/// Sensor data categories, each with its own timer, payload shape and topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalClass {
    Handshake,
    Environmental,
    TimeDomain,
    FrequencyDomain,
}

impl SignalClass {
    /// The classes driven by timers, in servicing priority order.
    /// Handshake is excluded: it is sent once, eagerly, before the loop.
    pub const POLLED: [SignalClass; 3] =
        [SignalClass::Environmental, SignalClass::TimeDomain, SignalClass::FrequencyDomain];

    /// Flag/countdown slot index; `None` for Handshake.
    pub fn slot(self) -> Option<usize> {
        match self {
            SignalClass::Handshake => None,
            SignalClass::Environmental => Some(0),
            SignalClass::TimeDomain => Some(1),
            SignalClass::FrequencyDomain => Some(2),
        }
    }

    /// Topic suffix under `pm/<device>/sense/`, doubling as the dump-file suffix.
    pub fn sense_suffix(self) -> Option<&'static str> {
        match self {
            SignalClass::Handshake => None,
            SignalClass::Environmental => Some(topics::ENVIRONMENTAL),
            SignalClass::TimeDomain => Some(topics::INERTIAL_TDM),
            SignalClass::FrequencyDomain => Some(topics::INERTIAL_FDM),
        }
    }
}

/// Handshake identity reported to the device shadow.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub device_type: String,
    pub firmware: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environmental {
    pub pressure: f64,
    pub humidity: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDomain {
    pub rms_speed: f64,
    pub peak_acceleration: f64,
}

/// One spectrum line of the inertial FFT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FftBin {
    pub frequency: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Provider of handshake and polled readings for one sensor.
///
/// Reads are synchronous and bounded by the transport's own timeout; a
/// dropped transport fails with `GatewayError::DeviceUnavailable`.
pub trait DeviceSource: Send {
    fn name(&self) -> &str;
    fn handshake(&mut self) -> Result<Handshake, GatewayError>;
    fn environmental(&mut self) -> Result<Environmental, GatewayError>;
    fn time_domain(&mut self) -> Result<TimeDomain, GatewayError>;
    fn frequency_domain(&mut self) -> Result<Vec<FftBin>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polled_classes_exclude_handshake() {
        assert!(!SignalClass::POLLED.contains(&SignalClass::Handshake));
        assert_eq!(SignalClass::Handshake.slot(), None);
        assert_eq!(SignalClass::Handshake.sense_suffix(), None);
    }

    #[test]
    fn polled_slots_are_dense_and_ordered() {
        let slots: Vec<usize> = SignalClass::POLLED.iter().filter_map(|c| c.slot()).collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn suffixes_match_topic_layout() {
        assert_eq!(SignalClass::Environmental.sense_suffix(), Some("environmental"));
        assert_eq!(SignalClass::TimeDomain.sense_suffix(), Some("inertial_tdm"));
        assert_eq!(SignalClass::FrequencyDomain.sense_suffix(), Some("inertial_fdm"));
    }
}
