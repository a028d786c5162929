//! Outbound message shapes
//!
//! One struct per signal class, serialized compact with `serde_json`.
//! Struct fields are declared in alphabetical order of their wire names so
//! the serialized keys come out sorted, which the cloud side relies on.

use crate::device::{Environmental, FftBin, Handshake, TimeDomain};
use serde::Serialize;

/// `{"Humidity":…,"Pressure":…,"Temperature":…}`
#[derive(Debug, Serialize)]
pub struct EnvironmentalPayload {
    #[serde(rename = "Humidity")]
    pub humidity: f64,
    #[serde(rename = "Pressure")]
    pub pressure: f64,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
}

impl From<Environmental> for EnvironmentalPayload {
    fn from(reading: Environmental) -> Self {
        Self {
            humidity: reading.humidity,
            pressure: reading.pressure,
            temperature: reading.temperature,
        }
    }
}

/// `{"Peak_Acceleration":…,"RMS_Speed":…}`
#[derive(Debug, Serialize)]
pub struct TimeDomainPayload {
    #[serde(rename = "Peak_Acceleration")]
    pub peak_acceleration: f64,
    #[serde(rename = "RMS_Speed")]
    pub rms_speed: f64,
}

impl From<TimeDomain> for TimeDomainPayload {
    fn from(reading: TimeDomain) -> Self {
        Self { peak_acceleration: reading.peak_acceleration, rms_speed: reading.rms_speed }
    }
}

/// `{"Ine_FFT":[[freq,x,y,z],…]}`
#[derive(Debug, Serialize)]
pub struct FrequencyDomainPayload {
    #[serde(rename = "Ine_FFT")]
    pub ine_fft: Vec<[f64; 4]>,
}

impl From<Vec<FftBin>> for FrequencyDomainPayload {
    fn from(bins: Vec<FftBin>) -> Self {
        Self { ine_fft: bins.into_iter().map(|b| [b.frequency, b.x, b.y, b.z]).collect() }
    }
}

impl FrequencyDomainPayload {
    /// Telemetry-line stand-in: the full spectrum would flood the log.
    pub fn summary(&self) -> String {
        format!("{{\"Ine_FFT\": \"[{}]\"}}", self.ine_fft.len())
    }
}

/// `{"state":{"reported":{"Device_Type":…,"Features":…,"Firmware":…}}}`
#[derive(Debug, Serialize)]
pub struct ShadowStatePayload {
    pub state: ShadowState,
}

#[derive(Debug, Serialize)]
pub struct ShadowState {
    pub reported: ReportedIdentity,
}

#[derive(Debug, Serialize)]
pub struct ReportedIdentity {
    #[serde(rename = "Device_Type")]
    pub device_type: String,
    #[serde(rename = "Features")]
    pub features: Vec<String>,
    #[serde(rename = "Firmware")]
    pub firmware: String,
}

impl From<Handshake> for ShadowStatePayload {
    fn from(handshake: Handshake) -> Self {
        Self {
            state: ShadowState {
                reported: ReportedIdentity {
                    device_type: handshake.device_type,
                    features: handshake.features,
                    firmware: handshake.firmware,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environmental_serializes_sorted_and_compact() {
        let payload = EnvironmentalPayload::from(Environmental {
            pressure: 1013.25,
            humidity: 45.0,
            temperature: 22.5,
        });
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"Humidity":45.0,"Pressure":1013.25,"Temperature":22.5}"#
        );
    }

    #[test]
    fn time_domain_serializes_sorted() {
        let payload =
            TimeDomainPayload::from(TimeDomain { rms_speed: 1.5, peak_acceleration: 9.81 });
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"Peak_Acceleration":9.81,"RMS_Speed":1.5}"#
        );
    }

    #[test]
    fn frequency_domain_nests_rows() {
        let payload = FrequencyDomainPayload::from(vec![
            FftBin { frequency: 0.0, x: 1.0, y: 2.0, z: 3.0 },
            FftBin { frequency: 3.0, x: 4.0, y: 5.0, z: 6.0 },
        ]);
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"Ine_FFT":[[0.0,1.0,2.0,3.0],[3.0,4.0,5.0,6.0]]}"#
        );
        assert_eq!(payload.summary(), r#"{"Ine_FFT": "[2]"}"#);
    }

    #[test]
    fn shadow_state_nests_reported_identity() {
        let payload = ShadowStatePayload::from(Handshake {
            device_type: "STEVAL-IPD005V1".into(),
            firmware: "Firmware Ver. 1.0.0".into(),
            features: vec!["Environmental".into()],
        });
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"state":{"reported":{"Device_Type":"STEVAL-IPD005V1","Features":["Environmental"],"Firmware":"Firmware Ver. 1.0.0"}}}"#
        );
    }
}
