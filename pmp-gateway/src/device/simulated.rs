//! Simulated sensor source
//!
//! Produces uniform random readings inside the ranges of the real sensor,
//! rounded to three decimals. Used for demos without hardware; never fails.

use super::{DeviceSource, Environmental, FftBin, Handshake, TimeDomain};
use crate::error::GatewayError;
use rand::Rng;

const DEVICE_TYPE: &str = "STEVAL-IPD005V1";
const FIRMWARE: &str = "Firmware Ver. 1.0.0";
const FEATURES: [&str; 3] = ["Environmental", "Inertial_TDM", "Inertial_FDM"];

/// Number of spectrum lines in the simulated FFT.
pub const FFT_BINS: usize = 1024;

/// Spacing between simulated FFT bins, Hz.
const FFT_BIN_STEP_HZ: f64 = 3.0;

pub struct SimulatedDevice {
    name: String,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl DeviceSource for SimulatedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn handshake(&mut self) -> Result<Handshake, GatewayError> {
        Ok(Handshake {
            device_type: DEVICE_TYPE.to_string(),
            firmware: FIRMWARE.to_string(),
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
        })
    }

    fn environmental(&mut self) -> Result<Environmental, GatewayError> {
        let mut rng = rand::thread_rng();
        Ok(Environmental {
            pressure: round3(1100.0 * rng.gen::<f64>()),
            humidity: round3(100.0 * rng.gen::<f64>()),
            temperature: round3(50.0 * rng.gen::<f64>()),
        })
    }

    fn time_domain(&mut self) -> Result<TimeDomain, GatewayError> {
        let mut rng = rand::thread_rng();
        Ok(TimeDomain {
            rms_speed: round3(10.0 * rng.gen::<f64>()),
            peak_acceleration: round3(10.0 * rng.gen::<f64>()),
        })
    }

    fn frequency_domain(&mut self) -> Result<Vec<FftBin>, GatewayError> {
        let mut rng = rand::thread_rng();
        let bins = (0..FFT_BINS)
            .map(|ix| FftBin {
                frequency: FFT_BIN_STEP_HZ * ix as f64,
                x: round3(10.0 * rng.gen::<f64>()),
                y: round3(10.0 * rng.gen::<f64>()),
                z: round3(10.0 * rng.gen::<f64>()),
            })
            .collect();
        Ok(bins)
    }
}
