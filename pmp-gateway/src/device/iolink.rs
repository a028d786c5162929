//! IO-Link masterboard and device handles
//!
//! The masterboard multiplexes several sensor positions behind one serial
//! port. Framing is line-oriented: one `<CMD> <position>` request, one
//! CSV reply line (the FFT reply is a bin count followed by one line per
//! bin). Device handles share the port through a mutex; only the consumer
//! loop ever reads, so the lock is never contended in steady state.

use super::{DeviceSource, Environmental, FftBin, Handshake, TimeDomain};
use crate::error::GatewayError;
use parking_lot::Mutex;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const SERIAL_PORT_TIMEOUT: Duration = Duration::from_secs(5);

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Serial handle to the IO-Link masterboard.
pub struct IoLinkMaster {
    port: SharedPort,
    port_name: String,
}

impl IoLinkMaster {
    /// Open the masterboard serial port (8N1, 5 s read timeout).
    pub fn connect(port_name: &str, baud_rate: u32) -> Result<Self, GatewayError> {
        info!(
            "Initializing Masterboard on port \"{port_name}\" with a baud rate of \
             \"{baud_rate}\" [b/s]..."
        );
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(SERIAL_PORT_TIMEOUT)
            .open()?;
        Ok(Self { port: Arc::new(Mutex::new(port)), port_name: port_name.to_string() })
    }

    /// Probe a masterboard position and bind it under the configured name.
    ///
    /// Returns `None` when nothing answers at that position (the probe
    /// timing out counts as no answer, not as a transport failure).
    pub fn device_by_position(
        &self,
        position: u8,
        name: &str,
    ) -> Result<Option<IoLinkDevice>, GatewayError> {
        let mut port = self.port.lock();
        match exchange(&mut *port, name, &format!("IDN {position}")) {
            Ok(id) if !id.is_empty() => {
                info!(
                    "Masterboard on port \"{}\" found device \"{id}\" on position \"{position}\".",
                    self.port_name
                );
                Ok(Some(IoLinkDevice {
                    name: name.to_string(),
                    position,
                    device_type: id,
                    port: Arc::clone(&self.port),
                }))
            }
            Ok(_) => Ok(None),
            Err(GatewayError::DeviceUnavailable { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// One sensor bound to a masterboard position.
pub struct IoLinkDevice {
    name: String,
    position: u8,
    device_type: String,
    port: SharedPort,
}

impl IoLinkDevice {
    fn query(&mut self, command: &str) -> Result<String, GatewayError> {
        let mut port = self.port.lock();
        exchange(&mut *port, &self.name, &format!("{command} {}", self.position))
    }

    fn unavailable(&self, reason: impl Into<String>) -> GatewayError {
        GatewayError::DeviceUnavailable { name: self.name.clone(), reason: reason.into() }
    }
}

impl DeviceSource for IoLinkDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn handshake(&mut self) -> Result<Handshake, GatewayError> {
        let firmware = self.query("FWV")?;
        let features = self.query("FTL")?;
        Ok(Handshake {
            device_type: self.device_type.clone(),
            firmware,
            features: parse_features(&features),
        })
    }

    fn environmental(&mut self) -> Result<Environmental, GatewayError> {
        let reply = self.query("ENV")?;
        let fields = parse_csv_floats(&reply, 3).map_err(|e| self.unavailable(e))?;
        Ok(Environmental { pressure: fields[0], humidity: fields[1], temperature: fields[2] })
    }

    fn time_domain(&mut self) -> Result<TimeDomain, GatewayError> {
        let reply = self.query("TDM")?;
        let fields = parse_csv_floats(&reply, 2).map_err(|e| self.unavailable(e))?;
        Ok(TimeDomain { rms_speed: fields[0], peak_acceleration: fields[1] })
    }

    fn frequency_domain(&mut self) -> Result<Vec<FftBin>, GatewayError> {
        // Multi-line reply; hold the lock across the whole transfer.
        let mut port = self.port.lock();
        write_command(&mut *port, &self.name, &format!("FDM {}", self.position))?;
        let count_line = read_line(&mut *port, &self.name)?;
        let count: usize = count_line
            .trim()
            .parse()
            .map_err(|_| self.unavailable(format!("bad FFT bin count \"{count_line}\"")))?;
        let mut bins = Vec::with_capacity(count);
        for _ in 0..count {
            let line = read_line(&mut *port, &self.name)?;
            let fields = parse_csv_floats(&line, 4).map_err(|e| self.unavailable(e))?;
            bins.push(FftBin { frequency: fields[0], x: fields[1], y: fields[2], z: fields[3] });
        }
        Ok(bins)
    }
}

fn exchange(
    port: &mut Box<dyn SerialPort>,
    name: &str,
    command: &str,
) -> Result<String, GatewayError> {
    write_command(port, name, command)?;
    read_line(port, name)
}

fn write_command(
    port: &mut Box<dyn SerialPort>,
    name: &str,
    command: &str,
) -> Result<(), GatewayError> {
    port.write_all(command.as_bytes())
        .and_then(|_| port.write_all(b"\r\n"))
        .map_err(|e| GatewayError::DeviceUnavailable {
            name: name.to_string(),
            reason: format!("serial write failed: {e}"),
        })
}

fn read_line(port: &mut Box<dyn SerialPort>, name: &str) -> Result<String, GatewayError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match port.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => line.push(byte[0]),
            Err(e) => {
                return Err(GatewayError::DeviceUnavailable {
                    name: name.to_string(),
                    reason: format!("serial read failed: {e}"),
                })
            }
        }
    }
    Ok(String::from_utf8_lossy(&line).trim().to_string())
}

fn parse_csv_floats(reply: &str, expected: usize) -> Result<Vec<f64>, String> {
    let fields: Result<Vec<f64>, _> =
        reply.split(',').map(|field| field.trim().parse::<f64>()).collect();
    match fields {
        Ok(values) if values.len() == expected => Ok(values),
        _ => Err(format!("expected {expected} comma-separated values, got \"{reply}\"")),
    }
}

fn parse_features(reply: &str) -> Vec<String> {
    reply
        .split(';')
        .map(|feature| feature.trim())
        .filter(|feature| !feature.is_empty())
        .map(|feature| feature.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parse_accepts_exact_arity() {
        assert_eq!(parse_csv_floats("1013.25, 45.0, 22.5", 3).unwrap(), vec![1013.25, 45.0, 22.5]);
        assert!(parse_csv_floats("1.0, 2.0", 3).is_err());
        assert!(parse_csv_floats("a, b, c", 3).is_err());
    }

    #[test]
    fn feature_list_splits_on_semicolons() {
        assert_eq!(
            parse_features("Environmental; Inertial_TDM; Inertial_FDM"),
            vec!["Environmental", "Inertial_TDM", "Inertial_FDM"]
        );
        assert!(parse_features("").is_empty());
    }
}
