//! Bounded sample dumping
//!
//! Persists the first N payloads per (device, signal class) to append-only
//! log files, then reports completion so the session can exit. Countdowns
//! are touched only by the consumer loop; file handles are opened and
//! closed per write.

use crate::device::SignalClass;
use crate::error::GatewayError;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

pub const DUMP_EXT: &str = ".log";

/// Result of one dump attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpOutcome {
    /// Quota for this slot already exhausted (or never configured).
    Skipped,
    /// Sample written, work remains elsewhere.
    Dumped,
    /// Sample written and every countdown is now zero.
    Completed,
}

pub struct SampleDumper {
    directory: PathBuf,
    // One countdown per polled class, indexed by SignalClass::slot().
    remaining: HashMap<String, [u32; 3]>,
}

impl SampleDumper {
    pub fn new<S: AsRef<str>>(
        directory: impl Into<PathBuf>,
        devices: &[S],
        quotas: [u32; 3],
    ) -> Self {
        let remaining =
            devices.iter().map(|name| (name.as_ref().to_string(), quotas)).collect();
        Self { directory: directory.into(), remaining }
    }

    /// Append one payload to `<device>_<suffix>.log` if quota remains.
    ///
    /// After a successful write the countdown is decremented and the global
    /// sum checked; the caller terminates the session on `Completed`.
    pub fn dump(
        &mut self,
        device: &str,
        class: SignalClass,
        payload: &str,
    ) -> Result<DumpOutcome, GatewayError> {
        let (Some(slot), Some(suffix)) = (class.slot(), class.sense_suffix()) else {
            return Ok(DumpOutcome::Skipped);
        };
        let Some(counters) = self.remaining.get_mut(device) else {
            return Ok(DumpOutcome::Skipped);
        };
        if counters[slot] == 0 {
            return Ok(DumpOutcome::Skipped);
        }

        let formatted = match class {
            SignalClass::FrequencyDomain => reformat_fdm(payload),
            _ => reformat_flat(payload),
        };
        let path = self.directory.join(format!("{device}_{suffix}{DUMP_EXT}"));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(formatted.as_bytes())?;

        counters[slot] -= 1;
        if self.remaining.values().flatten().sum::<u32>() == 0 {
            info!("Dumping samples completed.");
            return Ok(DumpOutcome::Completed);
        }
        Ok(DumpOutcome::Dumped)
    }
}

/// Flat payloads (Environmental, TimeDomain): newline after the object.
fn reformat_flat(payload: &str) -> String {
    payload.replace('}', "}\r\n")
}

/// Spectrum payloads: one FFT row per line so the file stays scannable.
fn reformat_fdm(payload: &str) -> String {
    payload
        .replace(":[[", ": [\r\n[")
        .replace("],[", "], \r\n[")
        .replace("]]}", "]\r\n]}\r\n")
}
