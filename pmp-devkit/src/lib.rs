/*!
# PMP DevKit - Stubs and utilities for gateway development

Library easing development and testing of the gateway without hardware
or a broker:
- Recording publish sink standing in for the cloud MQTT client
- Builders for well-formed sensor and event payloads
*/

pub mod samples;
pub mod sink_stub;

pub use sink_stub::{RecordingSink, SinkRecord};
