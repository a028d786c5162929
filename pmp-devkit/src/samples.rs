/*!
Builders for well-formed gateway payloads

Produce the exact JSON shapes the gateway publishes (and the threshold
events it consumes), for tests and demo tooling.
*/

use serde_json::{json, Value};

/// `{"Humidity":…,"Pressure":…,"Temperature":…}`
pub fn environmental(pressure: f64, humidity: f64, temperature: f64) -> Value {
    json!({
        "Pressure": pressure,
        "Humidity": humidity,
        "Temperature": temperature,
    })
}

/// `{"Peak_Acceleration":…,"RMS_Speed":…}`
pub fn time_domain(rms_speed: f64, peak_acceleration: f64) -> Value {
    json!({
        "RMS_Speed": rms_speed,
        "Peak_Acceleration": peak_acceleration,
    })
}

/// `{"Ine_FFT":[[freq,x,y,z],…]}`
pub fn frequency_domain(rows: &[[f64; 4]]) -> Value {
    json!({ "Ine_FFT": rows })
}

/// `{"state":{"reported":{…}}}` — the handshake shadow document.
pub fn handshake(device_type: &str, firmware: &str, features: &[&str]) -> Value {
    json!({
        "state": {
            "reported": {
                "Device_Type": device_type,
                "Firmware": firmware,
                "Features": features,
            }
        }
    })
}

/// `{"severity":…,"msg":…,"info":{"value":…}}` — an externally raised alert.
pub fn threshold_event(severity: i64, msg: &str, value: impl Into<Value>) -> Value {
    json!({
        "severity": severity,
        "msg": msg,
        "info": { "value": value.into() },
    })
}
