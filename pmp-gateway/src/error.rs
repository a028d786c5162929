//! Error taxonomy for the gateway
//!
//! Every error here is terminal: setup failures abort before the polling
//! loop starts, steady-state failures end the session. Nothing is retried.

/// Errors raised during gateway setup and polling
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    ConfigInvalid(String),
    #[error("IO-Link setup incomplete: no device on position {position} for \"{name}\"")]
    SetupIncomplete { name: String, position: u8 },
    #[error("client \"{0}\" cannot connect to core")]
    ClientConnectFailed(String),
    #[error("device \"{name}\" unavailable: {reason}")]
    DeviceUnavailable { name: String, reason: String },
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Process exit code for a fatal error.
    ///
    /// Missing/invalid configuration exits 2; every other failure prints
    /// its message and exits 0, matching the demo's contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            GatewayError::ConfigInvalid(_) => 2,
            _ => 0,
        }
    }
}
