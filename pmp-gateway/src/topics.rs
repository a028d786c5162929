//! MQTT topic constants shared across the gateway

// Cloud's default shadow topics.
pub const AWS_HEADER: &str = "$aws/things";
pub const SHADOW_GET: &str = "shadow/get";
pub const SHADOW_UPDATE: &str = "shadow/update";

// Custom topics for predictive maintenance data.
pub const HEADER: &str = "pm";
pub const PROTOCOL: &str = "v2";
pub const SENSE: &str = "sense";
pub const ENVIRONMENTAL: &str = "environmental";
pub const INERTIAL_TDM: &str = "inertial_tdm";
pub const INERTIAL_FDM: &str = "inertial_fdm";
pub const EVENTS: &str = "events";
pub const THRESHOLD: &str = "threshold";

/// `pm/<device>/sense/<suffix>` — outbound sensor data.
pub fn sense_topic(device: &str, suffix: &str) -> String {
    format!("{HEADER}/{device}/{SENSE}/{suffix}")
}

/// `$aws/things/<device>/shadow/{get,update}` — cloud shadow operations.
pub fn shadow_topic(device: &str, operation: &str) -> String {
    format!("{AWS_HEADER}/{device}/{operation}")
}

/// `pm/<device>/v2/events/threshold` — externally raised alerts, consumed only.
pub fn threshold_topic(device: &str) -> String {
    format!("{HEADER}/{device}/{PROTOCOL}/{EVENTS}/{THRESHOLD}")
}
