use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Load id given to samples whose payload carried a single current value.
pub const DEFAULT_LOAD_ID: &str = "Load1";

/// A persisted telemetry record. Immutable once stored.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Sample {
    pub id: i64,
    pub device_id: String,
    pub load_id: String,
    pub load_name: String,
    #[sqlx(rename = "voltage_v")]
    pub voltage: f64,
    #[sqlx(rename = "current_a")]
    pub current: f64,
    #[sqlx(rename = "power_w")]
    pub power: f64,
    /// Incremental kWh attributed to this sample, not a running total.
    #[sqlx(rename = "energy_kwh")]
    pub energy: f64,
    pub appliance: String,
    pub location: String,
    #[sqlx(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

/// Identifies one integration stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    pub device_id: String,
    pub load_id: String,
}

impl StreamKey {
    pub fn new(device_id: impl Into<String>, load_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            load_id: load_id.into(),
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.load_id)
    }
}

/// A validated per-load reading that has not been integrated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDraft {
    pub device_id: String,
    pub load_id: String,
    pub load_name: String,
    pub voltage: f64,
    pub current: f64,
    /// Recomputed from voltage and current when absent or zero.
    pub power: Option<f64>,
    pub appliance: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

impl SampleDraft {
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.device_id, &self.load_id)
    }
}

/// A fully derived record ready to be handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub device_id: String,
    pub load_id: String,
    pub load_name: String,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub appliance: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

impl NewSample {
    pub fn into_sample(self, id: i64) -> Sample {
        Sample {
            id,
            device_id: self.device_id,
            load_id: self.load_id,
            load_name: self.load_name,
            voltage: self.voltage,
            current: self.current,
            power: self.power,
            energy: self.energy,
            appliance: self.appliance,
            location: self.location,
            timestamp: self.timestamp,
        }
    }
}
