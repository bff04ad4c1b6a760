use super::round_to;
use crate::models::Sample;
use crate::services::cost::cost_of;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One stored sample as the frontend sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub id: i64,
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
    pub cost: f64,
}

impl ReadingResponse {
    pub fn from_sample(sample: &Sample, rate: f64) -> Self {
        Self {
            id: sample.id,
            device_id: sample.device_id.clone(),
            load_id: sample.load_id.clone(),
            load_name: sample.load_name.clone(),
            voltage: round_to(sample.voltage, 2),
            current: round_to(sample.current, 3),
            power: round_to(sample.power, 2),
            energy: round_to(sample.energy, 6),
            appliance: sample.appliance.clone(),
            location: sample.location.clone(),
            timestamp: sample.timestamp,
            cost: round_to(cost_of(sample.energy, rate), 4),
        }
    }

    pub fn from_samples(samples: &[Sample], rate: f64) -> Vec<Self> {
        samples
            .iter()
            .map(|s| Self::from_sample(s, rate))
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub count: usize,
    pub readings: Vec<ReadingResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsResponse {
    pub success: bool,
    pub count: usize,
    pub readings: Vec<ReadingResponse>,
}

impl ReadingsResponse {
    pub fn new(readings: Vec<ReadingResponse>) -> Self {
        Self {
            success: true,
            count: readings.len(),
            readings,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReadingResponse {
    pub success: bool,
    pub reading: ReadingResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_rounding() {
        let sample = Sample {
            id: 7,
            device_id: "esp32-1".into(),
            load_id: "Load1".into(),
            load_name: "Load 1".into(),
            voltage: 229.987,
            current: 5.20049,
            power: 1196.0041,
            energy: 0.00166111,
            appliance: "All".into(),
            location: "Home".into(),
            timestamp: Utc::now(),
        };
        let reading = ReadingResponse::from_sample(&sample, 3.0);
        assert_eq!(reading.voltage, 229.99);
        assert_eq!(reading.current, 5.2);
        assert_eq!(reading.power, 1196.0);
        assert_eq!(reading.energy, 0.001661);
        assert_eq!(reading.cost, 0.005);

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["deviceId"], "esp32-1");
        assert_eq!(json["loadName"], "Load 1");
    }
}
