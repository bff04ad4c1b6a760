use crate::config::IngestConfig;
use crate::error::{AppError, Result};
use crate::models::{Sample, SampleDraft, DEFAULT_LOAD_ID};
use crate::services::integrator::EnergyIntegrator;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Raw telemetry as sent by a sensor node.
///
/// Current channels arrive as `sensor1..sensorN` keys, a `sensors` array,
/// or a single `current` value, checked in that order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryPayload {
    device_id: Option<Value>,
    voltage: Option<Value>,
    current: Option<Value>,
    sensors: Option<Vec<Value>>,
    load_names: Option<Vec<Value>>,
    appliance: Option<String>,
    location: Option<String>,
    timestamp: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// One current channel before validation. `index` is the 1-based load
/// number the channel feeds.
struct Channel {
    index: usize,
    field: String,
    value: Value,
}

impl Channel {
    fn load_id(&self) -> String {
        if self.index == 1 {
            DEFAULT_LOAD_ID.to_string()
        } else {
            format!("Load{}", self.index)
        }
    }
}

impl TelemetryPayload {
    /// Channels ordered by load number. `sensorN` keys feed `LoadN`, so a
    /// missing channel never shifts the others onto another stream.
    fn channels(&self, body: &Value) -> Result<Vec<Channel>> {
        let mut numbered: Vec<Channel> = Vec::new();
        for (key, value) in &self.extra {
            let Some(index) = key
                .strip_prefix("sensor")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0)
            else {
                continue;
            };
            if let Some(other) = numbered.iter().find(|c| c.index == index) {
                return Err(AppError::invalid_payload(
                    format!("{} and {} name the same load", other.field, key),
                    body,
                ));
            }
            numbered.push(Channel {
                index,
                field: key.clone(),
                value: value.clone(),
            });
        }
        if !numbered.is_empty() {
            numbered.sort_by_key(|c| c.index);
            return Ok(numbered);
        }

        if let Some(sensors) = self.sensors.as_ref().filter(|s| !s.is_empty()) {
            return Ok(sensors
                .iter()
                .enumerate()
                .map(|(i, v)| Channel {
                    index: i + 1,
                    field: format!("sensors[{}]", i),
                    value: v.clone(),
                })
                .collect());
        }

        Ok(match &self.current {
            Some(v) if !v.is_null() => vec![Channel {
                index: 1,
                field: "current".into(),
                value: v.clone(),
            }],
            _ => Vec::new(),
        })
    }

    fn load_name(&self, index: usize) -> String {
        self.load_names
            .as_ref()
            .and_then(|names| names.get(index - 1))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Load {}", index))
    }
}

/// Accepts JSON numbers and numeric strings.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate a telemetry payload and split it into one draft per load.
///
/// Fails with a validation error echoing `body` before anything is stored.
pub fn parse_telemetry(
    body: &Value,
    defaults: &IngestConfig,
    received_at: DateTime<Utc>,
) -> Result<Vec<SampleDraft>> {
    if !body.is_object() {
        return Err(AppError::invalid_payload(
            "payload must be a JSON object",
            body,
        ));
    }
    let payload: TelemetryPayload = serde_json::from_value(body.clone())
        .map_err(|e| AppError::invalid_payload(format!("malformed payload: {}", e), body))?;

    let device_id = match &payload.device_id {
        Some(Value::String(s)) => non_empty(Some(s)),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let channels = payload.channels(body)?;
    let device_id = match device_id {
        Some(id) if !channels.is_empty() => id,
        _ => {
            return Err(AppError::invalid_payload(
                "deviceId and at least one current reading are required",
                body,
            ))
        }
    };

    let voltage = match &payload.voltage {
        None | Some(Value::Null) => defaults.default_voltage,
        Some(v) => match as_number(v) {
            Some(volts) if volts >= 0.0 => volts,
            _ => {
                return Err(AppError::invalid_payload(
                    "voltage must be a non-negative number",
                    body,
                ))
            }
        },
    };

    let timestamp = match payload.timestamp.as_deref() {
        None => received_at,
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                AppError::invalid_payload(format!("invalid timestamp: {}", raw), body)
            })?,
    };

    let appliance = non_empty(payload.appliance.as_deref())
        .unwrap_or_else(|| defaults.default_appliance.clone());
    let location = non_empty(payload.location.as_deref())
        .unwrap_or_else(|| defaults.default_location.clone());

    let mut drafts = Vec::with_capacity(channels.len());
    for channel in &channels {
        // AC magnitude sensors: the sign carries no meaning
        let current = as_number(&channel.value).map(f64::abs).ok_or_else(|| {
            AppError::invalid_payload(format!("{} must be numeric", channel.field), body)
        })?;

        let power = voltage * current;
        if !power.is_finite() {
            return Err(AppError::invalid_payload(
                format!("{} gives a power out of range", channel.field),
                body,
            ));
        }

        drafts.push(SampleDraft {
            device_id: device_id.clone(),
            load_id: channel.load_id(),
            load_name: payload.load_name(channel.index),
            voltage,
            current,
            power: Some(power),
            appliance: appliance.clone(),
            location: location.clone(),
            timestamp,
        });
    }

    Ok(drafts)
}

/// Validation, integration and persistence of one telemetry payload as a
/// single logical write.
#[derive(Clone)]
pub struct IngestService {
    integrator: EnergyIntegrator,
    defaults: IngestConfig,
}

impl IngestService {
    pub fn new(integrator: EnergyIntegrator, defaults: IngestConfig) -> Self {
        Self {
            integrator,
            defaults,
        }
    }

    pub async fn ingest(&self, body: &Value, received_at: DateTime<Utc>) -> Result<Vec<Sample>> {
        let drafts = parse_telemetry(body, &self.defaults, received_at)?;
        let samples = self.integrator.integrate_and_store(drafts).await?;

        if let Some(first) = samples.first() {
            info!(
                device_id = %first.device_id,
                loads = samples.len(),
                "readings saved"
            );
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn parse(body: Value) -> Result<Vec<SampleDraft>> {
        parse_telemetry(&body, &IngestConfig::default(), now())
    }

    #[test]
    fn test_dual_sensor_payload() {
        let drafts = parse(json!({
            "deviceId": "esp32-1",
            "sensor1": 5.2,
            "sensor2": 3.8,
            "voltage": 230
        }))
        .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].load_id, "Load1");
        assert_eq!(drafts[0].load_name, "Load 1");
        assert_eq!(drafts[0].power, Some(230.0 * 5.2));
        assert_eq!(drafts[1].load_id, "Load2");
        assert_eq!(drafts[1].power, Some(230.0 * 3.8));
        assert_eq!(drafts[0].timestamp, drafts[1].timestamp);
        assert_eq!(drafts[0].appliance, "All");
        assert_eq!(drafts[0].location, "Home");
    }

    #[test]
    fn test_sensor_keys_are_ordered_numerically() {
        let drafts = parse(json!({
            "deviceId": "esp32-1",
            "sensor10": 1.0,
            "sensor2": 2.0,
            "sensor1": 3.0
        }))
        .unwrap();
        let currents: Vec<f64> = drafts.iter().map(|d| d.current).collect();
        assert_eq!(currents, vec![3.0, 2.0, 1.0]);
        assert_eq!(drafts[2].load_id, "Load10");
        assert_eq!(drafts[2].load_name, "Load 10");
    }

    #[test]
    fn test_sensor_key_number_is_the_load_number() {
        let drafts = parse(json!({
            "deviceId": "esp32-1",
            "sensor2": 1.5,
            "loadNames": ["Kettle", "Fan"]
        }))
        .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].load_id, "Load2");
        assert_eq!(drafts[0].load_name, "Fan");
    }

    #[test]
    fn test_duplicate_sensor_numbers_rejected() {
        let err = parse(json!({ "deviceId": "esp32-1", "sensor01": 1.0, "sensor1": 2.0 }))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("name the same load"));
    }

    #[test]
    fn test_sensor_zero_is_not_a_channel() {
        assert!(matches!(
            parse(json!({ "deviceId": "esp32-1", "sensor0": 1.0 })),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_overflowing_power_rejected() {
        let err = parse(json!({ "deviceId": "d", "voltage": 1e300, "current": 1e300 }))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("power out of range"));
    }

    #[test]
    fn test_single_current_defaults() {
        let drafts = parse(json!({ "deviceId": "esp32-1", "current": "-2.5" })).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].load_id, DEFAULT_LOAD_ID);
        assert_eq!(drafts[0].voltage, 230.0);
        assert_eq!(drafts[0].current, 2.5);
        assert_eq!(drafts[0].power, Some(575.0));
        assert_eq!(drafts[0].timestamp, now());
    }

    #[test]
    fn test_sensors_array_and_load_names() {
        let drafts = parse(json!({
            "deviceId": "esp32-1",
            "sensors": [1.0, 2.0],
            "loadNames": ["Fan", ""],
            "appliance": "Lighting",
            "location": "Kitchen"
        }))
        .unwrap();
        assert_eq!(drafts[0].load_name, "Fan");
        assert_eq!(drafts[1].load_name, "Load 2");
        assert_eq!(drafts[1].appliance, "Lighting");
        assert_eq!(drafts[1].location, "Kitchen");
    }

    #[test]
    fn test_explicit_timestamp() {
        let drafts = parse(json!({
            "deviceId": "esp32-1",
            "current": 1.0,
            "timestamp": "2024-04-30T08:00:00+02:00"
        }))
        .unwrap();
        assert_eq!(drafts[0].timestamp.to_rfc3339(), "2024-04-30T06:00:00+00:00");
    }

    #[test]
    fn test_missing_device_id_echoes_payload() {
        let body = json!({ "sensor1": 1.0 });
        match parse(body.clone()) {
            Err(AppError::Validation { payload, .. }) => assert_eq!(payload, Some(body)),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_currents_rejected() {
        assert!(matches!(
            parse(json!({ "deviceId": "esp32-1" })),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            parse(json!({ "deviceId": "esp32-1", "current": null })),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_non_numeric_current_rejected() {
        let err = parse(json!({ "deviceId": "esp32-1", "sensor1": 1.0, "sensor2": "abc" }))
            .unwrap_err();
        assert!(err.to_string().contains("sensor2 must be numeric"));
        assert!(matches!(
            parse(json!({ "deviceId": "esp32-1", "sensor1": null })),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_invalid_voltage_rejected() {
        assert!(parse(json!({ "deviceId": "d", "current": 1.0, "voltage": -230 })).is_err());
        assert!(parse(json!({ "deviceId": "d", "current": 1.0, "voltage": "mains" })).is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(parse(json!([1, 2, 3])).is_err());
    }
}
