pub mod appliances;
pub mod cost;
pub mod dashboard;
pub mod health;
pub mod loads;
pub mod readings;

use crate::error::{AppError, Result};
use crate::models::Period;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

pub type Params = HashMap<String, String>;

pub const DEFAULT_LIMIT: i64 = 200;
pub const MAX_LIMIT: i64 = 1000;

/// Trimmed, non-empty query value.
pub fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

pub fn device_id(params: &Params) -> Option<String> {
    param(params, "deviceId").map(str::to_string)
}

pub fn period(params: &Params) -> Period {
    Period::from_param(param(params, "period"))
}

pub fn number<T: FromStr>(params: &Params, key: &str) -> Result<Option<T>> {
    param(params, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::validation(format!("{} must be a number, got {:?}", key, raw)))
        })
        .transpose()
}

pub fn timestamp(params: &Params, key: &str) -> Result<Option<DateTime<Utc>>> {
    param(params, key)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    AppError::validation(format!("{} must be an RFC 3339 timestamp", key))
                })
        })
        .transpose()
}

/// `limit` clamped to 1..=MAX_LIMIT.
pub fn limit(params: &Params) -> Result<i64> {
    limit_or(params, DEFAULT_LIMIT)
}

pub fn limit_or(params: &Params, default: i64) -> Result<i64> {
    Ok(number::<i64>(params, "limit")?
        .unwrap_or(default)
        .clamp(1, MAX_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(limit(&params(&[])).unwrap(), DEFAULT_LIMIT);
        assert_eq!(limit(&params(&[("limit", "5000")])).unwrap(), MAX_LIMIT);
        assert_eq!(limit(&params(&[("limit", "0")])).unwrap(), 1);
        assert!(limit(&params(&[("limit", "many")])).is_err());
        assert_eq!(limit_or(&params(&[]), 100).unwrap(), 100);
        assert_eq!(limit_or(&params(&[("limit", "7")]), 100).unwrap(), 7);
    }

    #[test]
    fn test_blank_params_are_absent() {
        let p = params(&[("deviceId", "  "), ("period", "month")]);
        assert_eq!(device_id(&p), None);
        assert_eq!(period(&p), Period::Month);
    }

    #[test]
    fn test_timestamp_param() {
        let p = params(&[("start", "2024-05-01T00:00:00Z"), ("end", "yesterday")]);
        assert!(timestamp(&p, "start").unwrap().is_some());
        assert!(timestamp(&p, "end").is_err());
        assert!(timestamp(&p, "missing").unwrap().is_none());
    }
}
