use super::{round_to, ReadingResponse};
use crate::models::{GroupKey, GroupRow, Period, TimeRange, UsageStats};
use crate::services::cost::cost_of;
use crate::services::ShareRow;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_energy: f64,
    pub avg_power: f64,
    pub max_power: f64,
    pub min_power: f64,
    pub avg_voltage: f64,
    pub avg_current: f64,
    pub count: i64,
}

impl From<&UsageStats> for StatsResponse {
    fn from(stats: &UsageStats) -> Self {
        Self {
            total_energy: round_to(stats.total_energy, 3),
            avg_power: round_to(stats.avg_power, 2),
            max_power: round_to(stats.max_power, 2),
            min_power: round_to(stats.min_power, 2),
            avg_voltage: round_to(stats.avg_voltage, 2),
            avg_current: round_to(stats.avg_current, 3),
            count: stats.count,
        }
    }
}

/// Stats plus their cost at a given rate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostedStatsResponse {
    #[serde(flatten)]
    pub stats: StatsResponse,
    pub cost: f64,
}

impl CostedStatsResponse {
    pub fn new(stats: &UsageStats, rate: f64) -> Self {
        Self {
            stats: stats.into(),
            cost: round_to(cost_of(stats.total_energy, rate), 2),
        }
    }
}

/// One hour/day/month bucket of a time series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketResponse {
    pub bucket: u32,
    #[serde(flatten)]
    pub stats: CostedStatsResponse,
}

impl BucketResponse {
    pub fn from_rows(rows: &[GroupRow], rate: f64) -> Vec<Self> {
        rows.iter()
            .filter_map(|row| match row.key {
                GroupKey::Bucket(bucket) => Some(Self {
                    bucket,
                    stats: CostedStatsResponse::new(&row.stats, rate),
                }),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayResponse {
    pub success: bool,
    pub period: Period,
    pub range: TimeRange,
    pub summary: CostedStatsResponse,
    pub hourly: Vec<BucketResponse>,
    pub readings: Vec<ReadingResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthResponse {
    pub success: bool,
    pub year: i32,
    pub month: u32,
    pub range: TimeRange,
    pub summary: CostedStatsResponse,
    pub daily: Vec<BucketResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearResponse {
    pub success: bool,
    pub year: i32,
    pub range: TimeRange,
    pub summary: CostedStatsResponse,
    pub monthly: Vec<BucketResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceShareResponse {
    pub appliance: String,
    pub total_energy: f64,
    pub avg_power: f64,
    pub max_power: f64,
    pub count: i64,
    pub percentage: f64,
    pub cost: f64,
}

impl ApplianceShareResponse {
    pub fn new(row: &ShareRow, rate: f64) -> Self {
        Self {
            appliance: label(&row.key),
            total_energy: round_to(row.stats.total_energy, 3),
            avg_power: round_to(row.stats.avg_power, 2),
            max_power: round_to(row.stats.max_power, 2),
            count: row.stats.count,
            percentage: round_to(row.percentage, 2),
            cost: round_to(cost_of(row.stats.total_energy, rate), 2),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceBreakdownResponse {
    pub success: bool,
    pub period: Period,
    pub total_energy: f64,
    pub total_cost: f64,
    pub appliances: Vec<ApplianceShareResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceDetailResponse {
    pub success: bool,
    pub appliance: String,
    pub period: Period,
    pub stats: CostedStatsResponse,
    pub count: usize,
    pub readings: Vec<ReadingResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummaryRow {
    pub load_id: String,
    pub load_name: String,
    #[serde(flatten)]
    pub stats: CostedStatsResponse,
    pub percentage: f64,
}

impl LoadSummaryRow {
    pub fn new(row: &ShareRow, rate: f64) -> Self {
        let load_id = label(&row.key);
        Self {
            load_name: row.load_name.clone().unwrap_or_else(|| load_id.clone()),
            load_id,
            stats: CostedStatsResponse::new(&row.stats, rate),
            percentage: round_to(row.percentage, 2),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummaryResponse {
    pub success: bool,
    pub period: Period,
    pub total_energy: f64,
    pub total_cost: f64,
    pub loads: Vec<LoadSummaryRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReadingsResponse {
    pub success: bool,
    pub load_id: String,
    pub period: Period,
    pub count: usize,
    pub readings: Vec<ReadingResponse>,
}

fn label(key: &GroupKey) -> String {
    match key {
        GroupKey::All => "all".to_string(),
        GroupKey::Label(s) => s.clone(),
        GroupKey::Bucket(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_stats_serialize_as_zeros() {
        let stats = StatsResponse::from(&UsageStats::default());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalEnergy"], json!(0.0));
        assert_eq!(json["avgPower"], json!(0.0));
        assert_eq!(json["maxPower"], json!(0.0));
        assert_eq!(json["count"], json!(0));
    }

    #[test]
    fn test_bucket_flattens_stats() {
        let rows = vec![
            GroupRow {
                key: GroupKey::Bucket(14),
                load_name: None,
                stats: UsageStats {
                    total_energy: 1.23456,
                    count: 2,
                    ..Default::default()
                },
            },
            GroupRow {
                key: GroupKey::All,
                load_name: None,
                stats: UsageStats::default(),
            },
        ];
        let buckets = BucketResponse::from_rows(&rows, 2.0);
        assert_eq!(buckets.len(), 1);

        let json = serde_json::to_value(&buckets[0]).unwrap();
        assert_eq!(json["bucket"], json!(14));
        assert_eq!(json["totalEnergy"], json!(1.235));
        assert_eq!(json["cost"], json!(2.47));
        assert_eq!(json["count"], json!(2));
    }
}
