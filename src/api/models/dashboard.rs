use super::{round_to, CostedStatsResponse, ReadingResponse};
use crate::models::UsageStats;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCounts {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummaryResponse {
    pub success: bool,
    pub today: CostedStatsResponse,
    pub month: CostedStatsResponse,
    pub latest_reading: Option<ReadingResponse>,
    pub devices: DeviceCounts,
    pub rate: f64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStats {
    pub avg_voltage: f64,
    pub avg_current: f64,
    pub avg_power: f64,
    pub max_power: f64,
    pub min_power: f64,
    pub count: i64,
}

impl From<&UsageStats> for RealtimeStats {
    fn from(stats: &UsageStats) -> Self {
        Self {
            avg_voltage: round_to(stats.avg_voltage, 2),
            avg_current: round_to(stats.avg_current, 3),
            avg_power: round_to(stats.avg_power, 2),
            max_power: round_to(stats.max_power, 2),
            min_power: round_to(stats.min_power, 2),
            count: stats.count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeResponse {
    pub success: bool,
    pub window_secs: i64,
    pub readings: Vec<ReadingResponse>,
    pub stats: RealtimeStats,
}
