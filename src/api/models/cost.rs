use super::round_to;
use crate::models::{Period, TimeRange};
use crate::services::{Comparison, CostReport, Prediction, Trend};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostResponse {
    pub success: bool,
    pub period: Period,
    pub range: TimeRange,
    pub total_energy: f64,
    pub total_cost: f64,
    pub avg_power: f64,
    pub max_power: f64,
    pub rate: f64,
    pub currency: String,
}

impl CostResponse {
    pub fn new(report: &CostReport, currency: &str) -> Self {
        Self {
            success: true,
            period: report.period,
            range: report.range,
            total_energy: round_to(report.stats.total_energy, 3),
            total_cost: round_to(report.total_cost, 2),
            avg_power: round_to(report.stats.avg_power, 2),
            max_power: round_to(report.stats.max_power, 2),
            rate: report.rate,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub success: bool,
    pub period: Period,
    pub current_energy: f64,
    pub current_cost: f64,
    pub predicted_energy: f64,
    pub predicted_cost: f64,
    /// Percent of the period elapsed.
    pub progress: f64,
    pub rate: f64,
    pub currency: String,
}

impl PredictionResponse {
    pub fn new(prediction: &Prediction, currency: &str) -> Self {
        Self {
            success: true,
            period: prediction.period,
            current_energy: round_to(prediction.current_energy, 3),
            current_cost: round_to(prediction.current_cost, 2),
            predicted_energy: round_to(prediction.predicted_energy, 3),
            predicted_cost: round_to(prediction.predicted_cost, 2),
            progress: round_to(prediction.progress * 100.0, 2),
            rate: prediction.rate,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodCost {
    pub range: TimeRange,
    pub total_energy: f64,
    pub total_cost: f64,
}

impl From<&CostReport> for PeriodCost {
    fn from(report: &CostReport) -> Self {
        Self {
            range: report.range,
            total_energy: round_to(report.stats.total_energy, 3),
            total_cost: round_to(report.total_cost, 2),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    pub success: bool,
    pub period: Period,
    pub current: PeriodCost,
    pub previous: PeriodCost,
    pub difference: f64,
    pub percentage_change: f64,
    pub trend: Trend,
    pub rate: f64,
    pub currency: String,
}

impl ComparisonResponse {
    pub fn new(comparison: &Comparison, currency: &str) -> Self {
        Self {
            success: true,
            period: comparison.period,
            current: (&comparison.current).into(),
            previous: (&comparison.previous).into(),
            difference: round_to(comparison.delta.difference, 2),
            percentage_change: round_to(comparison.delta.percentage_change, 2),
            trend: comparison.delta.trend,
            rate: comparison.current.rate,
            currency: currency.to_string(),
        }
    }
}
