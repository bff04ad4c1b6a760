use crate::config::PricingConfig;
use crate::error::{AppError, Result};
use crate::models::{Period, TimeRange, UsageStats};
use crate::services::aggregation::{UsageQuery, UsageService};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increased,
    Decreased,
    Same,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostReport {
    pub period: Period,
    pub range: TimeRange,
    pub stats: UsageStats,
    pub rate: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub period: Period,
    pub current_energy: f64,
    pub current_cost: f64,
    pub predicted_energy: f64,
    pub predicted_cost: f64,
    /// Fraction of the period elapsed, 0..=1.
    pub progress: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostDelta {
    pub difference: f64,
    pub percentage_change: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub period: Period,
    pub current: CostReport,
    pub previous: CostReport,
    pub delta: CostDelta,
}

pub fn cost_of(energy_kwh: f64, rate: f64) -> f64 {
    energy_kwh * rate
}

/// Fraction of `total` covered by `elapsed`, clamped to 0..=1.
pub fn progress_ratio(elapsed: Duration, total: Duration) -> f64 {
    let total_ms = total.num_milliseconds();
    if total_ms <= 0 {
        return 0.0;
    }
    (elapsed.num_milliseconds() as f64 / total_ms as f64).clamp(0.0, 1.0)
}

/// Linear extrapolation of energy to the end of the period.
/// No progress yields 0 rather than an infinite projection.
pub fn project_energy(current_energy: f64, progress: f64) -> f64 {
    if progress > 0.0 {
        current_energy / progress
    } else {
        0.0
    }
}

pub fn compare_costs(current: f64, previous: f64) -> CostDelta {
    let difference = current - previous;
    let percentage_change = if previous != 0.0 {
        difference / previous * 100.0
    } else {
        0.0
    };
    let trend = if current > previous {
        Trend::Increased
    } else if current < previous {
        Trend::Decreased
    } else {
        Trend::Same
    };
    CostDelta {
        difference,
        percentage_change,
        trend,
    }
}

/// Turns energy rollups into money using the configured rate.
#[derive(Clone)]
pub struct CostService {
    usage: UsageService,
    pricing: PricingConfig,
}

impl CostService {
    pub fn new(usage: UsageService, pricing: PricingConfig) -> Self {
        Self { usage, pricing }
    }

    pub fn currency(&self) -> &str {
        &self.pricing.currency
    }

    /// The configured rate unless the caller supplied a valid override.
    pub fn rate(&self, rate_override: Option<f64>) -> Result<f64> {
        match rate_override {
            None => Ok(self.pricing.rate),
            Some(r) if r.is_finite() && r >= 0.0 => Ok(r),
            Some(r) => Err(AppError::validation(format!(
                "rate must be a non-negative number, got {}",
                r
            ))),
        }
    }

    pub async fn report(
        &self,
        period: Period,
        device_id: Option<String>,
        rate_override: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<CostReport> {
        let rate = self.rate(rate_override)?;
        let range = period.to_date(now, self.usage.offset());
        self.report_for(period, range, device_id, rate).await
    }

    async fn report_for(
        &self,
        period: Period,
        range: TimeRange,
        device_id: Option<String>,
        rate: f64,
    ) -> Result<CostReport> {
        let stats = self
            .usage
            .summary(&UsageQuery::new(range, device_id), range.end)
            .await?;
        Ok(CostReport {
            period,
            range,
            total_cost: cost_of(stats.total_energy, rate),
            stats,
            rate,
        })
    }

    pub async fn predict(
        &self,
        period: Period,
        device_id: Option<String>,
        rate_override: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Prediction> {
        let report = self.report(period, device_id, rate_override, now).await?;
        let (elapsed, total) = period.progress(now, self.usage.offset());
        let progress = progress_ratio(elapsed, total);
        let predicted_energy = project_energy(report.stats.total_energy, progress);

        Ok(Prediction {
            period,
            current_energy: report.stats.total_energy,
            current_cost: report.total_cost,
            predicted_energy,
            predicted_cost: cost_of(predicted_energy, report.rate),
            progress,
            rate: report.rate,
        })
    }

    /// Current period to date against the whole previous period.
    pub async fn compare(
        &self,
        period: Period,
        device_id: Option<String>,
        rate_override: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Comparison> {
        let rate = self.rate(rate_override)?;
        let offset = self.usage.offset();
        let current = self
            .report_for(period, period.to_date(now, offset), device_id.clone(), rate)
            .await?;
        let previous = self
            .report_for(period, period.previous(now, offset), device_id, rate)
            .await?;
        let delta = compare_costs(current.total_cost, previous.total_cost);

        Ok(Comparison {
            period,
            current,
            previous,
            delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSample;
    use crate::repositories::{InMemorySampleStore, SampleStore};
    use chrono::{FixedOffset, TimeZone};
    use std::sync::Arc;

    fn service(store: Arc<InMemorySampleStore>) -> CostService {
        let usage = UsageService::new(store, FixedOffset::east_opt(0).unwrap());
        CostService::new(usage, PricingConfig::default())
    }

    fn sample(ts: DateTime<Utc>, energy: f64) -> NewSample {
        NewSample {
            device_id: "esp32-1".into(),
            load_id: "Load1".into(),
            load_name: "Load 1".into(),
            voltage: 230.0,
            current: 1.0,
            power: 230.0,
            energy,
            appliance: "All".into(),
            location: "Home".into(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_project_energy() {
        assert_eq!(project_energy(10.0, 0.5), 20.0);
        assert_eq!(project_energy(10.0, 0.0), 0.0);
        assert_eq!(project_energy(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(progress_ratio(Duration::hours(6), Duration::hours(24)), 0.25);
        assert_eq!(progress_ratio(Duration::zero(), Duration::hours(24)), 0.0);
        assert_eq!(progress_ratio(Duration::hours(1), Duration::zero()), 0.0);
    }

    #[test]
    fn test_compare_costs() {
        let up = compare_costs(15.0, 10.0);
        assert_eq!(up.difference, 5.0);
        assert_eq!(up.percentage_change, 50.0);
        assert_eq!(up.trend, Trend::Increased);

        let down = compare_costs(5.0, 10.0);
        assert_eq!(down.trend, Trend::Decreased);
        assert_eq!(down.percentage_change, -50.0);

        let same = compare_costs(3.0, 3.0);
        assert_eq!(same.trend, Trend::Same);

        let from_zero = compare_costs(4.0, 0.0);
        assert_eq!(from_zero.percentage_change, 0.0);
        assert_eq!(from_zero.trend, Trend::Increased);
    }

    #[test]
    fn test_rate_override() {
        let svc = service(Arc::new(InMemorySampleStore::new()));
        assert_eq!(svc.rate(None).unwrap(), 3.0);
        assert_eq!(svc.rate(Some(0.12)).unwrap(), 0.12);
        assert!(matches!(svc.rate(Some(-1.0)), Err(AppError::Validation { .. })));
        assert!(svc.rate(Some(f64::NAN)).is_err());
    }

    #[tokio::test]
    async fn test_report_and_prediction() {
        let store = Arc::new(InMemorySampleStore::new());
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 6, 0, 0).unwrap();
        store
            .insert_many(vec![
                sample(now - Duration::hours(2), 1.5),
                sample(now - Duration::hours(1), 0.5),
            ])
            .await
            .unwrap();
        let svc = service(store);

        let report = svc.report(Period::Today, None, None, now).await.unwrap();
        assert_eq!(report.stats.total_energy, 2.0);
        assert_eq!(report.total_cost, 6.0);

        let prediction = svc.predict(Period::Today, None, None, now).await.unwrap();
        assert_eq!(prediction.progress, 0.25);
        assert_eq!(prediction.predicted_energy, 8.0);
        assert_eq!(prediction.predicted_cost, 24.0);
    }

    #[tokio::test]
    async fn test_prediction_at_period_start_is_zero() {
        let store = Arc::new(InMemorySampleStore::new());
        let midnight = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        store.insert_many(vec![sample(midnight, 1.0)]).await.unwrap();

        let prediction = service(store)
            .predict(Period::Today, None, None, midnight)
            .await
            .unwrap();
        assert_eq!(prediction.current_energy, 1.0);
        assert_eq!(prediction.predicted_energy, 0.0);
        assert!(prediction.predicted_cost.is_finite());
    }

    #[tokio::test]
    async fn test_compare_against_yesterday() {
        let store = Arc::new(InMemorySampleStore::new());
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        store
            .insert_many(vec![
                sample(now - Duration::hours(1), 3.0),
                sample(now - Duration::hours(20), 1.0),
                sample(now - Duration::hours(30), 1.0),
            ])
            .await
            .unwrap();

        let comparison = service(store)
            .compare(Period::Today, None, Some(2.0), now)
            .await
            .unwrap();
        assert_eq!(comparison.current.total_cost, 6.0);
        assert_eq!(comparison.previous.total_cost, 4.0);
        assert_eq!(comparison.delta.difference, 2.0);
        assert_eq!(comparison.delta.percentage_change, 50.0);
        assert_eq!(comparison.delta.trend, Trend::Increased);
    }
}
