use crate::error::Result;
use crate::models::{
    GroupBy, GroupKey, GroupRow, Sample, SampleFilter, UsageStats, Window,
};
use crate::repositories::SampleStore;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Scope of an aggregate query before the window is resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageQuery {
    pub window: Window,
    pub device_id: Option<String>,
}

impl UsageQuery {
    pub fn new(window: impl Into<Window>, device_id: Option<String>) -> Self {
        Self {
            window: window.into(),
            device_id,
        }
    }

    pub fn filter(&self, now: DateTime<Utc>, offset: FixedOffset) -> SampleFilter {
        SampleFilter::for_device(self.device_id.clone())
            .within(self.window.resolve(now, offset))
    }
}

/// A group's stats together with its share of the window's total energy.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareRow {
    pub key: GroupKey,
    pub load_name: Option<String>,
    pub stats: UsageStats,
    /// Percent of total energy, 0 when the total is 0.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Breakdown {
    pub rows: Vec<ShareRow>,
    pub total_energy: f64,
}

/// Windowed rollups over the sample store.
#[derive(Clone)]
pub struct UsageService {
    store: Arc<dyn SampleStore>,
    offset: FixedOffset,
}

impl UsageService {
    pub fn new(store: Arc<dyn SampleStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Ungrouped stats; an empty window yields all zeros.
    pub async fn summary(&self, query: &UsageQuery, now: DateTime<Utc>) -> Result<UsageStats> {
        self.summary_for(&query.filter(now, self.offset)).await
    }

    pub async fn summary_for(&self, filter: &SampleFilter) -> Result<UsageStats> {
        let rows = self.store.aggregate(filter, None, self.offset).await?;
        Ok(rows.into_iter().next().map(|r| r.stats).unwrap_or_default())
    }

    /// One row per non-empty group, ordered by group key.
    pub async fn grouped(
        &self,
        query: &UsageQuery,
        group_by: GroupBy,
        now: DateTime<Utc>,
    ) -> Result<Vec<GroupRow>> {
        self.grouped_for(&query.filter(now, self.offset), group_by)
            .await
    }

    pub async fn grouped_for(
        &self,
        filter: &SampleFilter,
        group_by: GroupBy,
    ) -> Result<Vec<GroupRow>> {
        self.store.aggregate(filter, Some(group_by), self.offset).await
    }

    /// Per-group share of total energy, largest consumer first.
    pub async fn breakdown(
        &self,
        query: &UsageQuery,
        group_by: GroupBy,
        now: DateTime<Utc>,
    ) -> Result<Breakdown> {
        let rows = self.grouped(query, group_by, now).await?;
        Ok(shares(rows))
    }
}

pub fn shares(rows: Vec<GroupRow>) -> Breakdown {
    let total_energy: f64 = rows.iter().map(|r| r.stats.total_energy).sum();
    let mut rows: Vec<ShareRow> = rows
        .into_iter()
        .map(|r| ShareRow {
            percentage: percentage_of(r.stats.total_energy, total_energy),
            key: r.key,
            load_name: r.load_name,
            stats: r.stats,
        })
        .collect();
    rows.sort_by(|a, b| b.stats.total_energy.total_cmp(&a.stats.total_energy));
    Breakdown { rows, total_energy }
}

pub fn percentage_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

pub fn group_key(sample: &Sample, group_by: Option<GroupBy>, offset: FixedOffset) -> GroupKey {
    let local = || sample.timestamp.with_timezone(&offset);
    match group_by {
        None => GroupKey::All,
        Some(GroupBy::Load) => GroupKey::Label(sample.load_id.clone()),
        Some(GroupBy::Appliance) => GroupKey::Label(sample.appliance.clone()),
        Some(GroupBy::HourOfDay) => GroupKey::Bucket(local().hour()),
        Some(GroupBy::DayOfMonth) => GroupKey::Bucket(local().day()),
        Some(GroupBy::MonthOfYear) => GroupKey::Bucket(local().month()),
    }
}

#[derive(Debug, Default)]
struct UsageAccumulator {
    energy: f64,
    power_sum: f64,
    voltage_sum: f64,
    current_sum: f64,
    max_power: Option<f64>,
    min_power: Option<f64>,
    count: i64,
    latest_name: Option<(DateTime<Utc>, String)>,
}

impl UsageAccumulator {
    fn push(&mut self, sample: &Sample) {
        self.energy += sample.energy;
        self.power_sum += sample.power;
        self.voltage_sum += sample.voltage;
        self.current_sum += sample.current;
        self.max_power = Some(self.max_power.map_or(sample.power, |m| m.max(sample.power)));
        self.min_power = Some(self.min_power.map_or(sample.power, |m| m.min(sample.power)));
        self.count += 1;
        if self
            .latest_name
            .as_ref()
            .map_or(true, |(ts, _)| sample.timestamp >= *ts)
        {
            self.latest_name = Some((sample.timestamp, sample.load_name.clone()));
        }
    }

    fn finish(self, key: GroupKey) -> GroupRow {
        let n = self.count.max(1) as f64;
        GroupRow {
            key,
            load_name: self.latest_name.map(|(_, name)| name),
            stats: UsageStats {
                total_energy: self.energy,
                avg_power: self.power_sum / n,
                max_power: self.max_power.unwrap_or_default(),
                min_power: self.min_power.unwrap_or_default(),
                avg_voltage: self.voltage_sum / n,
                avg_current: self.current_sum / n,
                count: self.count,
            },
        }
    }
}

/// In-process equivalent of the store's aggregate query.
pub fn aggregate_samples<'a>(
    samples: impl IntoIterator<Item = &'a Sample>,
    group_by: Option<GroupBy>,
    offset: FixedOffset,
) -> Vec<GroupRow> {
    let mut groups: BTreeMap<GroupKey, UsageAccumulator> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(group_key(sample, group_by, offset))
            .or_default()
            .push(sample);
    }
    groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSample, Period};
    use crate::repositories::InMemorySampleStore;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn sample(id: i64, load: &str, appliance: &str, ts: DateTime<Utc>, power: f64, energy: f64) -> Sample {
        Sample {
            id,
            device_id: "esp32-1".into(),
            load_id: load.into(),
            load_name: format!("{} name", load),
            voltage: 230.0,
            current: power / 230.0,
            power,
            energy,
            appliance: appliance.into(),
            location: "Home".into(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_aggregate_samples_empty() {
        let rows = aggregate_samples(Vec::<&Sample>::new(), None, utc());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_aggregate_samples_totals() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let samples = vec![
            sample(1, "Load1", "Lighting", t0, 100.0, 0.5),
            sample(2, "Load1", "Lighting", t0 + Duration::hours(1), 300.0, 0.2),
            sample(3, "Load2", "Other", t0 + Duration::hours(2), 200.0, 0.3),
        ];
        let rows = aggregate_samples(&samples, None, utc());
        assert_eq!(rows.len(), 1);
        let stats = rows[0].stats;
        assert!((stats.total_energy - 1.0).abs() < 1e-12);
        assert_eq!(stats.avg_power, 200.0);
        assert_eq!(stats.max_power, 300.0);
        assert_eq!(stats.min_power, 100.0);
        assert_eq!(stats.count, 3);
        assert_eq!(rows[0].key, GroupKey::All);
    }

    #[test]
    fn test_aggregate_samples_by_hour_uses_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let samples = vec![
            sample(1, "Load1", "All", t0, 100.0, 0.1),
            sample(2, "Load1", "All", t0 + Duration::minutes(10), 100.0, 0.1),
            sample(3, "Load1", "All", t0 + Duration::minutes(40), 100.0, 0.1),
        ];
        let rows = aggregate_samples(&samples, Some(GroupBy::HourOfDay), ist);
        let keys: Vec<GroupKey> = rows.iter().map(|r| r.key.clone()).collect();
        // 10:00 and 10:10 UTC are 15:30 and 15:40 IST, 10:40 UTC is 16:10 IST.
        assert_eq!(keys, vec![GroupKey::Bucket(15), GroupKey::Bucket(16)]);
        assert_eq!(rows[0].stats.count, 2);
    }

    #[test]
    fn test_load_name_is_most_recent() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut older = sample(1, "Load1", "All", t0, 1.0, 0.0);
        older.load_name = "Fan".into();
        let mut newer = sample(2, "Load1", "All", t0 + Duration::minutes(1), 1.0, 0.0);
        newer.load_name = "Ceiling fan".into();
        let rows = aggregate_samples(vec![&newer, &older], Some(GroupBy::Load), utc());
        assert_eq!(rows[0].load_name.as_deref(), Some("Ceiling fan"));
    }

    #[test]
    fn test_shares_sum_to_hundred() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let samples = vec![
            sample(1, "Load1", "Lighting", t0, 100.0, 0.123),
            sample(2, "Load1", "Refrigeration", t0, 100.0, 0.456),
            sample(3, "Load1", "Other", t0, 100.0, 0.789),
        ];
        let breakdown = shares(aggregate_samples(&samples, Some(GroupBy::Appliance), utc()));
        let sum: f64 = breakdown.rows.iter().map(|r| r.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(breakdown.rows[0].key, GroupKey::Label("Other".into()));
    }

    #[test]
    fn test_shares_zero_total() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let samples = vec![sample(1, "Load1", "Lighting", t0, 0.0, 0.0)];
        let breakdown = shares(aggregate_samples(&samples, Some(GroupBy::Appliance), utc()));
        assert_eq!(breakdown.rows[0].percentage, 0.0);
        assert!(!breakdown.rows[0].percentage.is_nan());
    }

    #[tokio::test]
    async fn test_summary_of_empty_window_is_zero() {
        let store = Arc::new(InMemorySampleStore::new());
        let service = UsageService::new(store, utc());
        let stats = service
            .summary(&UsageQuery::new(Period::Today, None), Utc::now())
            .await
            .unwrap();
        assert_eq!(stats, UsageStats::default());
    }

    #[tokio::test]
    async fn test_summary_respects_window_and_device() {
        let store = Arc::new(InMemorySampleStore::new());
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let new = |device: &str, ts: DateTime<Utc>, energy: f64| NewSample {
            device_id: device.into(),
            load_id: "Load1".into(),
            load_name: "Load 1".into(),
            voltage: 230.0,
            current: 1.0,
            power: 230.0,
            energy,
            appliance: "All".into(),
            location: "Home".into(),
            timestamp: ts,
        };
        store
            .insert_many(vec![
                new("a", now - Duration::hours(1), 1.0),
                new("a", now - Duration::days(2), 2.0),
                new("b", now - Duration::hours(2), 4.0),
            ])
            .await
            .unwrap();

        let service = UsageService::new(store, utc());
        let today = service
            .summary(&UsageQuery::new(Period::Today, Some("a".into())), now)
            .await
            .unwrap();
        assert_eq!(today.total_energy, 1.0);
        assert_eq!(today.count, 1);

        let month = service
            .summary(&UsageQuery::new(Period::Month, None), now)
            .await
            .unwrap();
        assert_eq!(month.total_energy, 7.0);
    }
}
