use super::sample::Sample;
use super::window::TimeRange;
use serde::{Deserialize, Serialize};

/// Row selection shared by every store query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFilter {
    pub device_id: Option<String>,
    pub load_id: Option<String>,
    pub appliance: Option<String>,
    pub range: Option<TimeRange>,
}

impl SampleFilter {
    pub fn for_device(device_id: Option<String>) -> Self {
        Self {
            device_id,
            ..Default::default()
        }
    }

    pub fn within(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.device_id.as_deref().map_or(true, |d| d == sample.device_id)
            && self.load_id.as_deref().map_or(true, |l| l == sample.load_id)
            && self.appliance.as_deref().map_or(true, |a| a == sample.appliance)
            && self.range.map_or(true, |r| r.contains(sample.timestamp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Grouping dimension for aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupBy {
    Load,
    Appliance,
    HourOfDay,
    DayOfMonth,
    MonthOfYear,
}

impl GroupBy {
    pub fn is_time_bucket(&self) -> bool {
        matches!(
            self,
            GroupBy::HourOfDay | GroupBy::DayOfMonth | GroupBy::MonthOfYear
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    All,
    Label(String),
    Bucket(u32),
}

/// Aggregates over one group of samples. All zero for an empty group.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UsageStats {
    pub total_energy: f64,
    pub avg_power: f64,
    pub max_power: f64,
    pub min_power: f64,
    pub avg_voltage: f64,
    pub avg_current: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: GroupKey,
    /// Most recent load name seen in the group.
    pub load_name: Option<String>,
    pub stats: UsageStats,
}
