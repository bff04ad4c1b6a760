use super::SampleStore;
use crate::error::Result;
use crate::models::{GroupBy, GroupRow, NewSample, Sample, SampleFilter, SortOrder, StreamKey};
use crate::services::aggregation::aggregate_samples;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeSet;
use tokio::sync::RwLock;

/// Process-local store used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct InMemorySampleStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    samples: Vec<Sample>,
    next_id: i64,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.samples.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SampleStore for InMemorySampleStore {
    async fn latest_before(
        &self,
        key: &StreamKey,
        before: DateTime<Utc>,
    ) -> Result<Option<Sample>> {
        let inner = self.inner.read().await;
        Ok(inner
            .samples
            .iter()
            .filter(|s| {
                s.device_id == key.device_id && s.load_id == key.load_id && s.timestamp < before
            })
            .max_by_key(|s| (s.timestamp, s.id))
            .cloned())
    }

    async fn insert_many(&self, samples: Vec<NewSample>) -> Result<Vec<Sample>> {
        let mut inner = self.inner.write().await;
        let mut stored = Vec::with_capacity(samples.len());
        for sample in samples {
            inner.next_id += 1;
            let sample = sample.into_sample(inner.next_id);
            inner.samples.push(sample.clone());
            stored.push(sample);
        }
        Ok(stored)
    }

    async fn find(
        &self,
        filter: &SampleFilter,
        order: SortOrder,
        limit: Option<i64>,
    ) -> Result<Vec<Sample>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Sample> = inner
            .samples
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();

        found.sort_by_key(|s| (s.timestamp, s.id));
        if order == SortOrder::Descending {
            found.reverse();
        }
        if let Some(limit) = limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn aggregate(
        &self,
        filter: &SampleFilter,
        group_by: Option<GroupBy>,
        offset: FixedOffset,
    ) -> Result<Vec<GroupRow>> {
        let inner = self.inner.read().await;
        Ok(aggregate_samples(
            inner.samples.iter().filter(|s| filter.matches(s)),
            group_by,
            offset,
        ))
    }

    async fn distinct_devices(&self, filter: &SampleFilter) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let devices: BTreeSet<String> = inner
            .samples
            .iter()
            .filter(|s| filter.matches(s))
            .map(|s| s.device_id.clone())
            .collect();
        Ok(devices.into_iter().collect())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let deleted = inner.samples.len() as u64;
        inner.samples.clear();
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn new_sample(load_id: &str, ts: DateTime<Utc>, power: f64) -> NewSample {
        NewSample {
            device_id: "esp32-1".into(),
            load_id: load_id.into(),
            load_name: load_id.into(),
            voltage: 230.0,
            current: power / 230.0,
            power,
            energy: 0.001,
            appliance: "All".into(),
            location: "Home".into(),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn test_latest_before_is_per_stream_and_strict() {
        let store = InMemorySampleStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        store
            .insert_many(vec![
                new_sample("Load1", t0, 100.0),
                new_sample("Load1", t0 + Duration::minutes(1), 200.0),
                new_sample("Load2", t0 + Duration::minutes(2), 300.0),
            ])
            .await
            .unwrap();

        let key = StreamKey::new("esp32-1", "Load1");
        let latest = store
            .latest_before(&key, t0 + Duration::minutes(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.power, 200.0);

        let strict = store
            .latest_before(&key, t0 + Duration::minutes(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(strict.power, 100.0);

        assert!(store.latest_before(&key, t0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_order_and_limit() {
        let store = InMemorySampleStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        for i in 0..5 {
            store
                .insert_many(vec![new_sample("Load1", t0 + Duration::minutes(i), i as f64)])
                .await
                .unwrap();
        }

        let newest = store
            .find(&SampleFilter::default(), SortOrder::Descending, Some(2))
            .await
            .unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].power, 4.0);
        assert_eq!(newest[1].power, 3.0);

        let oldest = store
            .find(&SampleFilter::default(), SortOrder::Ascending, None)
            .await
            .unwrap();
        assert_eq!(oldest.first().unwrap().power, 0.0);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = InMemorySampleStore::new();
        let t0 = Utc::now();
        store
            .insert_many(vec![new_sample("Load1", t0, 1.0), new_sample("Load2", t0, 1.0)])
            .await
            .unwrap();
        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.is_empty().await);
    }
}
