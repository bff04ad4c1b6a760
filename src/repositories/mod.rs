pub mod memory;
pub mod samples;

pub use memory::InMemorySampleStore;
pub use samples::PgSampleRepository;

use crate::error::Result;
use crate::models::{GroupBy, GroupRow, NewSample, Sample, SampleFilter, SortOrder, StreamKey};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

/// Datastore boundary. Implementations hold no business logic: power and
/// energy arrive already derived.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Most recent sample of the stream strictly before `before`.
    async fn latest_before(
        &self,
        key: &StreamKey,
        before: DateTime<Utc>,
    ) -> Result<Option<Sample>>;

    /// Persist all samples or none of them.
    async fn insert_many(&self, samples: Vec<NewSample>) -> Result<Vec<Sample>>;

    async fn find(
        &self,
        filter: &SampleFilter,
        order: SortOrder,
        limit: Option<i64>,
    ) -> Result<Vec<Sample>>;

    /// One row per non-empty group, ordered by key. Without a grouping the
    /// result holds at most one row keyed `GroupKey::All`.
    async fn aggregate(
        &self,
        filter: &SampleFilter,
        group_by: Option<GroupBy>,
        offset: FixedOffset,
    ) -> Result<Vec<GroupRow>>;

    async fn distinct_devices(&self, filter: &SampleFilter) -> Result<Vec<String>>;

    async fn delete_all(&self) -> Result<u64>;
}
