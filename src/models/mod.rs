pub mod sample;
pub mod usage;
pub mod window;

pub use sample::{NewSample, Sample, SampleDraft, StreamKey, DEFAULT_LOAD_ID};
pub use usage::{GroupBy, GroupKey, GroupRow, SampleFilter, SortOrder, UsageStats};
pub use window::{Period, TimeRange, Window};
