use super::SampleStore;
use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{
    GroupBy, GroupKey, GroupRow, NewSample, Sample, SampleFilter, SortOrder, StreamKey, UsageStats,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{postgres::PgRow, FromRow, Postgres, QueryBuilder, Row};

const SAMPLE_COLUMNS: &str = "id, device_id, load_id, load_name, voltage_v, current_a, \
                              power_w, energy_kwh, appliance, location, ts";

#[derive(Clone)]
pub struct PgSampleRepository {
    pool: DbPool,
}

impl PgSampleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug)]
struct AggregateRow {
    group_key: Option<String>,
    load_name: Option<String>,
    total_energy: f64,
    avg_power: f64,
    max_power: f64,
    min_power: f64,
    avg_voltage: f64,
    avg_current: f64,
    measurement_count: i64,
}

impl<'r> FromRow<'r, PgRow> for AggregateRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            group_key: row.try_get("group_key")?,
            load_name: row.try_get("load_name")?,
            total_energy: row.try_get("total_energy")?,
            avg_power: row.try_get("avg_power")?,
            max_power: row.try_get("max_power")?,
            min_power: row.try_get("min_power")?,
            avg_voltage: row.try_get("avg_voltage")?,
            avg_current: row.try_get("avg_current")?,
            measurement_count: row.try_get("measurement_count")?,
        })
    }
}

impl AggregateRow {
    fn into_group_row(self, group_by: Option<GroupBy>) -> Result<GroupRow> {
        let key = match (group_by, self.group_key) {
            (None, _) | (Some(_), None) => GroupKey::All,
            (Some(g), Some(raw)) if g.is_time_bucket() => {
                GroupKey::Bucket(raw.trim().parse().map_err(|_| {
                    AppError::Integration(format!("unexpected bucket key from storage: {}", raw))
                })?)
            }
            (Some(_), Some(raw)) => GroupKey::Label(raw),
        };
        Ok(GroupRow {
            key,
            load_name: self.load_name,
            stats: UsageStats {
                total_energy: self.total_energy,
                avg_power: self.avg_power,
                max_power: self.max_power,
                min_power: self.min_power,
                avg_voltage: self.avg_voltage,
                avg_current: self.avg_current,
                count: self.measurement_count,
            },
        })
    }
}

/// Append `AND ...` conditions for every set filter field.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &SampleFilter) {
    if let Some(device_id) = &filter.device_id {
        qb.push(" AND device_id = ").push_bind(device_id.clone());
    }
    if let Some(load_id) = &filter.load_id {
        qb.push(" AND load_id = ").push_bind(load_id.clone());
    }
    if let Some(appliance) = &filter.appliance {
        qb.push(" AND appliance = ").push_bind(appliance.clone());
    }
    if let Some(range) = &filter.range {
        qb.push(" AND ts >= ").push_bind(range.start);
        qb.push(" AND ts <= ").push_bind(range.end);
    }
}

fn group_expr(group_by: Option<GroupBy>, offset: FixedOffset) -> String {
    let local_ts = format!(
        "((ts AT TIME ZONE 'UTC') + INTERVAL '{} seconds')",
        offset.local_minus_utc()
    );
    match group_by {
        None => "NULL::TEXT".to_string(),
        Some(GroupBy::Load) => "load_id".to_string(),
        Some(GroupBy::Appliance) => "appliance".to_string(),
        Some(GroupBy::HourOfDay) => format!("EXTRACT(HOUR FROM {})::INT::TEXT", local_ts),
        Some(GroupBy::DayOfMonth) => format!("EXTRACT(DAY FROM {})::INT::TEXT", local_ts),
        Some(GroupBy::MonthOfYear) => format!("EXTRACT(MONTH FROM {})::INT::TEXT", local_ts),
    }
}

#[async_trait]
impl SampleStore for PgSampleRepository {
    async fn latest_before(
        &self,
        key: &StreamKey,
        before: DateTime<Utc>,
    ) -> Result<Option<Sample>> {
        let query = format!(
            "SELECT {} FROM samples \
             WHERE device_id = $1 AND load_id = $2 AND ts < $3 \
             ORDER BY ts DESC, id DESC \
             LIMIT 1",
            SAMPLE_COLUMNS
        );
        let sample = sqlx::query_as::<_, Sample>(&query)
            .bind(&key.device_id)
            .bind(&key.load_id)
            .bind(before)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sample)
    }

    async fn insert_many(&self, samples: Vec<NewSample>) -> Result<Vec<Sample>> {
        let query = format!(
            "INSERT INTO samples (device_id, load_id, load_name, voltage_v, current_a, \
                                  power_w, energy_kwh, appliance, location, ts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {}",
            SAMPLE_COLUMNS
        );

        // All loads of one request commit together
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(samples.len());
        for sample in samples {
            let row = sqlx::query_as::<_, Sample>(&query)
                .bind(sample.device_id)
                .bind(sample.load_id)
                .bind(sample.load_name)
                .bind(sample.voltage)
                .bind(sample.current)
                .bind(sample.power)
                .bind(sample.energy)
                .bind(sample.appliance)
                .bind(sample.location)
                .bind(sample.timestamp)
                .fetch_one(&mut *tx)
                .await?;
            stored.push(row);
        }
        tx.commit().await?;

        Ok(stored)
    }

    async fn find(
        &self,
        filter: &SampleFilter,
        order: SortOrder,
        limit: Option<i64>,
    ) -> Result<Vec<Sample>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM samples WHERE 1=1",
            SAMPLE_COLUMNS
        ));
        push_filter(&mut qb, filter);
        qb.push(match order {
            SortOrder::Ascending => " ORDER BY ts ASC, id ASC",
            SortOrder::Descending => " ORDER BY ts DESC, id DESC",
        });
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }

        let samples = qb.build_query_as::<Sample>().fetch_all(&self.pool).await?;
        Ok(samples)
    }

    async fn aggregate(
        &self,
        filter: &SampleFilter,
        group_by: Option<GroupBy>,
        offset: FixedOffset,
    ) -> Result<Vec<GroupRow>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT
                {} AS group_key,
                (ARRAY_AGG(load_name ORDER BY ts DESC))[1] AS load_name,
                CAST(COALESCE(SUM(energy_kwh), 0) AS DOUBLE PRECISION) AS total_energy,
                CAST(COALESCE(AVG(power_w), 0) AS DOUBLE PRECISION) AS avg_power,
                CAST(COALESCE(MAX(power_w), 0) AS DOUBLE PRECISION) AS max_power,
                CAST(COALESCE(MIN(power_w), 0) AS DOUBLE PRECISION) AS min_power,
                CAST(COALESCE(AVG(voltage_v), 0) AS DOUBLE PRECISION) AS avg_voltage,
                CAST(COALESCE(AVG(current_a), 0) AS DOUBLE PRECISION) AS avg_current,
                COUNT(*) AS measurement_count
            FROM samples
            WHERE 1=1"#,
            group_expr(group_by, offset)
        ));
        push_filter(&mut qb, filter);
        if group_by.is_some() {
            qb.push(" GROUP BY 1");
        }

        let rows = qb
            .build_query_as::<AggregateRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut groups = rows
            .into_iter()
            .filter(|r| r.measurement_count > 0)
            .map(|r| r.into_group_row(group_by))
            .collect::<Result<Vec<_>>>()?;
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(groups)
    }

    async fn distinct_devices(&self, filter: &SampleFilter) -> Result<Vec<String>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT DISTINCT device_id FROM samples WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY device_id");

        let devices = qb
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(devices)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM samples").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
