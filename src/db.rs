use crate::config::DbConfig;
use crate::error::AppError;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::{debug, info};

pub type DbPool = Pool<Postgres>;

pub async fn connect(cfg: &DbConfig) -> Result<DbPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.url)
        .await?;
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS samples (
        id BIGSERIAL,
        device_id TEXT NOT NULL,
        load_id TEXT NOT NULL,
        load_name TEXT NOT NULL,
        voltage_v DOUBLE PRECISION NOT NULL CHECK (voltage_v >= 0),
        current_a DOUBLE PRECISION NOT NULL CHECK (current_a >= 0),
        power_w DOUBLE PRECISION NOT NULL CHECK (power_w >= 0),
        energy_kwh DOUBLE PRECISION NOT NULL CHECK (energy_kwh >= 0),
        appliance TEXT NOT NULL,
        location TEXT NOT NULL,
        ts TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (id, ts)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS samples_stream_ts_idx ON samples (device_id, load_id, ts DESC)",
    "CREATE INDEX IF NOT EXISTS samples_ts_idx ON samples (ts DESC)",
    "CREATE INDEX IF NOT EXISTS samples_appliance_ts_idx ON samples (appliance, ts DESC)",
];

/// Create the samples table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    // Hypertable only when TimescaleDB is installed
    match sqlx::query("SELECT create_hypertable('samples', 'ts', if_not_exists => TRUE)")
        .execute(pool)
        .await
    {
        Ok(_) => info!("samples is a TimescaleDB hypertable"),
        Err(e) => debug!(error = %e, "TimescaleDB not available, using a plain table"),
    }

    Ok(())
}
