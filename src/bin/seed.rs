use anyhow::Context;
use chrono::{Duration, Utc};
use energy_monitor_api::models::{SampleDraft, SampleFilter, TimeRange};
use energy_monitor_api::repositories::{PgSampleRepository, SampleStore};
use energy_monitor_api::services::{EnergyIntegrator, UsageService};
use energy_monitor_api::{db, Config};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const APPLIANCES: [&str; 6] = [
    "All",
    "Heating & AC",
    "Lighting",
    "Plug Loads",
    "Refrigeration",
    "Other",
];
const LOADS: [(&str, &str); 4] = [
    ("Load1", "Load 1"),
    ("Load2", "Load 2"),
    ("Load3", "Load 3"),
    ("Load4", "Load 4"),
];

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let count: u32 = env_or("SEED_COUNT", 288)?;
    let hours: i64 = env_or("SEED_HOURS", 24)?;
    let device_id: String = env_or("SEED_DEVICE_ID", "ESP32_001".to_string())?;
    let clear: bool = env_or("SEED_CLEAR", true)?;
    if count == 0 || hours <= 0 {
        anyhow::bail!("SEED_COUNT and SEED_HOURS must be positive");
    }

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    let db_cfg = cfg
        .database
        .as_ref()
        .context("seeding needs a database section or DATABASE_URL")?;

    let pool = db::connect(db_cfg).await?;
    db::ensure_schema(&pool).await?;
    let store: Arc<dyn SampleStore> = Arc::new(PgSampleRepository::new(pool));

    if clear {
        let deleted = store.delete_all().await?;
        info!(deleted, "Cleared existing readings");
    }

    let integrator = EnergyIntegrator::new(store.clone(), cfg.ingest.default_interval_secs);
    let now = Utc::now();
    let step = Duration::milliseconds(hours * 3_600_000 / count as i64);
    let mut rng = rand::thread_rng();

    info!(count, hours, device_id = %device_id, "Generating readings");
    for i in 0..count {
        let (load_id, load_name) = *LOADS.choose(&mut rng).unwrap_or(&LOADS[0]);
        let appliance = *APPLIANCES.choose(&mut rng).unwrap_or(&APPLIANCES[0]);
        let voltage: f64 = rng.gen_range(210.0..230.0);
        let current: f64 = rng.gen_range(0.0..10.0);

        // one at a time so each sample integrates against the one before it
        integrator
            .integrate_and_store(vec![SampleDraft {
                device_id: device_id.clone(),
                load_id: load_id.to_string(),
                load_name: load_name.to_string(),
                voltage,
                current,
                power: Some(voltage * current),
                appliance: appliance.to_string(),
                location: cfg.ingest.default_location.clone(),
                timestamp: now - step * (count - i) as i32,
            }])
            .await?;

        if (i + 1) % 50 == 0 {
            info!("Inserted {}/{} readings", i + 1, count);
        }
    }

    let usage = UsageService::new(store, cfg.reporting.offset()?);
    let range = TimeRange::new(now - Duration::hours(hours), now);
    let stats = usage
        .summary_for(&SampleFilter::for_device(Some(device_id)).within(range))
        .await?;

    info!(
        readings = stats.count,
        total_energy_kwh = %format!("{:.3}", stats.total_energy),
        avg_power_w = %format!("{:.2}", stats.avg_power),
        max_power_w = %format!("{:.2}", stats.max_power),
        estimated_cost = %format!("{:.2}", stats.total_energy * cfg.pricing.rate),
        currency = %cfg.pricing.currency,
        "Seeding complete"
    );

    Ok(())
}
