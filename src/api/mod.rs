pub mod handlers;
pub mod models;
mod routes;

pub use routes::create_router;

use crate::config::{Config, PricingConfig, ReportingConfig};
use crate::repositories::SampleStore;
use crate::services::{CostService, EnergyIntegrator, IngestService, UsageService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SampleStore>,
    pub ingest: IngestService,
    pub usage: UsageService,
    pub cost: CostService,
    pub pricing: PricingConfig,
    pub reporting: ReportingConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn SampleStore>, config: &Config) -> Result<Self, anyhow::Error> {
        let offset = config.reporting.offset()?;
        let integrator = EnergyIntegrator::new(store.clone(), config.ingest.default_interval_secs);
        let usage = UsageService::new(store.clone(), offset);

        Ok(Self {
            ingest: IngestService::new(integrator, config.ingest.clone()),
            cost: CostService::new(usage.clone(), config.pricing.clone()),
            usage,
            store,
            pricing: config.pricing.clone(),
            reporting: config.reporting.clone(),
        })
    }

    /// Configured rate used when rendering per-sample and aggregate costs.
    pub fn rate(&self) -> f64 {
        self.pricing.rate
    }
}
