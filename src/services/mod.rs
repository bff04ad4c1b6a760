pub mod aggregation;
pub mod cost;
pub mod ingestor;
pub mod integrator;

pub use aggregation::{Breakdown, ShareRow, UsageQuery, UsageService};
pub use cost::{Comparison, CostReport, CostService, Prediction, Trend};
pub use ingestor::IngestService;
pub use integrator::EnergyIntegrator;
