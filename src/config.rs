use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    /// No database section means samples live in process memory.
    #[serde(default)]
    pub database: Option<DbConfig>,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

/// The one electricity rate used for every cost figure the service reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Currency units per kWh.
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            currency: default_currency(),
        }
    }
}

fn default_rate() -> f64 {
    3.0
}

fn default_currency() -> String {
    "INR".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_voltage")]
    pub default_voltage: f64,
    /// Sampling interval assumed for the first sample of a stream.
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: f64,
    #[serde(default = "default_appliance")]
    pub default_appliance: String,
    #[serde(default = "default_location")]
    pub default_location: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_voltage: default_voltage(),
            default_interval_secs: default_interval_secs(),
            default_appliance: default_appliance(),
            default_location: default_location(),
        }
    }
}

fn default_voltage() -> f64 {
    230.0
}

fn default_interval_secs() -> f64 {
    5.0
}

fn default_appliance() -> String {
    "All".into()
}

fn default_location() -> String {
    "Home".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Offset of the local wall clock that period boundaries and
    /// hour/day/month buckets are computed in.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_realtime_window_secs")]
    pub realtime_window_secs: i64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            realtime_window_secs: default_realtime_window_secs(),
        }
    }
}

fn default_realtime_window_secs() -> i64 {
    300
}

impl ReportingConfig {
    pub fn offset(&self) -> Result<chrono::FixedOffset, anyhow::Error> {
        chrono::FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("utc_offset_minutes out of range: {}", self.utc_offset_minutes)
        })
    }
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            match cfg.database {
                Some(ref mut db) => db.url = url,
                None => {
                    cfg.database = Some(DbConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        if let Ok(rate) = std::env::var("ELECTRICITY_RATE") {
            cfg.pricing.rate = rate
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid ELECTRICITY_RATE {:?}: {}", rate, e))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.pricing.rate.is_finite() || self.pricing.rate < 0.0 {
            anyhow::bail!("pricing.rate must be a non-negative number");
        }
        if !self.ingest.default_voltage.is_finite() || self.ingest.default_voltage < 0.0 {
            anyhow::bail!("ingest.default_voltage must be a non-negative number");
        }
        let interval = self.ingest.default_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            anyhow::bail!("ingest.default_interval_secs must be positive");
        }
        self.reporting.offset()?;
        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// `$$` produces a literal dollar sign.
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let close = match tail.chars().next() {
            Some('$') => {
                out.push('$');
                rest = &tail[1..];
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                rest = tail;
                continue;
            }
        };
        let end = tail
            .find(close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let var = &tail[1..end];
        let val = std::env::var(var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
