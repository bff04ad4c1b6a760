use crate::error::{AppError, Result};
use crate::models::{NewSample, Sample, SampleDraft, StreamKey};
use crate::repositories::SampleStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// The two values of a predecessor that the integration formula needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predecessor {
    pub timestamp: DateTime<Utc>,
    pub power: f64,
}

impl From<&Sample> for Predecessor {
    fn from(s: &Sample) -> Self {
        Self {
            timestamp: s.timestamp,
            power: s.power,
        }
    }
}

impl From<&NewSample> for Predecessor {
    fn from(s: &NewSample) -> Self {
        Self {
            timestamp: s.timestamp,
            power: s.power,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFields {
    /// Watts.
    pub power: f64,
    /// kWh contributed by this sample.
    pub energy: f64,
}

/// Power and incremental energy for a draft.
///
/// With a predecessor the interval between the two samples is integrated
/// with the trapezoidal rule; a negative interval counts as zero. Without
/// one, `default_interval_secs` of constant power is assumed.
pub fn compute_derived_fields(
    draft: &SampleDraft,
    predecessor: Option<Predecessor>,
    default_interval_secs: f64,
) -> Result<DerivedFields> {
    let power = match draft.power {
        Some(p) if p > 0.0 => p,
        _ => draft.voltage * draft.current,
    };

    let energy = match predecessor {
        Some(prev) => {
            let hours = duration_hours(draft.timestamp - prev.timestamp).max(0.0);
            let avg_power = (power + prev.power) / 2.0;
            avg_power * hours / 1000.0
        }
        None => power * default_interval_secs / 3600.0 / 1000.0,
    };

    if !power.is_finite() || power < 0.0 || !energy.is_finite() || energy < 0.0 {
        return Err(AppError::Integration(format!(
            "non-physical result for {}: power={} energy={}",
            draft.stream_key(),
            power,
            energy
        )));
    }

    Ok(DerivedFields { power, energy })
}

fn duration_hours(d: Duration) -> f64 {
    match d.num_microseconds() {
        Some(us) => us as f64 / 3_600_000_000.0,
        None => d.num_seconds() as f64 / 3600.0,
    }
}

type StreamLocks = Arc<Mutex<HashMap<StreamKey, Arc<tokio::sync::Mutex<()>>>>>;

/// Turns drafts into stored samples. The predecessor lookup and the write
/// for a stream happen under that stream's lock, so writers in this
/// process never integrate against a stale predecessor.
#[derive(Clone)]
pub struct EnergyIntegrator {
    store: Arc<dyn SampleStore>,
    default_interval_secs: f64,
    stream_locks: StreamLocks,
}

impl EnergyIntegrator {
    pub fn new(store: Arc<dyn SampleStore>, default_interval_secs: f64) -> Self {
        Self {
            store,
            default_interval_secs,
            stream_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Integrate and persist every draft of one ingestion. Either all
    /// drafts are stored or none is; results follow the input order.
    pub async fn integrate_and_store(&self, drafts: Vec<SampleDraft>) -> Result<Vec<Sample>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let mut keys: Vec<StreamKey> = drafts.iter().map(|d| d.stream_key()).collect();
        keys.sort();
        keys.dedup();

        // Sorted acquisition keeps overlapping multi-load requests deadlock free
        let mut guards = Vec::with_capacity(keys.len());
        for lock in self.locks_for(&keys) {
            guards.push(lock.lock_owned().await);
        }

        let result = self.derive_all(&drafts).await;
        let result = match result {
            Ok(samples) => self.store.insert_many(samples).await,
            Err(e) => Err(e),
        };

        drop(guards);
        self.prune_locks();
        result
    }

    async fn derive_all(&self, drafts: &[SampleDraft]) -> Result<Vec<NewSample>> {
        let mut order: Vec<usize> = (0..drafts.len()).collect();
        order.sort_by_key(|&i| drafts[i].timestamp);

        // Drafts of the same stream within one batch chain onto each other
        let mut pending: HashMap<StreamKey, Predecessor> = HashMap::new();
        let mut derived: Vec<Option<NewSample>> = vec![None; drafts.len()];

        for i in order {
            let draft = &drafts[i];
            let key = draft.stream_key();

            let stored = self.predecessor(&key, draft.timestamp).await;
            let batch = pending
                .get(&key)
                .copied()
                .filter(|p| p.timestamp < draft.timestamp);
            let predecessor = match (stored, batch) {
                (Some(s), Some(b)) => Some(if b.timestamp >= s.timestamp { b } else { s }),
                (s, b) => s.or(b),
            };

            let fields = compute_derived_fields(draft, predecessor, self.default_interval_secs)?;
            debug!(
                stream = %key,
                power = fields.power,
                energy = fields.energy,
                has_predecessor = predecessor.is_some(),
                "sample integrated"
            );

            let sample = NewSample {
                device_id: draft.device_id.clone(),
                load_id: draft.load_id.clone(),
                load_name: draft.load_name.clone(),
                voltage: draft.voltage,
                current: draft.current,
                power: fields.power,
                energy: fields.energy,
                appliance: draft.appliance.clone(),
                location: draft.location.clone(),
                timestamp: draft.timestamp,
            };
            pending.insert(key, Predecessor::from(&sample));
            derived[i] = Some(sample);
        }

        Ok(derived.into_iter().flatten().collect())
    }

    /// A failed lookup degrades to the default-interval formula.
    async fn predecessor(&self, key: &StreamKey, before: DateTime<Utc>) -> Option<Predecessor> {
        match self.store.latest_before(key, before).await {
            Ok(found) => found.as_ref().map(Predecessor::from),
            Err(e) => {
                warn!(stream = %key, error = %e, "predecessor lookup failed, assuming default interval");
                None
            }
        }
    }

    fn locks_for(&self, keys: &[StreamKey]) -> Vec<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .stream_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.iter()
            .map(|k| locks.entry(k.clone()).or_default().clone())
            .collect()
    }

    fn prune_locks(&self) {
        let mut locks = self
            .stream_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
