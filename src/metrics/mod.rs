//! Metric framework: the per-channel evaluation protocol, shared
//! services, and the station-day runner.
//!
//! A metric is a unit of work identified by a base name and an
//! algorithm version. For every channel (or channel pair) it computes
//! one scalar over a configured period band, stamped with the digest of
//! the inputs that produced it. Evaluations whose inputs are unchanged
//! since the last recorded run are skipped unless forced.

pub mod coherence;
pub mod deviation;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::error;

use crate::crosspower::CrossPowerCache;
use crate::error::{QcError, Result};
use crate::station::{StationKey, StationMeta};
use crate::store::MetricStore;
use crate::timeseries::DayData;

pub use coherence::Coherence;
pub use deviation::NoiseModelDeviation;

// ─── Argument bag ───────────────────────────────────────────────────

/// Named-argument bag. Arguments must be declared before they can be
/// set; setting an undeclared name is an error.
#[derive(Debug, Clone, Default)]
pub struct ArgumentBag {
    declared: BTreeSet<String>,
    values: BTreeMap<String, String>,
}

impl ArgumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a recognized argument name.
    pub fn add_argument(&mut self, name: impl Into<String>) {
        self.declared.insert(name.into());
    }

    /// Populate a declared argument.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if !self.declared.contains(name) {
            return Err(QcError::UnknownArgument(name.to_string()));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Value of an argument, or `None` if unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Parse a required argument as an `f64`.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let raw = self
            .get(name)
            .ok_or_else(|| QcError::MissingArgument(name.to_string()))?;
        raw.parse().map_err(|_| QcError::InvalidArgument {
            name: name.to_string(),
            value: raw.to_string(),
        })
    }
}

// ─── Results ────────────────────────────────────────────────────────

/// One emitted scalar and the input fingerprint that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasuredValue {
    pub value: f64,
    pub digest: Vec<u8>,
}

/// All values a metric emitted for one station-day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub date: NaiveDate,
    pub metric_name: String,
    pub station: StationKey,
    /// Channel-id string → measured value, in canonical id order
    pub per_channel: BTreeMap<String, MeasuredValue>,
}

impl MetricResult {
    pub fn new(date: NaiveDate, metric_name: String, station: StationKey) -> Self {
        Self {
            date,
            metric_name,
            station,
            per_channel: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, channel_id: impl Into<String>, value: f64, digest: Vec<u8>) {
        self.per_channel
            .insert(channel_id.into(), MeasuredValue { value, digest });
    }

    pub fn get(&self, channel_id: &str) -> Option<&MeasuredValue> {
        self.per_channel.get(channel_id)
    }

    /// Number of channels with an emitted value.
    pub fn len(&self) -> usize {
        self.per_channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_channel.is_empty()
    }
}

// ─── Shared services ────────────────────────────────────────────────

/// Everything a metric borrows while it runs: the day's inputs, the
/// shared cross-power cache, the store handle for change detection,
/// and the force flag.
pub struct MetricContext<'a, S: MetricStore> {
    pub data: &'a DayData,
    pub meta: &'a StationMeta,
    pub store: &'a S,
    pub crosspower: &'a mut CrossPowerCache,
    pub force_update: bool,
}

// ─── Metric interface ───────────────────────────────────────────────

/// Capability set of a metric: name, version, bind, process.
pub trait Metric {
    /// Algorithm name, stable across revisions.
    fn base_name(&self) -> &'static str;

    /// Algorithm revision; bumped when stored values change meaning.
    fn version(&self) -> u32;

    /// Stored metric name, combining base name and version.
    fn metric_name(&self) -> String {
        format!("{}:v{}", self.base_name(), self.version())
    }

    /// Attach the day's inputs and allocate an empty result.
    fn bind<S: MetricStore>(&self, ctx: &MetricContext<'_, S>) -> MetricResult {
        MetricResult::new(
            ctx.data.date,
            self.metric_name(),
            ctx.meta.station.clone(),
        )
    }

    /// Run the metric over its channels.
    fn process<S: MetricStore>(&mut self, ctx: &mut MetricContext<'_, S>) -> Result<MetricResult>;
}

/// The concrete metrics, as tagged variants for homogeneous lists.
pub enum StationMetric {
    Deviation(NoiseModelDeviation),
    Coherence(Coherence),
}

impl Metric for StationMetric {
    fn base_name(&self) -> &'static str {
        match self {
            StationMetric::Deviation(m) => m.base_name(),
            StationMetric::Coherence(m) => m.base_name(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            StationMetric::Deviation(m) => m.version(),
            StationMetric::Coherence(m) => m.version(),
        }
    }

    fn process<S: MetricStore>(&mut self, ctx: &mut MetricContext<'_, S>) -> Result<MetricResult> {
        match self {
            StationMetric::Deviation(m) => m.process(ctx),
            StationMetric::Coherence(m) => m.process(ctx),
        }
    }
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Run a list of metrics over one station-day and publish their
/// results.
///
/// A failed metric is logged and the run continues with the next one.
/// Storage failures during publication are logged per row; the
/// in-memory results are returned either way so the driver can retry.
pub fn run_metrics<S: MetricStore>(
    metrics: &mut [StationMetric],
    data: &DayData,
    meta: &StationMeta,
    store: &mut S,
    force_update: bool,
) -> Vec<MetricResult> {
    let mut cache = CrossPowerCache::new();
    let mut results = Vec::new();
    for metric in metrics.iter_mut() {
        let name = metric.metric_name();
        let outcome = {
            let mut ctx = MetricContext {
                data,
                meta,
                store: &*store,
                crosspower: &mut cache,
                force_update,
            };
            metric.process(&mut ctx)
        };
        match outcome {
            Ok(result) => {
                publish(&result, store);
                results.push(result);
            }
            Err(err) => error!(metric = %name, error = %err, "metric aborted"),
        }
    }
    results
}

/// Insert every row of a result into the store, keeping going on
/// failure.
pub fn publish<S: MetricStore>(result: &MetricResult, store: &mut S) {
    for (channel_id, measured) in &result.per_channel {
        if let Err(err) = store.insert_metric_data(
            result.date,
            &result.metric_name,
            &result.station,
            channel_id,
            measured.value,
            &measured.digest,
        ) {
            error!(
                metric = %result.metric_name,
                channel = %channel_id,
                error = %err,
                "insert failed, result kept in memory"
            );
        }
    }
}
