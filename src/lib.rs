//! Seismic data-quality metrics over daily broadband archives.
//!
//! `seisqc-rs` turns one station-day of raw sample runs plus channel
//! response metadata into calibrated, band-limited quality metrics:
//! Welch-averaged power spectral densities, deviation from a reference
//! noise model, and coherence between channel pairs. Every emitted
//! value carries a content digest of its inputs, so unchanged
//! station-days are skipped on re-runs.
//!
//! # Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Sample runs, contiguous blocks | [`timeseries`] |
//! | Response tree, station metadata | [`station`], [`builder`] |
//! | Detrend / taper / FFT kernel | [`dsp`] |
//! | Response evaluation | [`response`] |
//! | Smoothed, deconvolved cross-power | [`crosspower`] |
//! | Metrics and the station-day runner | [`metrics`] |
//! | Digests and change detection | [`digest`] |
//! | Persistence interface | [`store`] |
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use num_complex::Complex64;
//! use seisqc_rs::{
//!     ChannelKey, DataSet, DayData, MemoryStore, NoiseModelDeviation, StationMeta,
//!     StationMetric, run_metrics,
//! };
//!
//! let key = ChannelKey::new("00", "LHZ");
//! let meta = StationMeta::builder("IU", "ANMO")
//!     .channel("00", "LHZ", |ch| {
//!         ch.sample_rate(1.0)
//!             .dip(-90.0)
//!             .sensitivity(3.43e9, 0.02)
//!             .pole_zero('A', 1.0, vec![Complex64::new(-0.037, 0.037)], vec![], 2.0e3, 0.02)
//!             .digital(1.0, 1, 1.68e6, 0.0)
//!     })
//!     .build();
//!
//! let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
//! let mut data = DayData::new(date);
//! data.add(key.clone(), DataSet::new(0, 1_000_000, vec![0; 86_400]));
//!
//! let mut deviation = NoiseModelDeviation::new(vec![key]);
//! deviation.set("lower-limit", "20").unwrap();
//! deviation.set("upper-limit", "50").unwrap();
//!
//! let mut store = MemoryStore::new();
//! let mut metrics = [StationMetric::Deviation(deviation)];
//! let results = run_metrics(&mut metrics, &data, &meta, &mut store, false);
//! println!("{} result sets", results.len());
//! ```

pub mod builder;
pub mod crosspower;
pub mod daytime;
pub mod digest;
pub mod dsp;
pub mod error;
pub mod metrics;
pub mod model;
pub mod response;
pub mod station;
pub mod store;
pub mod timeseries;

pub use builder::{ChannelMetaBuilder, StationMetaBuilder};
pub use crosspower::{CrossPower, CrossPowerCache, compute_cross_power};
pub use digest::{ChangeDetector, DigestWriter, Digestible, value_digest};
pub use error::{QcError, Result};
pub use metrics::{
    ArgumentBag, Coherence, MeasuredValue, Metric, MetricContext, MetricResult,
    NoiseModelDeviation, StationMetric, publish, run_metrics,
};
pub use model::{NoiseModel, nhnm, nlnm};
pub use response::OutputUnits;
pub use station::{
    ChannelKey, ChannelMeta, ResponseStage, StageKind, StationKey, StationMeta, Unit,
};
pub use store::{MemoryStore, MetricStore};
pub use timeseries::{
    ContiguousBlock, DataSet, DayData, contiguous_blocks, extract, largest_contiguous_block,
};
