//! Builder pattern API for constructing station metadata.
//!
//! Provides a fluent, closure-based API for building a [`StationMeta`]
//! without manually constructing every nested struct. Stage helpers
//! follow the dataless-SEED convention: `sensitivity` fills stage 0,
//! `pole_zero` / `polynomial` stage 1, `digital` stage 2.
//!
//! # Example
//!
//! ```
//! use num_complex::Complex64;
//! use seisqc_rs::station::StationMeta;
//!
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
//! assert_eq!(meta.channels.len(), 1);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use num_complex::Complex64;

use crate::station::{
    ChannelKey, ChannelMeta, ResponseStage, StageKind, StationKey, StationMeta, Unit,
};

// ─── StationMetaBuilder ─────────────────────────────────────────────

/// Builder for [`StationMeta`].
pub struct StationMetaBuilder {
    station: StationKey,
    channels: Vec<ChannelMeta>,
}

impl StationMeta {
    /// Create a new station metadata builder.
    pub fn builder(network: impl Into<String>, station: impl Into<String>) -> StationMetaBuilder {
        StationMetaBuilder {
            station: StationKey::new(network, station),
            channels: vec![],
        }
    }
}

impl StationMetaBuilder {
    /// Add a channel using a closure-based builder.
    pub fn channel(
        mut self,
        location: impl Into<String>,
        code: impl Into<String>,
        f: impl FnOnce(ChannelMetaBuilder) -> ChannelMetaBuilder,
    ) -> Self {
        let builder = f(ChannelMetaBuilder::new(
            self.station.clone(),
            ChannelKey::new(location, code),
        ));
        self.channels.push(builder.build());
        self
    }

    /// Build the final [`StationMeta`].
    pub fn build(self) -> StationMeta {
        let mut meta = StationMeta::new(self.station);
        for channel in self.channels {
            meta.insert(channel);
        }
        meta
    }
}

// ─── ChannelMetaBuilder ─────────────────────────────────────────────

/// Builder for [`ChannelMeta`].
pub struct ChannelMetaBuilder {
    station: StationKey,
    key: ChannelKey,
    sample_rate: f64,
    dip: f64,
    azimuth: f64,
    depth: f64,
    instrument_type: String,
    flags: String,
    epoch: DateTime<Utc>,
    day_break: bool,
    stages: BTreeMap<u32, ResponseStage>,
}

impl ChannelMetaBuilder {
    fn new(station: StationKey, key: ChannelKey) -> Self {
        Self {
            station,
            key,
            sample_rate: 0.0,
            dip: 0.0,
            azimuth: 0.0,
            depth: 0.0,
            instrument_type: String::new(),
            flags: String::new(),
            epoch: DateTime::UNIX_EPOCH,
            day_break: false,
            stages: BTreeMap::new(),
        }
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn dip(mut self, dip: f64) -> Self {
        self.dip = dip;
        self
    }

    pub fn azimuth(mut self, azimuth: f64) -> Self {
        self.azimuth = azimuth;
        self
    }

    pub fn depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    pub fn instrument_type(mut self, ty: impl Into<String>) -> Self {
        self.instrument_type = ty.into();
        self
    }

    pub fn flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    /// Mark that the response epoch changes mid-day.
    pub fn day_break(mut self) -> Self {
        self.day_break = true;
        self
    }

    /// Stage 0: overall sensitivity (gain-only).
    pub fn sensitivity(mut self, gain: f64, gain_frequency: f64) -> Self {
        self.stages.insert(
            0,
            ResponseStage::sensitivity(gain, gain_frequency, Unit::Velocity),
        );
        self
    }

    /// Stage 1: analog pole-zero transfer function. Input units default
    /// to velocity; use [`stage`](Self::stage) for anything exotic.
    pub fn pole_zero(
        mut self,
        transfer: char,
        normalization: f64,
        poles: Vec<Complex64>,
        zeros: Vec<Complex64>,
        gain: f64,
        gain_frequency: f64,
    ) -> Self {
        self.stages.insert(
            1,
            ResponseStage {
                gain,
                gain_frequency,
                input_units: Unit::Velocity,
                output_units: Unit::Volts,
                kind: Some(StageKind::PoleZero {
                    transfer,
                    normalization,
                    poles,
                    zeros,
                }),
            },
        );
        self
    }

    /// Stage 1: polynomial response (mass-position channels).
    pub fn polynomial(
        mut self,
        bounds: (f64, f64),
        coefficients: Vec<f64>,
        gain: f64,
        gain_frequency: f64,
    ) -> Self {
        self.stages.insert(
            1,
            ResponseStage {
                gain,
                gain_frequency,
                input_units: Unit::Acceleration,
                output_units: Unit::Counts,
                kind: Some(StageKind::Polynomial {
                    bounds,
                    coefficients,
                }),
            },
        );
        self
    }

    /// Stage 2: digital gain.
    pub fn digital(
        mut self,
        input_sample_rate: f64,
        decimation: u32,
        gain: f64,
        gain_frequency: f64,
    ) -> Self {
        self.stages.insert(
            2,
            ResponseStage {
                gain,
                gain_frequency,
                input_units: Unit::Volts,
                output_units: Unit::Counts,
                kind: Some(StageKind::Digital {
                    input_sample_rate,
                    decimation,
                }),
            },
        );
        self
    }

    /// Insert an arbitrary stage at an explicit index.
    pub fn stage(mut self, index: u32, stage: ResponseStage) -> Self {
        self.stages.insert(index, stage);
        self
    }

    fn build(self) -> ChannelMeta {
        ChannelMeta {
            station: self.station,
            key: self.key,
            sample_rate: self.sample_rate,
            dip: self.dip,
            azimuth: self.azimuth,
            depth: self.depth,
            instrument_type: self.instrument_type,
            flags: self.flags,
            epoch: self.epoch,
            day_break: self.day_break,
            stages: self.stages,
        }
    }
}
