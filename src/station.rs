//! Core station metadata types (ingest-format agnostic).
//!
//! These types represent one station-day's worth of channel metadata
//! independently of the blockette format it was parsed from. The response
//! tree follows the dataless-SEED stage convention: stage 0 holds the
//! overall sensitivity, stage 1 the analog pole-zero (or polynomial)
//! transfer function, stage 2 the digital gain.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use num_complex::Complex64;
use serde::Serialize;

use crate::error::{QcError, Result};

// ─── Identities ─────────────────────────────────────────────────────

/// Station identity: `(network, station)`.
///
/// Channel metadata names its station by this identity tuple rather than
/// an owning reference, so the metadata tree stays acyclic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StationKey {
    /// Network code (e.g. `"IU"`)
    pub network: String,
    /// Station code (e.g. `"ANMO"`)
    pub station: String,
}

impl StationKey {
    pub fn new(network: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.network, self.station)
    }
}

/// Channel identity: `(location, code)`.
///
/// `location` is the two-character site slot (`"00"`, `"10"`, ...) and
/// `code` the three-character band/instrument/orientation code
/// (`"LHZ"`, `"BH1"`, ...). Ordering is lexicographic on
/// `(location, code)`; that ordering is the canonical one used to key
/// unordered channel pairs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ChannelKey {
    pub location: String,
    pub code: String,
}

impl ChannelKey {
    pub fn new(location: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            code: code.into(),
        }
    }

    /// Parse the `"LOC,CODE"` channel-id serialization.
    pub fn parse(id: &str) -> Result<Self> {
        let mut parts = id.split(',');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(loc), Some(code), None) if !loc.is_empty() && !code.is_empty() => {
                Ok(Self::new(loc, code))
            }
            _ => Err(QcError::BadChannelId(id.to_string())),
        }
    }

    /// Band character of the code (sampling band, e.g. `L`, `B`, `H`).
    pub fn band_code(&self) -> Option<char> {
        self.code.chars().next()
    }

    /// Instrument character of the code (e.g. `H` = high-gain seismometer).
    pub fn instrument_code(&self) -> Option<char> {
        self.code.chars().nth(1)
    }

    /// Orientation character of the code (e.g. `Z`, `N`, `E`, `1`, `2`).
    pub fn orientation_code(&self) -> Option<char> {
        self.code.chars().nth(2)
    }

    /// True for seismic channels: instrument code `H` (high gain) or
    /// `N` (accelerometer). Only these are held to the three-stage
    /// response rule.
    pub fn is_seismic(&self) -> bool {
        matches!(self.instrument_code(), Some('H') | Some('N'))
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.location, self.code)
    }
}

// ─── Units ──────────────────────────────────────────────────────────

/// Physical unit attached to a response stage input or output.
///
/// The three ground-motion units carry the integer codes used for
/// differentiation/integration during response conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    Displacement,
    Velocity,
    Acceleration,
    Counts,
    Volts,
    Other(String),
}

impl Unit {
    /// Conversion code: displacement = 1, velocity = 2, acceleration = 3.
    /// Non-ground-motion units have none.
    pub fn code(&self) -> Option<i32> {
        match self {
            Unit::Displacement => Some(1),
            Unit::Velocity => Some(2),
            Unit::Acceleration => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Displacement => write!(f, "M"),
            Unit::Velocity => write!(f, "M/S"),
            Unit::Acceleration => write!(f, "M/S**2"),
            Unit::Counts => write!(f, "COUNTS"),
            Unit::Volts => write!(f, "V"),
            Unit::Other(name) => write!(f, "{name}"),
        }
    }
}

// ─── Response stages ────────────────────────────────────────────────

/// Shape of one response stage, built from the parsed blockettes.
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    /// Analog pole-zero transfer function (blockette 053).
    ///
    /// `transfer` is the pole-zero convention tag: `'A'` for rad/s
    /// (Laplace), `'B'` for Hz.
    PoleZero {
        transfer: char,
        normalization: f64,
        poles: Vec<Complex64>,
        zeros: Vec<Complex64>,
    },
    /// Polynomial response (blockette 062), e.g. mass-position channels.
    Polynomial {
        bounds: (f64, f64),
        coefficients: Vec<f64>,
    },
    /// Digital stage (blockette 054): FIR input rate and decimation.
    Digital {
        input_sample_rate: f64,
        decimation: u32,
    },
}

/// One stage of a cascaded channel response.
///
/// Every stage carries a gain and its reference frequency (blockette 058)
/// plus input/output units. Stage 0 is gain-only (`kind` is `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseStage {
    pub gain: f64,
    pub gain_frequency: f64,
    pub input_units: Unit,
    pub output_units: Unit,
    pub kind: Option<StageKind>,
}

impl ResponseStage {
    /// Gain-only stage (overall sensitivity, stage 0).
    pub fn sensitivity(gain: f64, gain_frequency: f64, input_units: Unit) -> Self {
        Self {
            gain,
            gain_frequency,
            input_units,
            output_units: Unit::Counts,
            kind: None,
        }
    }
}

// ─── Channel metadata ───────────────────────────────────────────────

/// Everything known about one channel for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMeta {
    /// Identity of the owning station
    pub station: StationKey,
    pub key: ChannelKey,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Dip in degrees from horizontal, positive down
    pub dip: f64,
    /// Azimuth in degrees clockwise from north
    pub azimuth: f64,
    /// Burial depth in meters
    pub depth: f64,
    pub instrument_type: String,
    pub flags: String,
    /// Start of the metadata epoch this meta was read from
    pub epoch: DateTime<Utc>,
    /// Set when the response epoch changes mid-day
    pub day_break: bool,
    /// Stage index → stage; `BTreeMap` iterates in stage-index order
    pub stages: BTreeMap<u32, ResponseStage>,
}

impl ChannelMeta {
    pub fn stage(&self, index: u32) -> Option<&ResponseStage> {
        self.stages.get(&index)
    }

    /// Three-stage rule: a seismic channel must carry stages 0, 1, 2,
    /// all with positive gain. Non-seismic channels are exempt.
    pub fn has_valid_response(&self) -> bool {
        if !self.key.is_seismic() {
            return true;
        }
        [0u32, 1, 2]
            .iter()
            .all(|i| self.stages.get(i).is_some_and(|s| s.gain > 0.0))
    }
}

/// One station's channel metadata for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMeta {
    pub station: StationKey,
    pub channels: BTreeMap<ChannelKey, ChannelMeta>,
}

impl StationMeta {
    pub fn new(station: StationKey) -> Self {
        Self {
            station,
            channels: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&ChannelMeta> {
        self.channels.get(key)
    }

    pub fn insert(&mut self, meta: ChannelMeta) {
        self.channels.insert(meta.key.clone(), meta);
    }

    /// Channel keys in canonical (lexicographic) order.
    pub fn keys(&self) -> impl Iterator<Item = &ChannelKey> {
        self.channels.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_roundtrip() {
        let key = ChannelKey::new("00", "LHZ");
        assert_eq!(key.to_string(), "00,LHZ");
        assert_eq!(ChannelKey::parse("00,LHZ").unwrap(), key);
    }

    #[test]
    fn channel_id_bad_split() {
        assert!(ChannelKey::parse("00LHZ").is_err());
        assert!(ChannelKey::parse("00,LHZ,extra").is_err());
        assert!(ChannelKey::parse(",LHZ").is_err());
        assert!(ChannelKey::parse("00,").is_err());
    }

    #[test]
    fn code_characters() {
        let key = ChannelKey::new("10", "BHZ");
        assert_eq!(key.band_code(), Some('B'));
        assert_eq!(key.instrument_code(), Some('H'));
        assert_eq!(key.orientation_code(), Some('Z'));
        assert!(key.is_seismic());
    }

    #[test]
    fn mass_position_is_not_seismic() {
        assert!(!ChannelKey::new("00", "VMZ").is_seismic());
        assert!(ChannelKey::new("20", "LNZ").is_seismic());
    }

    #[test]
    fn canonical_ordering_is_lexicographic() {
        let a = ChannelKey::new("00", "LHZ");
        let b = ChannelKey::new("10", "LHZ");
        let c = ChannelKey::new("00", "BHZ");
        assert!(a < b);
        assert!(c < a); // BHZ sorts before LHZ within location 00
    }

    #[test]
    fn unit_codes() {
        assert_eq!(Unit::Displacement.code(), Some(1));
        assert_eq!(Unit::Velocity.code(), Some(2));
        assert_eq!(Unit::Acceleration.code(), Some(3));
        assert_eq!(Unit::Counts.code(), None);
        assert_eq!(Unit::Volts.code(), None);
    }

    #[test]
    fn station_display() {
        assert_eq!(StationKey::new("IU", "ANMO").to_string(), "IU_ANMO");
    }
}
