//! Reference noise models.
//!
//! A noise model is a table of `(period_seconds, power_dB)` pairs read
//! from a whitespace-separated ASCII file. Peterson's New Low and High
//! Noise Models ship embedded and are the defaults for the deviation
//! metric; site-specific models can be loaded from disk.

use std::path::Path;
use std::sync::OnceLock;

use crate::error::{QcError, Result};

const NLNM_TXT: &str = include_str!("../data/nlnm.txt");
const NHNM_TXT: &str = include_str!("../data/nhnm.txt");

static NLNM: OnceLock<NoiseModel> = OnceLock::new();
static NHNM: OnceLock<NoiseModel> = OnceLock::new();

/// A reference PSD curve on a period grid.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseModel {
    /// Periods in seconds, ascending
    pub periods: Vec<f64>,
    /// Power in dB relative to 1 (m/s^2)^2/Hz
    pub powers: Vec<f64>,
}

impl NoiseModel {
    /// Parse a model table. Every line must hold exactly two
    /// whitespace-separated fields; anything else is fatal.
    pub fn parse(text: &str) -> Result<Self> {
        let mut periods = Vec::new();
        let mut powers = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(QcError::MalformedModel(format!(
                    "line {}: expected 2 fields, found {}",
                    lineno + 1,
                    fields.len()
                )));
            }
            let period: f64 = fields[0].parse().map_err(|_| {
                QcError::MalformedModel(format!("line {}: bad period '{}'", lineno + 1, fields[0]))
            })?;
            let power: f64 = fields[1].parse().map_err(|_| {
                QcError::MalformedModel(format!("line {}: bad power '{}'", lineno + 1, fields[1]))
            })?;
            periods.push(period);
            powers.push(power);
        }
        Ok(Self { periods, powers })
    }

    /// Read a model table from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Indices of the model periods inside the closed band
    /// `[low, high]` seconds.
    pub fn band(&self, low: f64, high: f64) -> Vec<usize> {
        self.periods
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p >= low && p <= high)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Peterson's New Low Noise Model, embedded.
pub fn nlnm() -> &'static NoiseModel {
    NLNM.get_or_init(|| NoiseModel::parse(NLNM_TXT).expect("embedded nlnm.txt is valid"))
}

/// Peterson's New High Noise Model, embedded.
pub fn nhnm() -> &'static NoiseModel {
    NHNM.get_or_init(|| NoiseModel::parse(NHNM_TXT).expect("embedded nhnm.txt is valid"))
}
